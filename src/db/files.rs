//! Font files and their face sets.

use rusqlite::{OptionalExtension, Transaction};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use super::families::normalize_family_key;
use super::{now_millis, path_to_string, Database};
use crate::error::StoreResult;
use crate::introspect::FaceInfo;
use crate::scanner::FontFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Missing,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Ok => "ok",
            FileStatus::Error => "error",
            FileStatus::Missing => "missing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(FileStatus::Ok),
            "error" => Some(FileStatus::Error),
            "missing" => Some(FileStatus::Missing),
            _ => None,
        }
    }
}

/// Size and modification time captured when a file is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size_bytes: u64,
    /// Unix millis, when the platform reports it.
    pub modified_at: Option<i64>,
}

impl FileStat {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis());
        Self {
            size_bytes: metadata.len(),
            modified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FontFile {
    pub id: i64,
    pub source_id: Option<i64>,
    pub path: PathBuf,
    pub extension: String,
    pub size_bytes: i64,
    pub modified_at: Option<i64>,
    pub last_seen_at: i64,
    pub status: FileStatus,
    pub error_message: Option<String>,
}

/// Result of replacing a file's face set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileScanOutcome {
    pub file_id: i64,
    pub faces: usize,
    /// The file had active faces before the rescan reset them.
    pub cleared_activation: bool,
}

impl Database {
    /// Record a successful scan: upsert the file row and replace its faces.
    ///
    /// Runs in one transaction, so no reader sees the file without faces.
    /// Every reinserted face starts inactive.
    pub fn upsert_file_scan(
        &self,
        path: &Path,
        source_id: i64,
        extension: &str,
        stat: &FileStat,
        faces: &[FaceInfo],
    ) -> StoreResult<FileScanOutcome> {
        let format = FontFormat::from_extension(extension);
        let preview_supported = format.map(|f| f.preview_supported()).unwrap_or(false);
        let install_supported = format.map(|f| f.install_supported()).unwrap_or(false);
        let fallback_family = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let file_id = upsert_file_row(
            &tx,
            path,
            source_id,
            extension,
            stat,
            FileStatus::Ok,
            None,
        )?;
        let cleared_activation = deactivate_faces(&tx, file_id)?;
        tx.execute("DELETE FROM faces WHERE file_id = ?", [file_id])?;

        for face in faces {
            let (family_key, display_name) = match normalize_family_key(&face.family_name) {
                key if !key.is_empty() => (key, face.family_name.trim().to_string()),
                _ => (normalize_family_key(&fallback_family), fallback_family.clone()),
            };
            let family_id: i64 = tx.query_row(
                r#"
                INSERT INTO families (family_key, display_name) VALUES (?, ?)
                ON CONFLICT(family_key) DO UPDATE SET display_name = excluded.display_name
                RETURNING id
                "#,
                rusqlite::params![family_key, display_name],
                |row| row.get(0),
            )?;

            tx.execute(
                r#"
                INSERT INTO faces (
                    family_id, file_id, face_index,
                    postscript_name, full_name, style_name,
                    weight, width, slant, is_italic, is_variable,
                    activated, preview_supported, install_supported
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
                ON CONFLICT(file_id, face_index) DO UPDATE SET
                    family_id = excluded.family_id,
                    postscript_name = excluded.postscript_name,
                    full_name = excluded.full_name,
                    style_name = excluded.style_name,
                    weight = excluded.weight,
                    width = excluded.width,
                    slant = excluded.slant,
                    is_italic = excluded.is_italic,
                    is_variable = excluded.is_variable
                "#,
                rusqlite::params![
                    family_id,
                    file_id,
                    face.index,
                    face.postscript_name,
                    face.full_name,
                    face.style_name,
                    face.weight,
                    face.width,
                    face.slant,
                    face.italic,
                    face.variable,
                    preview_supported,
                    install_supported,
                ],
            )?;
        }

        tx.commit()?;

        Ok(FileScanOutcome {
            file_id,
            faces: faces.len(),
            cleared_activation,
        })
    }

    /// Record a failed introspection. Existing faces are kept but lose their
    /// activation, since an error-status file is not installable. Returns
    /// whether any face was active.
    pub fn record_file_error(
        &self,
        path: &Path,
        source_id: i64,
        extension: &str,
        stat: &FileStat,
        message: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let file_id = upsert_file_row(
            &tx,
            path,
            source_id,
            extension,
            stat,
            FileStatus::Error,
            Some(message),
        )?;
        let cleared = deactivate_faces(&tx, file_id)?;
        tx.commit()?;
        Ok(cleared)
    }

    /// Flip a file to missing and clear all of its faces' activation flags.
    /// Returns whether a row existed for `path`.
    pub fn mark_file_missing(&self, path: &Path) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let file_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM font_files WHERE path = ?",
                [path_to_string(path)],
                |row| row.get(0),
            )
            .optional()?;
        let Some(file_id) = file_id else {
            return Ok(false);
        };
        mark_missing(&tx, file_id)?;
        tx.commit()?;
        Ok(true)
    }

    /// Mark every not-yet-missing file below the directory `prefix` as
    /// missing. Returns the affected paths.
    pub fn mark_missing_under_path(&self, prefix: &Path) -> StoreResult<Vec<PathBuf>> {
        let prefix_str = path_to_string(prefix);
        let mut dir_prefix = prefix_str.trim_end_matches(MAIN_SEPARATOR).to_string();
        dir_prefix.push(MAIN_SEPARATOR);

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let files = select_files(
            &tx,
            "SELECT id, path FROM font_files
             WHERE status != 'missing' AND substr(path, 1, ?1) = ?2
             ORDER BY path",
            rusqlite::params![dir_prefix.chars().count() as i64, dir_prefix],
        )?;
        for (file_id, _) in &files {
            mark_missing(&tx, *file_id)?;
        }
        tx.commit()?;
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Mark files of `source_id` not seen since `before` (unix millis) as
    /// missing, except those at or below a path in `unreadable`. Returns the
    /// affected paths.
    pub fn mark_stale_files_missing(
        &self,
        source_id: i64,
        before: i64,
        unreadable: &[PathBuf],
    ) -> StoreResult<Vec<PathBuf>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut files = select_files(
            &tx,
            "SELECT id, path FROM font_files
             WHERE source_id = ?1 AND last_seen_at < ?2 AND status != 'missing'
             ORDER BY path",
            rusqlite::params![source_id, before],
        )?;
        files.retain(|(_, path)| !unreadable.iter().any(|prefix| path.starts_with(prefix)));
        for (file_id, _) in &files {
            mark_missing(&tx, *file_id)?;
        }
        tx.commit()?;
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    pub fn get_file(&self, path: &Path) -> StoreResult<Option<FontFile>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM font_files WHERE path = ?", FILE_COLUMNS);
        let file = conn
            .query_row(&sql, [path_to_string(path)], file_from_row)
            .optional()?;
        Ok(file)
    }

    /// Every file recorded for a source, missing ones included.
    pub fn list_source_files(&self, source_id: i64) -> StoreResult<Vec<FontFile>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM font_files WHERE source_id = ? ORDER BY path",
            FILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let files = stmt
            .query_map([source_id], file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }
}

const FILE_COLUMNS: &str = "id, source_id, path, extension, size_bytes, modified_at, \
                            last_seen_at, status, error_message";

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FontFile> {
    let status: String = row.get(7)?;
    Ok(FontFile {
        id: row.get(0)?,
        source_id: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        extension: row.get(3)?,
        size_bytes: row.get(4)?,
        modified_at: row.get(5)?,
        last_seen_at: row.get(6)?,
        status: FileStatus::from_str(&status).unwrap_or(FileStatus::Error),
        error_message: row.get(8)?,
    })
}

fn upsert_file_row(
    tx: &Transaction<'_>,
    path: &Path,
    source_id: i64,
    extension: &str,
    stat: &FileStat,
    status: FileStatus,
    error_message: Option<&str>,
) -> rusqlite::Result<i64> {
    tx.query_row(
        r#"
        INSERT INTO font_files (
            source_id, path, extension, size_bytes, modified_at,
            last_seen_at, status, error_message
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            source_id = excluded.source_id,
            extension = excluded.extension,
            size_bytes = excluded.size_bytes,
            modified_at = excluded.modified_at,
            last_seen_at = excluded.last_seen_at,
            status = excluded.status,
            error_message = excluded.error_message
        RETURNING id
        "#,
        rusqlite::params![
            source_id,
            path_to_string(path),
            extension.to_ascii_lowercase(),
            stat.size_bytes as i64,
            stat.modified_at,
            now_millis(),
            status.as_str(),
            error_message,
        ],
        |row| row.get(0),
    )
}

/// Clear every activation flag of a file. Returns whether any was set.
fn deactivate_faces(tx: &Transaction<'_>, file_id: i64) -> rusqlite::Result<bool> {
    let changed = tx.execute(
        "UPDATE faces SET activated = 0 WHERE file_id = ? AND activated = 1",
        [file_id],
    )?;
    Ok(changed > 0)
}

fn mark_missing(tx: &Transaction<'_>, file_id: i64) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE font_files SET status = 'missing' WHERE id = ?",
        [file_id],
    )?;
    deactivate_faces(tx, file_id)?;
    Ok(())
}

fn select_files(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<(i64, PathBuf)>> {
    let mut stmt = tx.prepare(sql)?;
    let files = stmt
        .query_map(params, |row| {
            Ok((row.get(0)?, PathBuf::from(row.get::<_, String>(1)?)))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(files)
}
