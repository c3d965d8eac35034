//! Sources, scan history and library-wide counts.

use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{path_to_string, Database};
use crate::error::StoreResult;

/// A watched root directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub id: i64,
    pub path: PathBuf,
    pub enabled: bool,
    pub created_at: String,
}

impl Source {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Source {
            id: row.get(0)?,
            path: PathBuf::from(row.get::<_, String>(1)?),
            enabled: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

/// Status of a recorded scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ScanStatus::Running),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }
}

/// One row of scan history.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub source_id: Option<i64>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub files_scanned: i64,
    pub files_failed: i64,
    pub files_missing: i64,
    pub status: ScanStatus,
}

/// Catalog-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub sources: i64,
    pub enabled_sources: i64,
    pub files_ok: i64,
    pub files_error: i64,
    pub files_missing: i64,
    pub families: i64,
    pub faces: i64,
    pub active_faces: i64,
}

const SOURCE_COLUMNS: &str = "id, path, enabled, created_at";

impl Database {
    /// Add a source, or re-enable the existing source at the same path.
    pub fn add_source(&self, path: &Path) -> StoreResult<Source> {
        let conn = self.conn();
        let source = conn.query_row(
            &format!(
                r#"
                INSERT INTO sources (path, enabled) VALUES (?, 1)
                ON CONFLICT(path) DO UPDATE SET enabled = 1
                RETURNING {}
                "#,
                SOURCE_COLUMNS
            ),
            [path_to_string(path)],
            Source::from_row,
        )?;
        Ok(source)
    }

    /// Disable a source. Its files keep their rows. Returns whether it existed.
    pub fn disable_source(&self, path: &Path) -> StoreResult<bool> {
        let changed = self.conn().execute(
            "UPDATE sources SET enabled = 0 WHERE path = ?",
            [path_to_string(path)],
        )?;
        Ok(changed > 0)
    }

    pub fn list_sources(&self) -> StoreResult<Vec<Source>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY path",
            SOURCE_COLUMNS
        ))?;
        let sources = stmt
            .query_map([], Source::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    pub fn get_source(&self, path: &Path) -> StoreResult<Option<Source>> {
        let conn = self.conn();
        let source = conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE path = ?", SOURCE_COLUMNS),
                [path_to_string(path)],
                Source::from_row,
            )
            .optional()?;
        Ok(source)
    }

    /// The enabled source whose root most specifically contains `path`.
    pub fn find_source_for_path(&self, path: &Path) -> StoreResult<Option<Source>> {
        let source = self
            .list_sources()?
            .into_iter()
            .filter(|s| s.enabled && path.starts_with(&s.path))
            .max_by_key(|s| s.path.components().count());
        Ok(source)
    }

    // ========================================================================
    // Scan history
    // ========================================================================

    pub fn begin_scan(&self, source_id: i64) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scans (source_id, status) VALUES (?, ?)",
            rusqlite::params![source_id, ScanStatus::Running.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn finish_scan(
        &self,
        scan_id: i64,
        scanned: usize,
        failed: usize,
        missing: usize,
        status: ScanStatus,
    ) -> StoreResult<()> {
        self.conn().execute(
            r#"
            UPDATE scans SET
                completed_at = CURRENT_TIMESTAMP,
                files_scanned = ?, files_failed = ?, files_missing = ?,
                status = ?
            WHERE id = ?
            "#,
            rusqlite::params![
                scanned as i64,
                failed as i64,
                missing as i64,
                status.as_str(),
                scan_id
            ],
        )?;
        Ok(())
    }

    pub fn recent_scans(&self, limit: usize) -> StoreResult<Vec<ScanRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, source_id, started_at, completed_at,
                   files_scanned, files_failed, files_missing, status
            FROM scans
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let scans = stmt
            .query_map([limit as i64], |row| {
                let status: String = row.get(7)?;
                Ok(ScanRecord {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    started_at: row.get(2)?,
                    completed_at: row.get(3)?,
                    files_scanned: row.get(4)?,
                    files_failed: row.get(5)?,
                    files_missing: row.get(6)?,
                    status: ScanStatus::from_str(&status).unwrap_or(ScanStatus::Failed),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scans)
    }

    pub fn stats(&self) -> StoreResult<LibraryStats> {
        let conn = self.conn();
        let stats = conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sources),
                (SELECT COUNT(*) FROM sources WHERE enabled = 1),
                (SELECT COUNT(*) FROM font_files WHERE status = 'ok'),
                (SELECT COUNT(*) FROM font_files WHERE status = 'error'),
                (SELECT COUNT(*) FROM font_files WHERE status = 'missing'),
                (SELECT COUNT(DISTINCT family_id) FROM faces),
                (SELECT COUNT(*) FROM faces),
                (SELECT COUNT(*) FROM faces WHERE activated = 1)
            "#,
            [],
            |row| {
                Ok(LibraryStats {
                    sources: row.get(0)?,
                    enabled_sources: row.get(1)?,
                    files_ok: row.get(2)?,
                    files_error: row.get(3)?,
                    files_missing: row.get(4)?,
                    families: row.get(5)?,
                    faces: row.get(6)?,
                    active_faces: row.get(7)?,
                })
            },
        )?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    #[test]
    fn test_add_source_is_idempotent_and_reenables() {
        let db = memory_db();
        let first = db.add_source(Path::new("/fonts")).unwrap();
        assert!(first.enabled);

        assert!(db.disable_source(Path::new("/fonts")).unwrap());
        assert!(!db.get_source(Path::new("/fonts")).unwrap().unwrap().enabled);

        let again = db.add_source(Path::new("/fonts")).unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.enabled);
        assert_eq!(db.list_sources().unwrap().len(), 1);
    }

    #[test]
    fn test_disable_unknown_source() {
        let db = memory_db();
        assert!(!db.disable_source(Path::new("/nowhere")).unwrap());
    }

    #[test]
    fn test_find_source_prefers_deepest_enabled_root() {
        let db = memory_db();
        db.add_source(Path::new("/fonts")).unwrap();
        let inner = db.add_source(Path::new("/fonts/vendor")).unwrap();
        db.add_source(Path::new("/fonts-extra")).unwrap();

        let found = db
            .find_source_for_path(Path::new("/fonts/vendor/Serif.ttf"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, inner.id);

        // Component-wise match: /fonts-extra is not under /fonts
        let found = db
            .find_source_for_path(Path::new("/fonts-extra/Sans.otf"))
            .unwrap()
            .unwrap();
        assert_eq!(found.path, PathBuf::from("/fonts-extra"));

        db.disable_source(Path::new("/fonts/vendor")).unwrap();
        let found = db
            .find_source_for_path(Path::new("/fonts/vendor/Serif.ttf"))
            .unwrap()
            .unwrap();
        assert_eq!(found.path, PathBuf::from("/fonts"));

        assert!(db
            .find_source_for_path(Path::new("/elsewhere/Serif.ttf"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_scan_history() {
        let db = memory_db();
        let source = db.add_source(Path::new("/fonts")).unwrap();

        let scan_id = db.begin_scan(source.id).unwrap();
        db.finish_scan(scan_id, 3, 1, 2, ScanStatus::Completed).unwrap();

        let scans = db.recent_scans(10).unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].status, ScanStatus::Completed);
        assert_eq!(scans[0].files_scanned, 3);
        assert_eq!(scans[0].files_missing, 2);
        assert!(scans[0].completed_at.is_some());
    }
}
