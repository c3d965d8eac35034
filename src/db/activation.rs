//! Per-face activation state.
//!
//! A face is in one of three states: not installable (web-only format, or
//! its file is not `ok`), inactive, or active. The OS registers whole files,
//! so a transition only calls for an OS command when it moves a file's
//! active-face count between zero and non-zero.

use rusqlite::OptionalExtension;
use serde::Serialize;
use std::path::PathBuf;

use super::files::FileStatus;
use super::Database;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    NotInstallable,
    Inactive,
    Active,
}

/// Outcome of an activation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationChange {
    pub face_id: i64,
    pub path: PathBuf,
    /// First active face of the file: register the file with the OS.
    pub should_register: bool,
    /// Last active face of the file went inactive: unregister it.
    pub should_unregister: bool,
    /// The flag actually stored for the face.
    pub activated: bool,
}

/// A file the drift sweep must check against the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationFile {
    pub file_id: i64,
    pub path: PathBuf,
    pub status: FileStatus,
    pub active_faces: i64,
}

impl ActivationFile {
    /// Whether the catalog intends this file to be registered.
    pub fn should_be_registered(&self) -> bool {
        self.status == FileStatus::Ok && self.active_faces > 0
    }
}

struct FaceTarget {
    status: FileStatus,
    install_supported: bool,
    activated: bool,
}

impl Database {
    fn face_target(&self, face_id: i64) -> StoreResult<FaceTarget> {
        let conn = self.conn();
        let target = conn
            .query_row(
                r#"
                SELECT fi.status, fa.install_supported, fa.activated
                FROM faces fa
                JOIN font_files fi ON fi.id = fa.file_id
                WHERE fa.id = ?
                "#,
                [face_id],
                |row| {
                    let status: String = row.get(0)?;
                    Ok(FaceTarget {
                        status: FileStatus::from_str(&status).unwrap_or(FileStatus::Error),
                        install_supported: row.get(1)?,
                        activated: row.get(2)?,
                    })
                },
            )
            .optional()?;
        target.ok_or(StoreError::FaceNotFound(face_id))
    }

    pub fn face_state(&self, face_id: i64) -> StoreResult<ActivationState> {
        let target = self.face_target(face_id)?;
        Ok(if !target.install_supported || target.status != FileStatus::Ok {
            ActivationState::NotInstallable
        } else if target.activated {
            ActivationState::Active
        } else {
            ActivationState::Inactive
        })
    }

    /// Store the activation flag for a face and report which OS command, if
    /// any, the caller must issue for the face's file.
    ///
    /// Requests against a not-installable face are accepted and normalized
    /// to `false`.
    pub fn set_face_activated(&self, face_id: i64, desired: bool) -> StoreResult<ActivationChange> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let (file_id, path, status, install_supported): (i64, String, String, bool) = tx
            .query_row(
                r#"
                SELECT fa.file_id, fi.path, fi.status, fa.install_supported
                FROM faces fa
                JOIN font_files fi ON fi.id = fa.file_id
                WHERE fa.id = ?
                "#,
                [face_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?
            .ok_or(StoreError::FaceNotFound(face_id))?;

        let installable = install_supported && FileStatus::from_str(&status) == Some(FileStatus::Ok);
        let activated = desired && installable;

        let count_active = |tx: &rusqlite::Transaction<'_>| -> rusqlite::Result<i64> {
            tx.query_row(
                "SELECT COUNT(*) FROM faces WHERE file_id = ? AND activated = 1",
                [file_id],
                |row| row.get(0),
            )
        };

        let before = count_active(&tx)?;
        tx.execute(
            "UPDATE faces SET activated = ? WHERE id = ?",
            rusqlite::params![activated, face_id],
        )?;
        let after = count_active(&tx)?;
        tx.commit()?;

        Ok(ActivationChange {
            face_id,
            path: PathBuf::from(path),
            should_register: before == 0 && after > 0,
            should_unregister: before > 0 && after == 0,
            activated,
        })
    }

    /// Files of installable formats that have faces, with their active-face
    /// counts. Missing and error files are included so a stale OS
    /// registration for them can be removed.
    pub fn list_activation_files(&self) -> StoreResult<Vec<ActivationFile>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT fi.id, fi.path, fi.status, SUM(fa.activated)
            FROM font_files fi
            JOIN faces fa ON fa.file_id = fi.id
            WHERE fa.install_supported = 1
            GROUP BY fi.id
            ORDER BY fi.path
            "#,
        )?;
        let files = stmt
            .query_map([], |row| {
                let status: String = row.get(2)?;
                Ok(ActivationFile {
                    file_id: row.get(0)?,
                    path: PathBuf::from(row.get::<_, String>(1)?),
                    status: FileStatus::from_str(&status).unwrap_or(FileStatus::Error),
                    active_faces: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{face, face_ids, memory_db, seed_file};

    #[test]
    fn test_register_only_on_first_active_face() {
        let db = memory_db();
        let (_, path) = seed_file(
            &db,
            "A.ttf",
            &[face(0, "Alpha", "Regular"), face(1, "Alpha", "Bold")],
        );
        let ids = face_ids(&db, &path);

        let first = db.set_face_activated(ids[0], true).unwrap();
        assert!(first.should_register);
        assert!(!first.should_unregister);
        assert!(first.activated);
        assert_eq!(first.path, path);

        let second = db.set_face_activated(ids[1], true).unwrap();
        assert!(!second.should_register);
        assert!(second.activated);

        // Re-activating an active face is not a transition
        let again = db.set_face_activated(ids[1], true).unwrap();
        assert!(!again.should_register && !again.should_unregister);

        let off_first = db.set_face_activated(ids[0], false).unwrap();
        assert!(!off_first.should_unregister);
        let off_second = db.set_face_activated(ids[1], false).unwrap();
        assert!(off_second.should_unregister);
        assert!(!off_second.activated);

        let idle = db.set_face_activated(ids[1], false).unwrap();
        assert!(!idle.should_register && !idle.should_unregister);
    }

    #[test]
    fn test_web_only_face_is_normalized_to_inactive() {
        let db = memory_db();
        let (_, path) = seed_file(&db, "Sans.woff2", &[face(0, "Sans", "Regular")]);
        let id = face_ids(&db, &path)[0];

        assert_eq!(db.face_state(id).unwrap(), ActivationState::NotInstallable);
        let change = db.set_face_activated(id, true).unwrap();
        assert!(!change.activated);
        assert!(!change.should_register);
    }

    #[test]
    fn test_missing_file_faces_are_not_installable() {
        let db = memory_db();
        let (_, path) = seed_file(&db, "Serif.ttf", &[face(0, "Serif", "Regular")]);
        let id = face_ids(&db, &path)[0];

        assert_eq!(db.face_state(id).unwrap(), ActivationState::Inactive);
        db.set_face_activated(id, true).unwrap();
        assert_eq!(db.face_state(id).unwrap(), ActivationState::Active);

        db.mark_file_missing(&path).unwrap();
        assert_eq!(db.face_state(id).unwrap(), ActivationState::NotInstallable);
        let change = db.set_face_activated(id, true).unwrap();
        assert!(!change.activated);
        assert!(!change.should_register);
    }

    #[test]
    fn test_unknown_face() {
        let db = memory_db();
        let err = db.set_face_activated(42, true).unwrap_err();
        assert!(matches!(err, StoreError::FaceNotFound(42)));
        assert!(!err.is_persistence());
    }

    #[test]
    fn test_list_activation_files() {
        let db = memory_db();
        let (_, a) = seed_file(
            &db,
            "A.ttf",
            &[face(0, "Alpha", "Regular"), face(1, "Alpha", "Bold")],
        );
        seed_file(&db, "B.otf", &[face(0, "Beta", "Regular")]);
        seed_file(&db, "C.woff", &[face(0, "Gamma", "Regular")]);

        let ids = face_ids(&db, &a);
        db.set_face_activated(ids[0], true).unwrap();
        db.set_face_activated(ids[1], true).unwrap();

        let files = db.list_activation_files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, a);
        assert_eq!(files[0].active_faces, 2);
        assert!(files[0].should_be_registered());
        assert_eq!(files[1].active_faces, 0);
        assert!(!files[1].should_be_registered());
    }
}
