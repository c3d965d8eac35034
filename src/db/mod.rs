//! Metadata store.
//!
//! A single SQLite file per library root holds sources, font files, families,
//! faces, the facet taxonomy and per-face activation flags. All access goes
//! through one connection behind a mutex, so every public operation is
//! serialized and every multi-statement write runs in its own transaction;
//! readers never observe a half-applied file update.

mod schema;
pub mod activation;
pub mod facets;
pub mod families;
pub mod files;
pub mod sources;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreResult;

pub use activation::{ActivationChange, ActivationFile, ActivationState};
pub use facets::{FacetColumn, FacetSyncReport, FacetValue};
pub use families::{normalize_family_key, FaceEntry, FamilyEntry, FamilyFacet};
pub use files::{FileScanOutcome, FileStat, FileStatus, FontFile};
pub use schema::SCHEMA;
pub use sources::{LibraryStats, ScanRecord, ScanStatus, Source};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn initialize(&self) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute_batch(schema::PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Close the underlying connection, surfacing any error SQLite reports.
    pub fn close(self) -> StoreResult<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, e)| e.into())
    }

    /// The serialized access path. Held for the duration of one operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Current wall-clock time as unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
