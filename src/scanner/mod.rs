pub mod discovery;
pub mod formats;

use anyhow::{Context, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::db::{now_millis, Database, FileStat, FileStatus, ScanStatus, Source};
use crate::error::StoreResult;
use crate::introspect::{FaceInfo, FaceIntrospector};

pub use discovery::{discover_fonts, Discovery};
pub use formats::FontFormat;

/// Files introspected in parallel before their store writes are applied.
const PROBE_CHUNK: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Files recorded with status ok.
    pub scanned: usize,
    /// Files recorded with status error.
    pub failed: usize,
    /// Files newly marked missing by this scan.
    pub missing_paths: Vec<PathBuf>,
    /// Files whose faces lost their activation during this scan.
    pub deactivated_paths: Vec<PathBuf>,
}

impl ScanResult {
    pub fn merge(&mut self, other: ScanResult) {
        self.scanned += other.scanned;
        self.failed += other.failed;
        self.missing_paths.extend(other.missing_paths);
        self.deactivated_paths.extend(other.deactivated_paths);
    }
}

/// Why a single-path scan did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension,
    OutsideSources,
    NotAFile,
}

/// Outcome of scanning one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathScan {
    Scanned { faces: usize, cleared_activation: bool },
    Failed { message: String, cleared_activation: bool },
    /// The path could not be stat'ed. `existed` tells whether the store knew it.
    Missing { existed: bool },
    Skipped(SkipReason),
}

enum ProbeOutcome {
    Gone,
    Described(FileStat, Vec<FaceInfo>),
    Failed(FileStat, String),
}

struct Probe {
    path: PathBuf,
    extension: String,
    outcome: ProbeOutcome,
}

pub struct Scanner {
    introspector: Arc<dyn FaceIntrospector>,
    pool: ThreadPool,
    follow_symlinks: bool,
}

impl Scanner {
    pub fn new(introspector: Arc<dyn FaceIntrospector>, config: &ScannerConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("fontshelf-scan-{}", i))
            .build()
            .context("Failed to build scanner thread pool")?;
        Ok(Self {
            introspector,
            pool,
            follow_symlinks: config.follow_symlinks,
        })
    }

    /// Walk a source, record every supported file, then mark files of this
    /// source that were not seen during the walk as missing.
    pub fn scan_directory(&self, db: &Database, source: &Source) -> StoreResult<ScanResult> {
        let started = now_millis();
        let scan_id = db.begin_scan(source.id)?;
        info!("Scanning source {}", source.path.display());

        match self.scan_directory_inner(db, source, started) {
            Ok(result) => {
                db.finish_scan(
                    scan_id,
                    result.scanned,
                    result.failed,
                    result.missing_paths.len(),
                    ScanStatus::Completed,
                )?;
                info!(
                    "Scan of {} complete: {} ok, {} failed, {} missing",
                    source.path.display(),
                    result.scanned,
                    result.failed,
                    result.missing_paths.len()
                );
                Ok(result)
            }
            Err(e) => {
                if let Err(record_err) = db.finish_scan(scan_id, 0, 0, 0, ScanStatus::Failed) {
                    warn!("Could not record failed scan {}: {}", scan_id, record_err);
                }
                Err(e)
            }
        }
    }

    fn scan_directory_inner(
        &self,
        db: &Database,
        source: &Source,
        started: i64,
    ) -> StoreResult<ScanResult> {
        let found = discover_fonts(&source.path, self.follow_symlinks);
        let mut result = self.scan_files(db, source, &found.fonts)?;

        let missing = db.mark_stale_files_missing(source.id, started, &found.unreadable)?;
        for path in &missing {
            debug!("Missing: {}", path.display());
        }
        result.missing_paths = missing;
        Ok(result)
    }

    /// Scan every supported file below `dir`, which lies inside `source`.
    /// Unlike [`Scanner::scan_directory`] nothing is marked missing.
    pub fn scan_subtree(&self, db: &Database, source: &Source, dir: &Path) -> StoreResult<ScanResult> {
        let found = discover_fonts(dir, self.follow_symlinks);
        self.scan_files(db, source, &found.fonts)
    }

    /// Bring a source up to date without rescanning what is unchanged.
    ///
    /// Known files that can no longer be stat'ed are marked missing. Files
    /// the store does not know, files that were missing and files whose
    /// size or modification time moved are scanned. Everything else keeps
    /// its faces and activation.
    pub fn catch_up(&self, db: &Database, source: &Source) -> StoreResult<ScanResult> {
        let found = discover_fonts(&source.path, self.follow_symlinks);
        let known: HashMap<PathBuf, _> = db
            .list_source_files(source.id)?
            .into_iter()
            .map(|file| (file.path.clone(), file))
            .collect();

        let mut result = ScanResult::default();
        for (path, file) in &known {
            if file.status == FileStatus::Missing || found.is_unreadable(path) {
                continue;
            }
            if std::fs::metadata(path).is_err() && db.mark_file_missing(path)? {
                debug!("Missing: {}", path.display());
                result.missing_paths.push(path.clone());
            }
        }
        result.missing_paths.sort();

        let candidates: Vec<PathBuf> = found
            .fonts
            .into_iter()
            .filter(|path| match known.get(path) {
                None => true,
                Some(file) if file.status == FileStatus::Missing => true,
                Some(file) => std::fs::metadata(path)
                    .map(|m| {
                        let stat = FileStat::from_metadata(&m);
                        stat.size_bytes as i64 != file.size_bytes
                            || stat.modified_at != file.modified_at
                    })
                    .unwrap_or(false),
            })
            .collect();
        if !candidates.is_empty() {
            debug!(
                "Catch-up of {}: {} new or changed file(s)",
                source.path.display(),
                candidates.len()
            );
        }
        result.merge(self.scan_files(db, source, &candidates)?);
        Ok(result)
    }

    /// Scan one path on behalf of the change feed.
    pub fn scan_path(&self, db: &Database, path: &Path) -> StoreResult<PathScan> {
        if FontFormat::from_path(path).is_none() {
            return Ok(PathScan::Skipped(SkipReason::UnsupportedExtension));
        }
        let Some(source) = db.find_source_for_path(path)? else {
            return Ok(PathScan::Skipped(SkipReason::OutsideSources));
        };

        if path.is_dir() {
            return Ok(PathScan::Skipped(SkipReason::NotAFile));
        }
        let probe = self.probe(path);
        self.apply(db, &source, probe)
    }

    fn scan_files(
        &self,
        db: &Database,
        source: &Source,
        candidates: &[PathBuf],
    ) -> StoreResult<ScanResult> {
        let mut result = ScanResult::default();

        for chunk in candidates.chunks(PROBE_CHUNK) {
            let probes: Vec<Probe> = self
                .pool
                .install(|| chunk.par_iter().map(|path| self.probe(path)).collect());

            for probe in probes {
                let path = probe.path.clone();
                let mut one = ScanResult::default();
                match self.apply(db, source, probe)? {
                    PathScan::Scanned {
                        cleared_activation, ..
                    } => {
                        one.scanned = 1;
                        if cleared_activation {
                            one.deactivated_paths.push(path);
                        }
                    }
                    PathScan::Failed {
                        cleared_activation, ..
                    } => {
                        one.failed = 1;
                        if cleared_activation {
                            one.deactivated_paths.push(path);
                        }
                    }
                    // Vanished between the walk and the stat
                    PathScan::Missing { existed: true } => one.missing_paths.push(path),
                    PathScan::Missing { existed: false } | PathScan::Skipped(_) => {}
                }
                result.merge(one);
            }
        }

        Ok(result)
    }

    /// Stat and introspect a path. Runs on scanner workers; touches no store.
    fn probe(&self, path: &Path) -> Probe {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let outcome = match std::fs::metadata(path) {
            Err(_) => ProbeOutcome::Gone,
            Ok(metadata) => {
                let stat = FileStat::from_metadata(&metadata);
                match self.introspector.describe(path) {
                    Ok(faces) if faces.is_empty() => {
                        ProbeOutcome::Failed(stat, "no faces reported".to_string())
                    }
                    Ok(faces) => ProbeOutcome::Described(stat, faces),
                    Err(e) => ProbeOutcome::Failed(stat, e.to_string()),
                }
            }
        };

        Probe {
            path: path.to_path_buf(),
            extension,
            outcome,
        }
    }

    /// Apply a probe to the store. This is the serialized write tail.
    fn apply(&self, db: &Database, source: &Source, probe: Probe) -> StoreResult<PathScan> {
        let Probe {
            path,
            extension,
            outcome,
        } = probe;

        match outcome {
            ProbeOutcome::Gone => {
                let existed = db.mark_file_missing(&path)?;
                Ok(PathScan::Missing { existed })
            }
            ProbeOutcome::Described(stat, faces) => {
                let outcome = db.upsert_file_scan(&path, source.id, &extension, &stat, &faces)?;
                debug!("Scanned {} ({} faces)", path.display(), outcome.faces);
                Ok(PathScan::Scanned {
                    faces: outcome.faces,
                    cleared_activation: outcome.cleared_activation,
                })
            }
            ProbeOutcome::Failed(stat, message) => {
                warn!("Introspection failed for {}: {}", path.display(), message);
                let cleared = db.record_file_error(&path, source.id, &extension, &stat, &message)?;
                Ok(PathScan::Failed {
                    message,
                    cleared_activation: cleared,
                })
            }
        }
    }
}
