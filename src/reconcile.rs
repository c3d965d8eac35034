//! Activation reconciliation.
//!
//! The store records intent; the [`Reconciler`] turns intent into OS
//! registration commands and repairs drift between the two. OS command
//! failures never propagate out of this module: they are logged and left for
//! the next sweep.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{ActivationChange, Database};
use crate::error::StoreResult;
use crate::registry::FontRegistry;

/// Counts from one drift sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub registered: usize,
    pub unregistered: usize,
    /// OS queries or commands that failed and were left for the next sweep.
    pub failures: usize,
}

pub struct Reconciler {
    registry: Arc<dyn FontRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<dyn FontRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn FontRegistry> {
        &self.registry
    }

    /// Store a face's activation flag and issue the OS command the
    /// transition calls for. Returns the flag actually stored.
    pub fn set_face_activated(
        &self,
        db: &Database,
        face_id: i64,
        desired: bool,
    ) -> StoreResult<bool> {
        let change = db.set_face_activated(face_id, desired)?;
        self.apply(&change);
        Ok(change.activated)
    }

    /// Issue the OS command an activation change asks for, if any.
    pub fn apply(&self, change: &ActivationChange) {
        if change.should_register {
            match self.registry.register(&change.path) {
                Ok(()) => info!("Registered {}", change.path.display()),
                Err(e) => warn!("Failed to register {}: {}", change.path.display(), e),
            }
        } else if change.should_unregister {
            self.unregister_quietly(&change.path);
        }
    }

    /// Best-effort unregister, used for files that went missing or lost
    /// their activation during a rescan.
    pub fn unregister_quietly(&self, path: &Path) -> bool {
        match self.registry.unregister(path) {
            Ok(()) => {
                debug!("Unregistered {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to unregister {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Compare every installable file's intended state with the OS and issue
    /// corrective commands where they disagree.
    ///
    /// Files whose status is no longer ok are included so that a stale OS
    /// registration left behind by a missing or broken file is removed.
    pub fn sweep(&self, db: &Database) -> StoreResult<SweepReport> {
        let files = db.list_activation_files()?;
        let mut report = SweepReport::default();

        for file in files {
            report.checked += 1;
            let wanted = file.should_be_registered();

            let actual = match self.registry.is_registered(&file.path) {
                Ok(actual) => actual,
                Err(e) => {
                    warn!("Could not query registration of {}: {}", file.path.display(), e);
                    report.failures += 1;
                    continue;
                }
            };
            if wanted == actual {
                continue;
            }

            let result = if wanted {
                self.registry.register(&file.path)
            } else {
                self.registry.unregister(&file.path)
            };
            match result {
                Ok(()) if wanted => {
                    info!("Drift: registered {}", file.path.display());
                    report.registered += 1;
                }
                Ok(()) => {
                    info!("Drift: unregistered {}", file.path.display());
                    report.unregistered += 1;
                }
                Err(e) => {
                    warn!("Drift repair failed for {}: {}", file.path.display(), e);
                    report.failures += 1;
                }
            }
        }

        debug!(
            "Sweep checked {} files: +{} -{} ({} failures)",
            report.checked, report.registered, report.unregistered, report.failures
        );
        Ok(report)
    }
}
