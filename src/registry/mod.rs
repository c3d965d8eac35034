//! OS font registration collaborators.
//!
//! The catalog only ever states intent. A [`FontRegistry`] is the seam where
//! that intent becomes an OS-visible registration, and every call through it
//! may fail without consequence beyond a log line: the drift sweep repairs it.

pub mod user_dir;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::RegistryError;

pub use user_dir::UserFontDirRegistry;

pub trait FontRegistry: Send + Sync {
    fn register(&self, path: &Path) -> Result<(), RegistryError>;
    fn unregister(&self, path: &Path) -> Result<(), RegistryError>;
    fn is_registered(&self, path: &Path) -> Result<bool, RegistryError>;
}

/// In-process registry that only remembers what it was told.
///
/// Used for dry runs and as the test double for reconciliation. Failure
/// injection makes every command fail until switched off again.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    registered: Mutex<HashSet<PathBuf>>,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Registered paths, sorted.
    pub fn registered(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.lock().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Change registration state behind the catalog's back, as a user
    /// removing a font through system settings would.
    pub fn force_state(&self, path: &Path, registered: bool) {
        let mut set = self.lock();
        if registered {
            set.insert(path.to_path_buf());
        } else {
            set.remove(path);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.registered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_failing(&self, path: &Path) -> Result<(), RegistryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::Rejected(path.to_path_buf()));
        }
        Ok(())
    }
}

impl FontRegistry for MemoryRegistry {
    fn register(&self, path: &Path) -> Result<(), RegistryError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(path)?;
        self.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn unregister(&self, path: &Path) -> Result<(), RegistryError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing(path)?;
        self.lock().remove(path);
        Ok(())
    }

    fn is_registered(&self, path: &Path) -> Result<bool, RegistryError> {
        self.check_failing(path)?;
        Ok(self.lock().contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_registry_tracks_state_and_calls() {
        let registry = MemoryRegistry::new();
        let path = Path::new("/fonts/Serif.ttf");

        registry.register(path).unwrap();
        assert!(registry.is_registered(path).unwrap());
        registry.unregister(path).unwrap();
        assert!(!registry.is_registered(path).unwrap());

        assert_eq!(registry.register_calls(), 1);
        assert_eq!(registry.unregister_calls(), 1);
    }

    #[test]
    fn test_memory_registry_failure_injection() {
        let registry = MemoryRegistry::new();
        let path = Path::new("/fonts/Serif.ttf");

        registry.set_failing(true);
        assert!(registry.register(path).is_err());
        assert!(registry.is_registered(path).is_err());
        registry.set_failing(false);

        assert!(!registry.is_registered(path).unwrap());
        assert_eq!(registry.register_calls(), 1);
    }
}
