//! Filesystem notifications feeding the [`ChangeQueue`].

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::ChangeQueue;

/// Watches source roots recursively and queues every path the OS reports.
///
/// The event kind is not trusted: removals and renames are queued like any
/// other change and resolved later by stat'ing the path.
pub struct FsWatcher {
    watcher: RecommendedWatcher,
    roots: BTreeSet<PathBuf>,
}

impl FsWatcher {
    pub fn new(queue: Arc<ChangeQueue>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    let paths = event_paths(event);
                    if !paths.is_empty() {
                        debug!("Watch event for {} path(s)", paths.len());
                        queue.push_batch(paths);
                    }
                }
                Err(e) => warn!("Watch backend error: {}", e),
            }
        })?;

        Ok(Self {
            watcher,
            roots: BTreeSet::new(),
        })
    }

    pub fn roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots.iter()
    }

    /// Watch exactly `roots`, adding and dropping watches as needed.
    pub fn sync_roots(&mut self, roots: &[PathBuf]) {
        let wanted: BTreeSet<PathBuf> = roots.iter().cloned().collect();

        let stale: Vec<PathBuf> = self.roots.difference(&wanted).cloned().collect();
        for root in stale {
            if let Err(e) = self.watcher.unwatch(&root) {
                debug!("Unwatch {} failed: {}", root.display(), e);
            }
            self.roots.remove(&root);
        }

        for root in wanted {
            if self.roots.contains(&root) {
                continue;
            }
            match self.watch(&root) {
                Ok(()) => {
                    self.roots.insert(root);
                }
                Err(e) => warn!("Cannot watch {}: {}", root.display(), e),
            }
        }
    }

    fn watch(&mut self, root: &Path) -> notify::Result<()> {
        self.watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("Watching {}", root.display());
        Ok(())
    }
}

/// Paths worth queueing from one notification. Pure access events change
/// nothing on disk.
fn event_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Access(_) => Vec::new(),
        _ => event.paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};
    use std::time::Duration;
    use tempfile::tempdir;

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_event_paths_keep_every_mutation() {
        let created = event(EventKind::Create(CreateKind::File), &["/f/A.ttf"]);
        assert_eq!(event_paths(created), vec![PathBuf::from("/f/A.ttf")]);

        let removed = event(EventKind::Remove(RemoveKind::Folder), &["/f/old"]);
        assert_eq!(event_paths(removed), vec![PathBuf::from("/f/old")]);

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/f/a.ttf", "/f/b.ttf"],
        );
        assert_eq!(event_paths(renamed).len(), 2);

        let accessed = event(EventKind::Access(AccessKind::Any), &["/f/A.ttf"]);
        assert!(event_paths(accessed).is_empty());
    }

    #[test]
    fn test_sync_roots_tracks_watched_set() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let queue = Arc::new(ChangeQueue::new(Duration::from_millis(10)));
        let mut watcher = FsWatcher::new(queue).unwrap();

        watcher.sync_roots(&[a.path().to_path_buf(), b.path().to_path_buf()]);
        assert_eq!(watcher.roots().count(), 2);

        watcher.sync_roots(&[b.path().to_path_buf()]);
        let roots: Vec<_> = watcher.roots().cloned().collect();
        assert_eq!(roots, vec![b.path().to_path_buf()]);

        // Missing directories are skipped, not fatal
        watcher.sync_roots(&[b.path().join("does-not-exist")]);
        assert_eq!(watcher.roots().count(), 0);
    }
}
