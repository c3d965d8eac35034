//! Debounced change-event queue.
//!
//! Watch notifications land here as bare paths. Each path is remembered with
//! the instant it last changed and becomes ready once it has been quiet for
//! the debounce window, so a burst of writes to one file turns into a single
//! rescan. Exactly one drain runs at a time.

pub mod fs;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub use fs::FsWatcher;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Paths handed to the handler.
    pub processed: usize,
    /// Times the pending set was re-checked and found work.
    pub passes: usize,
    /// Paths still waiting out their debounce window afterwards.
    pub remaining: usize,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<PathBuf, Instant>,
    draining: bool,
}

pub struct ChangeQueue {
    debounce: Duration,
    state: Mutex<QueueState>,
}

impl ChangeQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: Mutex::new(QueueState::default()),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Queue a changed path. A path already pending has its quiet period
    /// restarted.
    pub fn push(&self, path: impl Into<PathBuf>) {
        self.lock().pending.insert(path.into(), Instant::now());
    }

    pub fn push_batch<I>(&self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let now = Instant::now();
        let mut state = self.lock();
        for path in paths {
            state.pending.insert(path, now);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    /// Hand every ready path to `handler`, re-checking the pending set until
    /// no ready path is left. `force` ignores the debounce window.
    ///
    /// Returns `Ok(None)` without doing anything when another drain is in
    /// flight; paths pushed meanwhile are picked up by that drain's re-check.
    /// When the handler fails, the failing path and the rest of its pass go
    /// back into the queue and the error is returned.
    pub fn drain<F, E>(&self, force: bool, mut handler: F) -> Result<Option<DrainStats>, E>
    where
        F: FnMut(&Path) -> Result<(), E>,
    {
        {
            let mut state = self.lock();
            if state.draining {
                return Ok(None);
            }
            state.draining = true;
        }
        let _guard = DrainGuard { queue: self };

        let mut stats = DrainStats::default();
        loop {
            let ready = self.take_ready(force);
            if ready.is_empty() {
                break;
            }
            stats.passes += 1;

            let mut batch = ready.into_iter();
            while let Some((path, changed_at)) = batch.next() {
                if let Err(e) = handler(&path) {
                    self.requeue(std::iter::once((path, changed_at)).chain(batch));
                    return Err(e);
                }
                stats.processed += 1;
            }
        }

        stats.remaining = self.pending_len();
        Ok(Some(stats))
    }

    fn take_ready(&self, force: bool) -> Vec<(PathBuf, Instant)> {
        let now = Instant::now();
        let mut state = self.lock();
        let ready: Vec<PathBuf> = state
            .pending
            .iter()
            .filter(|(_, changed_at)| force || now.duration_since(**changed_at) >= self.debounce)
            .map(|(path, _)| path.clone())
            .collect();

        let mut taken: Vec<(PathBuf, Instant)> = ready
            .into_iter()
            .filter_map(|path| state.pending.remove_entry(&path))
            .collect();
        taken.sort_by(|a, b| a.0.cmp(&b.0));
        taken
    }

    fn requeue(&self, paths: impl Iterator<Item = (PathBuf, Instant)>) {
        let mut state = self.lock();
        for (path, changed_at) in paths {
            // A newer notification for the same path wins
            state.pending.entry(path).or_insert(changed_at);
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the draining flag however the drain ends.
struct DrainGuard<'a> {
    queue: &'a ChangeQueue,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock().draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn collect(queue: &ChangeQueue, force: bool) -> (Option<DrainStats>, Vec<PathBuf>) {
        let mut seen = Vec::new();
        let stats = queue
            .drain(force, |path| {
                seen.push(path.to_path_buf());
                Ok::<_, Infallible>(())
            })
            .unwrap();
        (stats, seen)
    }

    #[test]
    fn test_bursts_coalesce_into_one_path() {
        let queue = ChangeQueue::new(Duration::from_millis(0));
        for _ in 0..5 {
            queue.push("/fonts/A.ttf");
        }
        queue.push_batch(vec![PathBuf::from("/fonts/A.ttf"), PathBuf::from("/fonts/B.otf")]);
        assert_eq!(queue.pending_len(), 2);

        let (stats, seen) = collect(&queue, false);
        assert_eq!(
            seen,
            vec![PathBuf::from("/fonts/A.ttf"), PathBuf::from("/fonts/B.otf")]
        );
        assert_eq!(stats.unwrap().processed, 2);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_paths_wait_out_the_debounce_window() {
        let queue = ChangeQueue::new(Duration::from_secs(60));
        queue.push("/fonts/A.ttf");

        let (stats, seen) = collect(&queue, false);
        assert!(seen.is_empty());
        assert_eq!(stats.unwrap().remaining, 1);

        let (_, seen) = collect(&queue, true);
        assert_eq!(seen, vec![PathBuf::from("/fonts/A.ttf")]);
    }

    #[test]
    fn test_pushes_during_a_drain_are_picked_up_by_the_recheck() {
        let queue = ChangeQueue::new(Duration::from_millis(0));
        queue.push("/fonts/A.ttf");

        let mut seen = Vec::new();
        let stats = queue
            .drain(true, |path| {
                if path.ends_with("A.ttf") {
                    queue.push("/fonts/B.otf");
                    // A nested drain is deferred, not interleaved
                    let nested = queue.drain(true, |_| Ok::<_, Infallible>(())).unwrap();
                    assert!(nested.is_none());
                }
                seen.push(path.to_path_buf());
                Ok::<_, Infallible>(())
            })
            .unwrap()
            .unwrap();

        assert_eq!(
            seen,
            vec![PathBuf::from("/fonts/A.ttf"), PathBuf::from("/fonts/B.otf")]
        );
        assert_eq!(stats.passes, 2);
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_handler_error_requeues_unprocessed_paths() {
        let queue = ChangeQueue::new(Duration::from_millis(0));
        queue.push_batch(vec![
            PathBuf::from("/fonts/A.ttf"),
            PathBuf::from("/fonts/B.otf"),
            PathBuf::from("/fonts/C.ttc"),
        ]);

        let result = queue.drain(true, |path| {
            if path.ends_with("B.otf") {
                Err("disk full")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("disk full"));
        assert!(!queue.is_draining());
        // A was handled; B and C are back in the queue
        assert_eq!(queue.pending_len(), 2);

        let (_, seen) = collect(&queue, true);
        assert_eq!(
            seen,
            vec![PathBuf::from("/fonts/B.otf"), PathBuf::from("/fonts/C.ttc")]
        );
    }
}
