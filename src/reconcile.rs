//! External-change detection for Ironpad
//!
//! This module classifies each open document against the state of its
//! backing file on disk, and hosts the file-system watcher that schedules
//! batch checks when something under an open document's directory changes.
//!
//! Classification is a pure function of the stored modification time, the
//! current on-disk modification time, and file existence; the recovery flows
//! (prompt, reload, keep, close) live on the session, which calls in here.

use crate::document::DocumentRecord;
use crate::store::DocumentStore;
use log::warn;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, SystemTime};

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// How a document's backing file compares against the in-memory state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeState {
    /// Disk matches what we last observed (or there is nothing to compare)
    Unchanged,
    /// The file exists and its timestamp is newer than the one we stored
    Modified,
    /// The file no longer exists
    Removed,
}

/// Pure classification from the comparison inputs.
///
/// `stored` is the record's last observed modification time; `current` is
/// the file's present modification time, `None` when the file is gone.
/// A record with no stored baseline has nothing to compare and is always
/// `Unchanged` — this is also what suppresses repeat prompts after the user
/// chose to keep a deleted file open (the baseline is cleared).
pub fn classify_times(
    stored: Option<SystemTime>,
    current: Option<SystemTime>,
) -> FileChangeState {
    let Some(stored) = stored else {
        return FileChangeState::Unchanged;
    };
    match current {
        None => FileChangeState::Removed,
        Some(current) if current > stored => FileChangeState::Modified,
        Some(_) => FileChangeState::Unchanged,
    }
}

/// Classify a document record against the filesystem.
///
/// A document with no path (unsaved buffer) is always `Unchanged`.
pub fn classify(record: &DocumentRecord) -> FileChangeState {
    let Some(path) = record.path.as_deref() else {
        return FileChangeState::Unchanged;
    };
    classify_times(record.file_mod_time, disk_mod_time(path))
}

/// Present on-disk modification time of `path`, `None` when missing.
pub fn disk_mod_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Check Scheduling
// ─────────────────────────────────────────────────────────────────────────────

/// Watches the parent directories of open documents and reports when a
/// batch reconciliation pass is due.
///
/// The watcher only schedules checks — it never classifies. Every reported
/// event collapses into a single "check due" flag the event loop consumes;
/// the batch pass itself re-reads timestamps through [`classify`].
pub struct DocumentWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<PathBuf>,
    /// Directories currently under watch
    watched: HashSet<PathBuf>,
}

impl std::fmt::Debug for DocumentWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl DocumentWatcher {
    /// Create a watcher with nothing under watch yet.
    pub fn new() -> Result<Self, String> {
        let (tx, rx) = channel();
        let watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                Self::handle_event(result, &tx);
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )
        .map_err(|e| format!("Failed to create file watcher: {}", e))?;

        Ok(Self {
            watcher,
            receiver: rx,
            watched: HashSet::new(),
        })
    }

    /// Forward raw notify events as touched paths.
    fn handle_event(result: Result<Event, notify::Error>, tx: &Sender<PathBuf>) {
        match result {
            Ok(event) => {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Err(e) => {
                warn!("File watcher error: {}", e);
            }
        }
    }

    /// Re-sync the watched directory set with the store's open documents.
    pub fn sync_with_store(&mut self, store: &DocumentStore) {
        let wanted: HashSet<PathBuf> = store
            .iter()
            .filter_map(|(_, record)| {
                record
                    .path
                    .as_deref()
                    .and_then(|p| p.parent())
                    .map(|dir| dir.to_path_buf())
            })
            .collect();

        for stale in self.watched.difference(&wanted).cloned().collect::<Vec<_>>() {
            if let Err(e) = self.watcher.unwatch(&stale) {
                warn!("Could not unwatch '{}': {}", stale.display(), e);
            }
            self.watched.remove(&stale);
        }
        for fresh in wanted.difference(&self.watched).cloned().collect::<Vec<_>>() {
            match self.watcher.watch(&fresh, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.watched.insert(fresh);
                }
                Err(e) => {
                    warn!("Could not watch '{}': {}", fresh.display(), e);
                }
            }
        }
    }

    /// Drain pending events; returns `true` when a batch check is due
    /// because something under a watched directory was touched.
    pub fn check_due(&self) -> bool {
        let mut due = false;
        while self.receiver.try_recv().is_ok() {
            due = true;
        }
        due
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentRecord;
    use crate::encoding::{Encoding, EolFormat};
    use std::time::Duration;

    #[test]
    fn test_classify_times_is_pure() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let newer = base + Duration::from_secs(60);

        // Same inputs, same output, independent of call order
        for _ in 0..3 {
            assert_eq!(
                classify_times(Some(base), Some(base)),
                FileChangeState::Unchanged
            );
            assert_eq!(
                classify_times(Some(base), Some(newer)),
                FileChangeState::Modified
            );
            assert_eq!(classify_times(Some(base), None), FileChangeState::Removed);
        }
    }

    #[test]
    fn test_no_baseline_is_always_unchanged() {
        let now = SystemTime::now();
        assert_eq!(classify_times(None, Some(now)), FileChangeState::Unchanged);
        assert_eq!(classify_times(None, None), FileChangeState::Unchanged);
    }

    #[test]
    fn test_older_disk_time_is_unchanged() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let older = base - Duration::from_secs(60);
        assert_eq!(
            classify_times(Some(base), Some(older)),
            FileChangeState::Unchanged
        );
    }

    #[test]
    fn test_classify_pathless_document() {
        let record = DocumentRecord::new_untitled(Encoding::Utf8, EolFormat::Lf);
        assert_eq!(classify(&record), FileChangeState::Unchanged);
    }

    #[test]
    fn test_watcher_schedules_checks_for_open_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observed.txt");
        std::fs::write(&path, "v1").unwrap();

        let mut store = crate::store::DocumentStore::new();
        let mut gen = crate::document::DocIdGenerator::new();
        let id = gen.mint();
        let record = DocumentRecord::from_file(
            path.clone(),
            "v1".to_string(),
            Encoding::Utf8,
            false,
            EolFormat::Lf,
            disk_mod_time(&path),
        );
        store.add_at_end(id, record).unwrap();

        let mut watcher = DocumentWatcher::new().unwrap();
        watcher.sync_with_store(&store);
        assert!(watcher.watched.contains(dir.path()));

        // Drain anything the initial watch queued before touching the file
        while watcher.check_due() {}
        std::fs::write(&path, "v2").unwrap();

        let mut due = false;
        for _ in 0..50 {
            if watcher.check_due() {
                due = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(due, "touching a watched file must schedule a check");

        // Closing the document drops the directory from the watch set
        store.remove(id).unwrap();
        watcher.sync_with_store(&store);
        assert!(watcher.watched.is_empty());
    }

    #[test]
    fn test_classify_against_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watched.txt");
        std::fs::write(&path, "v1").unwrap();
        let observed = disk_mod_time(&path);

        let mut record = DocumentRecord::from_file(
            path.clone(),
            "v1".to_string(),
            Encoding::Utf8,
            false,
            EolFormat::Lf,
            observed,
        );
        assert_eq!(classify(&record), FileChangeState::Unchanged);

        // Push the baseline into the past instead of racing the clock
        record.file_mod_time = observed.map(|t| t - Duration::from_secs(60));
        assert_eq!(classify(&record), FileChangeState::Modified);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(classify(&record), FileChangeState::Removed);
    }
}
