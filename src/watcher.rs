//! Directory Watcher
//!
//! Polls a directory tree and reports file changes as batches of
//! `ChangeEvent`s. A batch holds every change observed in one poll.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use walkdir::WalkDir;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

type Snapshot = HashMap<PathBuf, FileStamp>;

/// Stamp every regular file under `root`. Unreadable entries are skipped.
fn scan(root: &Path) -> Snapshot {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            let stamp = FileStamp {
                modified: meta.modified().ok(),
                len: meta.len(),
            };
            Some((entry.into_path(), stamp))
        })
        .collect()
}

/// Changes between two snapshots, ordered by path
fn diff(old: &Snapshot, new: &Snapshot) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = new
        .iter()
        .filter_map(|(path, stamp)| match old.get(path) {
            None => Some(ChangeEvent::new(ChangeKind::Added, path.clone())),
            Some(previous) if previous != stamp => {
                Some(ChangeEvent::new(ChangeKind::Modified, path.clone()))
            }
            Some(_) => None,
        })
        .chain(
            old.keys()
                .filter(|path| !new.contains_key(*path))
                .map(|path| ChangeEvent::new(ChangeKind::Deleted, path.clone())),
        )
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

/// Polling watcher over one directory tree
pub struct DirectoryWatcher {
    root: PathBuf,
    interval: Duration,
}

impl DirectoryWatcher {
    pub fn new(root: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            root: root.into(),
            interval,
        }
    }

    /// Start polling; the stream ends only when the watcher task stops
    ///
    /// Changes made after this call returns are reported.
    pub fn spawn(self) -> ReceiverStream<Vec<ChangeEvent>> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut previous = scan(&self.root);
        info!(
            "Watching {} ({} files, every {:?})",
            self.root.display(),
            previous.len(),
            self.interval
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                let root = self.root.clone();
                let current = match tokio::task::spawn_blocking(move || scan(&root)).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        debug!("Directory scan aborted: {}", e);
                        continue;
                    }
                };

                let events = diff(&previous, &current);
                previous = current;
                if events.is_empty() {
                    continue;
                }

                debug!("Detected {} change(s) in {}", events.len(), self.root.display());
                if tx.send(events).await.is_err() {
                    debug!("Change receiver dropped, stopping watcher");
                    break;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}
