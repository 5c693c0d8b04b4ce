//! Real-time file system watcher using the `notify` crate.
//!
//! notify delivers events on its own thread. They are classified there and
//! forwarded in order into a bounded channel that the file monitor drains.

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, trace};
use vault_core::paths::NormalizedPath;

/// Kinds of file changes the monitor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: NormalizedPath,
    pub at: Instant,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            path: NormalizedPath::new(path),
            at: Instant::now(),
        }
    }
}

/// Keeps the OS subscription alive; dropping it unsubscribes.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Subscribe recursively to `root`. Events arrive on the returned receiver.
    pub fn watch(root: &Path, capacity: usize) -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (tx, rx) = mpsc::channel::<ChangeEvent>(capacity.max(1));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in classify_event(&event) {
                        // Receiver gone means the monitor is shutting down.
                        if tx.blocking_send(change).is_err() {
                            trace!("file monitor gone, discarding event");
                            return;
                        }
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("cannot watch {}", root.display()))?;
        info!("Watching: {}", root.display());

        Ok((
            Self {
                watcher,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    /// Explicit unsubscribe; dropping the watcher has the same effect.
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            trace!("unwatch {}: {}", self.root.display(), e);
        }
    }
}

/// Classify a notify event into our change kinds
pub fn classify_event(event: &Event) -> Vec<ChangeEvent> {
    let mut changes = Vec::new();
    let mut push = |kind, path: &PathBuf| changes.push(ChangeEvent::new(kind, path));

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => {}
        EventKind::Create(_) => {
            for path in &event.paths {
                push(ChangeKind::Created, path);
            }
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => {}
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => {
                for path in &event.paths {
                    push(ChangeKind::Deleted, path);
                }
            }
            RenameMode::To => {
                for path in &event.paths {
                    push(ChangeKind::Created, path);
                }
            }
            RenameMode::Both if event.paths.len() >= 2 => {
                push(ChangeKind::Deleted, &event.paths[0]);
                push(ChangeKind::Created, &event.paths[1]);
            }
            _ => {}
        },
        EventKind::Modify(_) => {
            for path in &event.paths {
                push(ChangeKind::Modified, path);
            }
        }
        EventKind::Remove(RemoveKind::Folder) => {}
        EventKind::Remove(_) => {
            for path in &event.paths {
                push(ChangeKind::Deleted, path);
            }
        }
        _ => {}
    }

    changes
}
