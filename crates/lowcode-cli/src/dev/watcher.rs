//! Project watcher for `lowcode start`.
//!
//! Watches the project recursively and forwards relevant changes over a
//! channel. Dropping the notify watcher closes the channel, which is how the
//! watch loop learns the session is over.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{CliError, Result};

/// A relevant change under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Which paths never trigger a rebuild.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    root: PathBuf,
    /// Output trees, relative to the root.
    outputs: Vec<PathBuf>,
}

impl IgnoreRules {
    /// `outputs` may be absolute or relative to `root`; those outside the
    /// root are dropped.
    pub fn new(root: impl Into<PathBuf>, outputs: impl IntoIterator<Item = PathBuf>) -> Self {
        let root = root.into();
        let outputs = outputs
            .into_iter()
            .filter_map(|path| {
                if path.is_absolute() {
                    path.strip_prefix(&root).ok().map(Path::to_path_buf)
                } else {
                    Some(path)
                }
            })
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        Self { root, outputs }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Outside the root, inside `node_modules`, inside an output tree, or
    /// hidden.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return true;
        };

        if self.outputs.iter().any(|output| relative.starts_with(output)) {
            return true;
        }

        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            name == "node_modules" || (name.starts_with('.') && name != "." && name != "..")
        })
    }
}

pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `rules.root()`.
    pub fn new(rules: IgnoreRules) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        let root = rules.root().to_path_buf();
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(256);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if rules.is_ignored(path) {
                    continue;
                }
                let change = match event.kind {
                    EventKind::Create(_) => FileChange::Created(path.clone()),
                    EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                // The receiver is gone once the session closed.
                let _ = tx.blocking_send(change);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                watcher: Some(watcher),
                root,
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching. The change channel closes once pending events drain.
    pub fn close(&mut self) {
        if self.watcher.take().is_some() {
            debug!(root = %self.root.display(), "watcher closed");
        }
    }
}

/// Collect `first` plus everything arriving within `window` of the last
/// change. Duplicate paths are reported once.
pub async fn debounce(
    first: FileChange,
    rx: &mut mpsc::Receiver<FileChange>,
    window: Duration,
) -> Vec<FileChange> {
    let mut batch = vec![first];
    while let Ok(Some(change)) = tokio::time::timeout(window, rx.recv()).await {
        if !batch.iter().any(|seen| seen.path() == change.path()) {
            batch.push(change);
        }
    }
    batch
}
