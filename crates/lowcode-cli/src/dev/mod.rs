//! Development session: watch loop state, in-memory server and watcher.

mod server;
mod state;
mod watcher;

pub use server::{DevServer, router};
pub use state::{
    BuildStatus, BundleCache, DevServerState, SessionState, SharedState, content_type,
};
pub use watcher::{FileChange, FileWatcher, IgnoreRules, debounce};
