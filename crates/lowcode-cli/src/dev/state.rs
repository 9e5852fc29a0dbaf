//! Shared state of a `lowcode start` session.
//!
//! The watcher loop writes, the HTTP handlers read. All locks are
//! `parking_lot::RwLock` and are never held across an await.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use lowcode_builder::EmittedFile;
use parking_lot::RwLock;

/// Outcome of the latest dev build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64 },
    Failed { error: String },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BuildStatus::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// Lifecycle of the watch session.
///
/// Moves forward only: `Running`, then `Closing` once shutdown is requested,
/// then `Closed` when the watch loop has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Closing,
    Closed,
}

/// Bundle files served from memory, keyed by URL path (`/index.js`).
#[derive(Debug, Clone, Default)]
pub struct BundleCache {
    files: HashMap<String, (Vec<u8>, &'static str)>,
}

impl BundleCache {
    pub fn from_files(files: Vec<EmittedFile>) -> Self {
        let files = files
            .into_iter()
            .map(|file| {
                let content_type = content_type(&file.file_name);
                (format!("/{}", file.file_name), (file.content, content_type))
            })
            .collect();
        Self { files }
    }

    pub fn get(&self, path: &str) -> Option<&(Vec<u8>, &'static str)> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// MIME type of a served file, from its extension.
pub fn content_type(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js" | "mjs" | "cjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

pub type SharedState = Arc<DevServerState>;

pub struct DevServerState {
    status: RwLock<BuildStatus>,
    cache: RwLock<BundleCache>,
    /// Serialized `assets.json`, when the project has a package manifest.
    assets: RwLock<Option<String>>,
    session: RwLock<SessionState>,
}

impl Default for DevServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl DevServerState {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            cache: RwLock::new(BundleCache::default()),
            assets: RwLock::new(None),
            session: RwLock::new(SessionState::Running),
        }
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
    }

    /// Record a successful build and swap in its files.
    pub fn complete_build(&self, duration_ms: u64, cache: BundleCache) {
        *self.cache.write() = cache;
        *self.status.write() = BuildStatus::Success { duration_ms };
    }

    /// Record a failed build. The previous files stay cached.
    pub fn fail_build(&self, error: String) {
        *self.status.write() = BuildStatus::Failed { error };
    }

    pub fn status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn cached_file(&self, path: &str) -> Option<(Vec<u8>, &'static str)> {
        self.cache.read().get(path).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    pub fn set_assets(&self, assets: Option<String>) {
        *self.assets.write() = assets;
    }

    pub fn assets(&self) -> Option<String> {
        self.assets.read().clone()
    }

    pub fn session(&self) -> SessionState {
        *self.session.read()
    }

    pub fn is_running(&self) -> bool {
        self.session() == SessionState::Running
    }

    /// Move from `Running` to `Closing`. Returns `false` if a close was
    /// already requested.
    pub fn request_close(&self) -> bool {
        let mut session = self.session.write();
        if *session != SessionState::Running {
            return false;
        }
        *session = SessionState::Closing;
        true
    }

    pub fn finish_close(&self) {
        *self.session.write() = SessionState::Closed;
    }
}
