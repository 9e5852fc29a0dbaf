//! File-based config discovery and loading.
//!
//! Config files are data: they are loaded through figment providers and
//! extracted into a plain JSON value. Script config files are not executed.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Toml};
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::options::resolve_against;

/// Conventional config file names, searched in order.
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "build.config.json",
    "build.config.toml",
    "lowcode.config.json",
    "lowcode.config.toml",
];

/// `package.json` field consulted when no dedicated config file exists.
pub const PACKAGE_JSON_FIELD: &str = "lowcode";

/// Environment variables layered over the config file.
pub const ENV_PREFIX: &str = "LOWCODE_";

/// A located config file and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Json(PathBuf),
    Toml(PathBuf),
    /// The `lowcode` field of a `package.json`.
    PackageJson(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Json(path) | ConfigSource::Toml(path) | ConfigSource::PackageJson(path) => {
                path
            }
        }
    }

    /// Classify an explicit path by its name.
    fn from_path(path: PathBuf) -> Result<Self> {
        if path.file_name().is_some_and(|name| name == "package.json") {
            return Ok(ConfigSource::PackageJson(path));
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigSource::Json(path)),
            Some("toml") => Ok(ConfigSource::Toml(path)),
            _ => Err(ConfigError::UnsupportedFormat(path)),
        }
    }
}

/// Locates and loads the project config file.
///
/// # Example
///
/// ```no_run
/// use lowcode_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new("/path/to/project");
/// if let Some(source) = discovery.find() {
///     let raw = discovery.load(&source).unwrap();
///     println!("{raw}");
/// }
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Search the conventional names, then `package.json`.
    pub fn find(&self) -> Option<ConfigSource> {
        for name in CONFIG_FILE_NAMES {
            let path = self.root.join(name);
            if path.is_file() {
                return ConfigSource::from_path(path).ok();
            }
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        match parsed.get(PACKAGE_JSON_FIELD) {
            Some(field) if !field.is_null() => Some(ConfigSource::PackageJson(pkg_path)),
            _ => None,
        }
    }

    /// Resolve the config source for this invocation.
    ///
    /// An explicit path must exist and be a regular file. Without one the
    /// conventional names are searched, and finding nothing is not an error.
    pub fn locate(&self, explicit: Option<&str>) -> Result<Option<ConfigSource>> {
        let Some(explicit) = explicit else {
            return Ok(self.find());
        };

        let path = resolve_against(&self.root, Path::new(explicit));
        let metadata = fs::metadata(&path).map_err(|_| ConfigError::NotFound(path.clone()))?;
        if !metadata.is_file() {
            return Err(ConfigError::NotAFile(path));
        }
        ConfigSource::from_path(path).map(Some)
    }

    /// Load a config source, with `LOWCODE_*` variables layered on top.
    pub fn load(&self, source: &ConfigSource) -> Result<Value> {
        debug!(path = %source.path().display(), "loading config file");

        let figment = match source {
            ConfigSource::Json(path) => Figment::from(Json::file(path)),
            ConfigSource::Toml(path) => Figment::from(Toml::file(path)),
            ConfigSource::PackageJson(path) => {
                Figment::from(Json::file(path)).focus(PACKAGE_JSON_FIELD)
            }
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).only(&["library", "format"]))
            .extract::<Value>()
            .map_err(|e| ConfigError::Parse {
                path: source.path().to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Environment overrides alone, for projects without a config file.
    pub fn load_env(&self) -> Result<Value> {
        Figment::from(Env::prefixed(ENV_PREFIX).only(&["library", "format"]))
            .extract::<Value>()
            .map_err(|e| ConfigError::Parse {
                path: self.root.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn find_prefers_json_over_toml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.config.toml"), "library = \"A\"").unwrap();
        fs::write(dir.path().join("build.config.json"), r#"{"library":"B"}"#).unwrap();

        let found = ConfigDiscovery::new(dir.path()).find().unwrap();
        assert_eq!(found, ConfigSource::Json(dir.path().join("build.config.json")));
    }

    #[test]
    fn find_ignores_package_json_without_field() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{"name":"ui","lowcode":null}"#).unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn locate_rejects_missing_explicit_path() {
        let dir = TempDir::new().unwrap();
        let err = ConfigDiscovery::new(dir.path())
            .locate(Some("nope.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn locate_rejects_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf.json")).unwrap();
        let err = ConfigDiscovery::new(dir.path())
            .locate(Some("conf.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotAFile(_)));
    }

    #[test]
    fn locate_rejects_script_configs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("build.config.js"), "module.exports = {}").unwrap();
        let err = ConfigDiscovery::new(dir.path())
            .locate(Some("build.config.js"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
