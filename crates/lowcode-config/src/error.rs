//! Error types for option resolution and config loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Config file location errors
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("config file must be a regular file, path: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("unsupported configuration format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    // Config parsing errors
    #[error("failed to load config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A normalized field received a value of the wrong JSON kind.
    #[error("{field} prop type is invalid, expect {expected}, got {actual}")]
    Type {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    // Cross-field invariants
    #[error("library option is required when the umd format is requested")]
    MissingLibrary,

    #[error("package.json not found at {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("invalid package.json at {}: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("baseUrl has no entry for mode '{0}'")]
    MissingBaseUrl(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Short remediation text shown under the error by the CLI.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigError::NotFound(_) => {
                Some("Pass an existing file to --config, or drop the flag to use discovery")
            }
            ConfigError::UnsupportedFormat(_) => {
                Some("Config files are loaded as data: use build.config.json or build.config.toml")
            }
            ConfigError::MissingLibrary => Some("Pass --library <GlobalName> or set `library` in the config file"),
            ConfigError::MissingManifest(_) => {
                Some("CommonJS and ESM builds externalize dependencies declared in package.json")
            }
            ConfigError::MissingBaseUrl(_) => {
                Some("Add the mode as a key of lowcode.baseUrl or use a single template string")
            }
            _ => None,
        }
    }
}
