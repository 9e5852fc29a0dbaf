//! Error handling for the lowcode CLI.
//!
//! Library errors convert into [`CliError`] through `#[from]`, and every
//! error becomes a [`miette::Report`] at `main` so it is printed with its code,
//! help text and, for check failures, the offending source lines.

use std::path::PathBuf;

use lowcode_config::ConfigError;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] lowcode_builder::Error),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dev server failed to bind or stopped unexpectedly.
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{err}\n\nHint: {hint}"))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{msg}: {err}"))
        })
    }
}

/// Convert a CLI error into a report for `main`.
///
/// Builder and config errors keep their diagnostic codes and help text.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Build(e) => miette::Report::new(e),
        CliError::Config(e) => miette::Report::new(lowcode_builder::Error::Config(e)),
        other => miette::miette!("{}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn config_errors_convert() {
        let err: CliError = ConfigError::MissingLibrary.into();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(
            err.to_string(),
            "library option is required when the umd format is requested"
        );
    }

    #[test]
    fn with_hint_appends_hint() {
        let result: std::result::Result<(), ConfigError> = Err(ConfigError::MissingLibrary);
        let msg = result.with_hint("Pass --library").unwrap_err().to_string();
        assert!(msg.ends_with("Hint: Pass --library"));
    }

    #[test]
    fn context_prefixes_message() {
        let result: std::result::Result<(), ConfigError> =
            Err(ConfigError::NotFound(PathBuf::from("x.json")));
        let msg = result.context("Failed to resolve options").unwrap_err().to_string();
        assert!(msg.starts_with("Failed to resolve options: config file not found"));
    }

    #[test]
    fn config_reports_carry_hint() {
        let report = cli_error_to_miette(CliError::Config(ConfigError::MissingLibrary));
        let help = report.help().map(|h| h.to_string());
        assert_eq!(
            help.as_deref(),
            Some("Pass --library <GlobalName> or set `library` in the config file")
        );
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("CONFIG_ERROR"));
    }
}
