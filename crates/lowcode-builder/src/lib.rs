//! # lowcode-builder
//!
//! Builds a Vue component-library package into CommonJS, ES module and UMD
//! artifacts, plus a low-code metadata bundle that a visual page builder can
//! load at runtime.
//!
//! The pipeline is:
//!
//! ```text
//! ResolvedOptions -> checker (oxc, tsc) -> ConfigAssembler -> Bundler (rolldown) -> dist/, lib/, es/
//!                                            |
//!                                   entry synthesizer (view-entry.js, meta-entry.js)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use lowcode_builder::{Builder, RolldownBundler};
//! use lowcode_config::{ResolvedOptions, resolve};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = resolve(".", ResolvedOptions::default(), json!({ "library": "AcmeUI" }))?;
//! let report = Builder::new(options, RolldownBundler).build().await?;
//! for file in &report.written {
//!     println!("{}", file.display());
//! }
//! # Ok(()) }
//! ```

pub mod assets;
pub mod builder;
pub mod bundler;
pub mod checker;
pub mod config;
pub mod discover;
pub mod entry;
pub mod sfc;
pub mod typecheck;

pub use assets::AssetsManifest;
pub use builder::{BuildReport, Builder, DevBuild};
pub use bundler::{Bundler, EmittedFile, RolldownBundler};
pub use checker::{CheckDiagnostic, CheckError, CheckedProject, check};
pub use config::{
    BundleConfig, BundleInput, BundleTask, Command, ConfigAssembler, ExportsMode,
    ExternalPattern, Merge, ModuleFormat, OutputTarget, OutputTargets, PluginSpec, SourcemapMode,
};
pub use discover::discover_meta_files;
pub use entry::{generate_meta_entry, generate_view_entry};

pub use lowcode_config::{ConfigError, ResolvedOptions};

/// Error types for lowcode-builder operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The source tree failed the syntax check. Nothing was bundled.
    #[error(transparent)]
    Check(#[from] CheckError),

    /// The bundler rejected a configuration. The message is rolldown's own.
    #[error("{0}")]
    Bundle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An emitted file would land outside its output directory.
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// A spawned build or check task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias for lowcode-builder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Collapse a batch of rolldown diagnostics into one error.
    pub fn from_rolldown_batch(error: &impl std::fmt::Debug) -> Self {
        Error::Bundle(format!("{error:?}"))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Check(_) => "CHECK_FAILED",
            Error::Bundle(_) => "BUNDLER_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::Task(_) => "TASK_FAILED",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Config(err) => err.hint().map(|h| Box::new(h) as Box<dyn std::fmt::Display>),
            Error::Check(err) => Some(Box::new(format!(
                "{} problem(s) found. Fix them and run the build again.",
                err.diagnostics.len()
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{path}' escapes its output directory."
            ))),
            _ => None,
        }
    }

    fn related(&self) -> Option<Box<dyn Iterator<Item = &dyn miette::Diagnostic> + '_>> {
        match self {
            Error::Check(err) => Some(Box::new(
                err.diagnostics.iter().map(|d| d as &dyn miette::Diagnostic),
            )),
            _ => None,
        }
    }
}
