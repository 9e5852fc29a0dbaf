//! Option resolution for lowcode-builder.
//!
//! Options come from three layers, lowest precedence first: built-in
//! defaults, a project config file (plus `LOWCODE_*` environment variables),
//! and CLI-style overrides. Each layer is normalized through the rule table in
//! [`rules`] before the cross-field checks run.

pub mod discovery;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod options;
pub mod resolve;
pub mod rules;

pub use discovery::{CONFIG_FILE_NAMES, ConfigDiscovery, ConfigSource};
pub use error::{ConfigError, Result};
pub use manifest::PackageManifest;
pub use merge::merge_values;
pub use options::{BaseUrl, BuiltinAssets, LowcodeOptions, ResolvedOptions, TargetFormat};
pub use resolve::{context_dir, resolve, resolve_from};
pub use rules::{FieldRule, field_rules};
