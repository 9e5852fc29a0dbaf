//! Option resolution: defaults, then config file, then CLI overrides.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::discovery::ConfigDiscovery;
use crate::error::{ConfigError, Result};
use crate::manifest::PackageManifest;
use crate::merge::kind_of;
use crate::options::{ResolvedOptions, resolve_against};
use crate::rules::field_rules;

/// Resolve options for a project, relative to the current directory.
///
/// `overrides` is the CLI-style override object. Its `config` key, if any,
/// names the config file explicitly.
///
/// # Example
///
/// ```no_run
/// use lowcode_config::{ResolvedOptions, resolve};
/// use serde_json::json;
///
/// let options = resolve(".", ResolvedOptions::default(), json!({ "library": "AcmeUI" })).unwrap();
/// assert_eq!(options.library, "AcmeUI");
/// ```
pub fn resolve(
    context_arg: impl AsRef<Path>,
    defaults: ResolvedOptions,
    overrides: Value,
) -> Result<ResolvedOptions> {
    let cwd = std::env::current_dir()?;
    resolve_from(&cwd, context_arg, defaults, overrides)
}

/// [`resolve`] with an explicit invocation directory.
pub fn resolve_from(
    cwd: &Path,
    context_arg: impl AsRef<Path>,
    defaults: ResolvedOptions,
    overrides: Value,
) -> Result<ResolvedOptions> {
    let context = resolve_against(cwd, context_arg.as_ref());
    let mut overrides = into_object("overrides", overrides)?;

    let explicit = match overrides.remove("config") {
        None | Some(Value::Null) => None,
        Some(Value::String(path)) => Some(path),
        Some(other) => {
            return Err(ConfigError::Type {
                field: "config".into(),
                expected: "string",
                actual: kind_of(&other),
            });
        }
    };

    let discovery = ConfigDiscovery::new(&context);
    let file_layer = match discovery.locate(explicit.as_deref())? {
        Some(source) => {
            info!(path = %source.path().display(), "using config file");
            discovery.load(&source)?
        }
        None => {
            debug!(context = %context.display(), "no config file found");
            discovery.load_env()?
        }
    };
    let file_layer = into_object("config", file_layer)?;

    let mut options = defaults.rebase(&context);
    for layer in [&file_layer, &overrides] {
        for rule in field_rules() {
            rule.apply(layer, &mut options)?;
        }
    }

    options.ensure_library()?;
    inject_package_info(&mut options)?;

    debug!(
        formats = ?options.format,
        out_dir = %options.out_dir.display(),
        "options resolved"
    );
    Ok(options)
}

/// Stamp the project's own name and version into `lowcode.npmInfo`.
fn inject_package_info(options: &mut ResolvedOptions) -> Result<()> {
    let Some(manifest) = PackageManifest::find(&options.context)? else {
        return Ok(());
    };

    let npm_info = &mut options.lowcode.npm_info;
    if let Some(name) = manifest.name {
        npm_info.insert("package".into(), Value::String(name));
    }
    if let Some(version) = manifest.version {
        npm_info.insert("version".into(), Value::String(version));
    }
    Ok(())
}

fn into_object(field: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ConfigError::Type {
            field: field.into(),
            expected: "object",
            actual: kind_of(&other),
        }),
    }
}

/// Directory to treat as the project context for `context_arg`.
pub fn context_dir(context_arg: impl AsRef<Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_against(&cwd, context_arg.as_ref()))
}
