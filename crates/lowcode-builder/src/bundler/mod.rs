//! Rolldown adapter.
//!
//! [`Bundler`] is the seam between the build driver and the bundler engine.
//! [`RolldownBundler`] lowers one [`BundleConfig`] and one of its
//! [`OutputTarget`]s into rolldown options and runs a bundler per target.

pub mod plugins;

use std::hash::BuildHasherDefault;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use path_clean::PathClean;
use rolldown::{
    BundlerBuilder, BundlerOptions, GlobalsOutputOption, InputItem, OutputFormat, Platform,
    RawMinifyOptions, ResolveOptions, SourceMapType, TreeshakeOptions,
};
use rolldown_common::{BundlerTransformOptions, Either, JsxOptions, ModuleType, OutputExports};
use rolldown_plugin::__inner::SharedPluginable;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::debug;

use crate::config::{
    BundleConfig, BundleInput, ExportsMode, ModuleFormat, OutputTarget, PluginSpec, SourcemapMode,
};
use crate::{Error, Result};
use plugins::{ExternalPlugin, VuePlugin};

/// Lowest syntax target rolldown's transformer accepts.
const BABEL_TARGET: &str = "es2015";

/// One file produced by a bundler run, relative to the target's output
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Runs one bundle configuration for one output target.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundle in memory.
    async fn generate(&self, config: &BundleConfig, target: &OutputTarget)
    -> Result<Vec<EmittedFile>>;

    /// Bundle and write the result under the target's output directory.
    async fn write(&self, config: &BundleConfig, target: &OutputTarget) -> Result<Vec<PathBuf>> {
        let out_dir = target.out_dir().ok_or_else(|| {
            Error::InvalidOutputPath("output target has neither dir nor file".to_string())
        })?;
        let files = self.generate(config, target).await?;
        write_emitted(out_dir, &files).await
    }
}

/// The production [`Bundler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RolldownBundler;

#[async_trait]
impl Bundler for RolldownBundler {
    async fn generate(
        &self,
        config: &BundleConfig,
        target: &OutputTarget,
    ) -> Result<Vec<EmittedFile>> {
        let options = lower(config, target)?;
        let plugins = plugins_for(config);
        debug!(
            cwd = %config.cwd.display(),
            format = ?target.format,
            plugins = plugins.len(),
            "running rolldown"
        );

        let mut bundler = BundlerBuilder::default()
            .with_options(options)
            .with_plugins(plugins)
            .build()
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        let output = bundler
            .generate()
            .await
            .map_err(|e| Error::from_rolldown_batch(&e))?;

        Ok(output
            .assets
            .iter()
            .map(|asset| EmittedFile {
                file_name: asset.filename().to_string(),
                content: asset.content_as_bytes().to_vec(),
            })
            .collect())
    }
}

/// Write `files` under `out_dir`. Every path is checked to stay inside it.
pub async fn write_emitted(out_dir: &Path, files: &[EmittedFile]) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.to_path_buf().clean();

    let mut targets = Vec::with_capacity(files.len());
    for file in files {
        targets.push(validate_output_path(&out_dir, &file.file_name)?);
    }

    tokio::fs::create_dir_all(&out_dir).await?;
    for (target, file) in targets.iter().zip(files) {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, &file.content).await?;
    }

    debug!(count = targets.len(), out_dir = %out_dir.display(), "bundle written");
    Ok(targets)
}

fn validate_output_path(base_dir: &Path, file_name: &str) -> Result<PathBuf> {
    if file_name.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let full_path = base_dir.join(Path::new(file_name).clean()).clean();
    if !full_path.starts_with(base_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}'",
            file_name,
            base_dir.display()
        )));
    }
    Ok(full_path)
}

fn plugins_for(config: &BundleConfig) -> Vec<SharedPluginable> {
    let mut plugins: Vec<SharedPluginable> = Vec::new();

    if !config.external.is_empty() {
        plugins.push(Arc::new(ExternalPlugin::new(config.external.clone())));
    }

    if config.has_plugin("vue") {
        let default_lang = config
            .plugins
            .iter()
            .find_map(|plugin| match plugin {
                PluginSpec::Transpile { loaders, .. } => loaders.get(".vue").cloned(),
                _ => None,
            })
            .unwrap_or_else(|| "js".to_string());
        plugins.push(Arc::new(VuePlugin::new(
            &default_lang,
            config.has_plugin("define-options"),
        )));
    }

    plugins
}

/// Translate a config and one of its targets into rolldown options.
pub fn lower(config: &BundleConfig, target: &OutputTarget) -> Result<BundlerOptions> {
    let mut options = BundlerOptions {
        cwd: Some(config.cwd.clone()),
        input: Some(lower_input(config.input.as_ref())),
        format: Some(lower_format(config, target)),
        platform: Some(Platform::Browser),
        treeshake: TreeshakeOptions::Boolean(config.treeshake.unwrap_or(true)),
        resolve: Some(configure_resolution(config)),
        name: target.name.clone(),
        ..Default::default()
    };

    match (&target.dir, &target.file) {
        (Some(dir), _) => {
            options.dir = Some(dir.to_string_lossy().into_owned());
            if let Some(pattern) = &target.entry_file_names {
                options.entry_filenames = Some(pattern.clone().into());
            }
        }
        (None, Some(file)) => {
            let dir = file.parent().unwrap_or(Path::new("."));
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidOutputPath(file.display().to_string()))?;
            options.dir = Some(dir.to_string_lossy().into_owned());
            options.entry_filenames = Some(name.into());
        }
        (None, None) => {
            return Err(Error::InvalidOutputPath(
                "output target has neither dir nor file".to_string(),
            ));
        }
    }

    if !target.globals.is_empty() {
        let globals: FxHashMap<String, String> = target
            .globals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        options.globals = Some(GlobalsOutputOption::from(globals));
    }

    options.exports = target.exports.map(|mode| match mode {
        ExportsMode::Auto => OutputExports::Auto,
        ExportsMode::Named => OutputExports::Named,
        ExportsMode::Default => OutputExports::Default,
    });

    options.sourcemap = target.sourcemap.map(|mode| match mode {
        SourcemapMode::File => SourceMapType::File,
        SourcemapMode::Inline => SourceMapType::Inline,
        SourcemapMode::Hidden => SourceMapType::Hidden,
    });

    if config.has_plugin("minify") {
        options.minify = Some(RawMinifyOptions::Bool(true));
    }

    if target.preserve_modules.unwrap_or(false) {
        options.preserve_modules = Some(true);
        options.preserve_modules_root = target
            .preserve_modules_root
            .as_ref()
            .map(|root| root.to_string_lossy().into_owned());
        // Preserved modules that are not inputs are written as chunks.
        options.chunk_filenames = target
            .entry_file_names
            .as_ref()
            .map(|pattern| pattern.clone().into());
    }

    let define: IndexMap<String, String, BuildHasherDefault<FxHasher>> = config
        .plugins
        .iter()
        .filter_map(|plugin| match plugin {
            PluginSpec::Replace { values, .. } => Some(values),
            _ => None,
        })
        .flat_map(|values| values.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect();
    if !define.is_empty() {
        options.define = Some(define);
    }

    options.transform = lower_transform(config);

    let module_types = lower_module_types(config);
    if !module_types.is_empty() {
        options.module_types = Some(module_types);
    }

    Ok(options)
}

fn lower_format(config: &BundleConfig, target: &OutputTarget) -> OutputFormat {
    if config.has_plugin("iife") {
        return OutputFormat::Iife;
    }
    match target.format.unwrap_or(ModuleFormat::Esm) {
        ModuleFormat::Cjs => OutputFormat::Cjs,
        ModuleFormat::Esm => OutputFormat::Esm,
        ModuleFormat::Umd => OutputFormat::Umd,
        ModuleFormat::Iife => OutputFormat::Iife,
    }
}

fn lower_input(input: Option<&BundleInput>) -> Vec<InputItem> {
    let import = |path: &Path| path.to_string_lossy().into_owned();

    match input {
        None => Vec::new(),
        Some(BundleInput::Entry(path)) => vec![InputItem {
            name: None,
            import: import(path),
        }],
        Some(BundleInput::Named(entries)) => entries
            .iter()
            .map(|(name, path)| InputItem {
                name: Some(name.clone()),
                import: import(path),
            })
            .collect(),
        // In preserve-modules builds rolldown names each file after its path
        // under the preserve root, keeping non-script extensions such as
        // `.vue`, so `src/button/Button.vue` is emitted as `button/Button.vue.js`.
        Some(BundleInput::Files(files)) => files
            .iter()
            .map(|path| InputItem {
                name: None,
                import: import(path),
            })
            .collect(),
    }
}

/// Syntax lowering from the transpile, jsx and babel plugins.
///
/// CommonJS interop and node resolution are native to rolldown and need no
/// transform options.
fn lower_transform(config: &BundleConfig) -> Option<BundlerTransformOptions> {
    let mut transform = BundlerTransformOptions::default();
    let mut production = false;
    let mut babel = false;

    for plugin in &config.plugins {
        match plugin {
            PluginSpec::Transpile { target, .. } => {
                transform.target = Some(Either::Left(target.clone()));
            }
            PluginSpec::VueSfc { production: prod } => production = *prod,
            PluginSpec::Babel { .. } => babel = true,
            _ => {}
        }
    }

    if babel && transform.target.is_none() {
        transform.target = Some(Either::Left(BABEL_TARGET.to_string()));
    }

    if config.has_plugin("vue-jsx") {
        transform.jsx = Some(Either::Right(JsxOptions {
            runtime: Some("automatic".to_string()),
            import_source: Some("vue".to_string()),
            development: Some(!production),
            ..Default::default()
        }));
    }

    (transform.target.is_some() || transform.jsx.is_some()).then_some(transform)
}

/// Module types of the transpile loaders. `.vue` is typed by the component
/// plugin's load hook.
fn lower_module_types(config: &BundleConfig) -> FxHashMap<String, ModuleType> {
    config
        .plugins
        .iter()
        .filter_map(|plugin| match plugin {
            PluginSpec::Transpile { loaders, .. } => Some(loaders),
            _ => None,
        })
        .flat_map(|loaders| loaders.iter())
        .filter(|(ext, _)| ext.as_str() != ".vue")
        .filter_map(|(ext, loader)| {
            let module_type = ModuleType::from_known_str(loader).ok()?;
            Some((ext.clone(), module_type))
        })
        .collect()
}

/// Node-style resolution: `node_modules` of the cwd and every ancestor.
fn configure_resolution(config: &BundleConfig) -> ResolveOptions {
    let mut modules = Vec::new();
    let mut current = Some(config.cwd.as_path());
    while let Some(dir) = current {
        modules.push(dir.join("node_modules").to_string_lossy().into_owned());
        current = dir.parent();
    }
    modules.push("node_modules".to_string());

    let mut extensions: Vec<String> = config
        .plugins
        .iter()
        .find_map(|plugin| match plugin {
            PluginSpec::NodeResolve { extensions } => Some(extensions.clone()),
            _ => None,
        })
        .unwrap_or_default();
    for extra in [".tsx", ".jsx", ".vue"] {
        if !extensions.iter().any(|e| e == extra) {
            extensions.push(extra.to_string());
        }
    }

    ResolveOptions {
        main_fields: Some(vec![
            "browser".to_string(),
            "module".to_string(),
            "main".to_string(),
        ]),
        condition_names: Some(vec![
            "browser".to_string(),
            "import".to_string(),
            "module".to_string(),
            "default".to_string(),
        ]),
        extensions: Some(extensions),
        modules: Some(modules),
        symlinks: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolldown_common::ChunkFilenamesOutputOption;
    use tempfile::TempDir;

    fn config(plugins: Vec<PluginSpec>) -> BundleConfig {
        BundleConfig {
            cwd: PathBuf::from("/p/pkg"),
            input: Some(BundleInput::Entry(PathBuf::from("/p/pkg/src/index.ts"))),
            plugins,
            ..Default::default()
        }
    }

    #[test]
    fn preserved_modules_use_native_naming() {
        let mut config = config(Vec::new());
        config.input = Some(BundleInput::Files(vec![
            PathBuf::from("/p/pkg/src/index.ts"),
            PathBuf::from("/p/pkg/src/button/Button.vue"),
        ]));
        let target = OutputTarget::dir("/p/pkg/lib")
            .format(ModuleFormat::Cjs)
            .entry_file_names("[name].js")
            .preserve_modules("/p/pkg/src");
        let options = lower(&config, &target).unwrap();

        let input = options.input.unwrap();
        assert_eq!(input.len(), 2);
        assert!(input.iter().all(|item| item.name.is_none()));
        assert_eq!(input[1].import, "/p/pkg/src/button/Button.vue");
        assert_eq!(options.preserve_modules, Some(true));
        assert_eq!(options.preserve_modules_root.as_deref(), Some("/p/pkg/src"));
        assert!(matches!(
            options.chunk_filenames,
            Some(ChunkFilenamesOutputOption::String(ref pattern)) if pattern == "[name].js"
        ));
    }

    #[test]
    fn bundles_without_preserve_modules_keep_default_chunks() {
        let target = OutputTarget::dir("/p/pkg/dist").entry_file_names("[name].js");
        let options = lower(&config(Vec::new()), &target).unwrap();
        assert_eq!(options.preserve_modules, None);
        assert!(options.chunk_filenames.is_none());
    }

    #[test]
    fn transpile_and_jsx_plugins_become_transform_options() {
        let plugins = vec![
            PluginSpec::VueSfc { production: true },
            PluginSpec::VueJsx,
            PluginSpec::CommonJs,
            PluginSpec::Transpile {
                target: "es2018".to_string(),
                sourcemap: true,
                loaders: IndexMap::from([
                    (".vue".to_string(), "ts".to_string()),
                    (".mts".to_string(), "ts".to_string()),
                ]),
            },
            PluginSpec::Babel {
                extensions: vec![".js".to_string(), ".vue".to_string()],
                bundled_helpers: true,
            },
        ];
        let options = lower(&config(plugins), &OutputTarget::dir("/p/pkg/lib")).unwrap();
        let transform = options.transform.unwrap();

        assert!(matches!(transform.target, Some(Either::Left(ref t)) if t == "es2018"));
        let Some(Either::Right(jsx)) = transform.jsx else {
            panic!("expected jsx options, got {:?}", transform.jsx);
        };
        assert_eq!(jsx.runtime.as_deref(), Some("automatic"));
        assert_eq!(jsx.import_source.as_deref(), Some("vue"));
        assert_eq!(jsx.development, Some(false));

        let module_types = options.module_types.unwrap();
        assert_eq!(module_types.get(".mts"), Some(&ModuleType::Ts));
        assert!(!module_types.contains_key(".vue"));
    }

    #[test]
    fn babel_alone_lowers_to_its_minimum_target() {
        let plugins = vec![
            PluginSpec::VueSfc { production: false },
            PluginSpec::Babel {
                extensions: vec![".js".to_string()],
                bundled_helpers: true,
            },
        ];
        let options = lower(&config(plugins), &OutputTarget::dir("/p/pkg/lib")).unwrap();
        let transform = options.transform.unwrap();
        assert!(matches!(transform.target, Some(Either::Left(ref t)) if t == "es2015"));
        assert!(transform.jsx.is_none());
    }

    #[test]
    fn no_syntax_plugins_means_no_transform() {
        let options = lower(&config(vec![PluginSpec::Minify]), &OutputTarget::dir("/p/pkg/lib"))
            .unwrap();
        assert!(options.transform.is_none());
        assert!(options.module_types.is_none());
    }

    #[test]
    fn file_target_lowers_to_dir_and_entry_name() {
        let target = OutputTarget::file("/p/pkg/dist/index.prod.js").format(ModuleFormat::Umd);
        let options = lower(&config(vec![PluginSpec::Minify]), &target).unwrap();

        assert_eq!(options.dir.as_deref(), Some("/p/pkg/dist"));
        assert!(matches!(options.format, Some(OutputFormat::Umd)));
        assert!(matches!(options.minify, Some(RawMinifyOptions::Bool(true))));
    }

    #[test]
    fn iife_plugin_forces_iife_format() {
        let target = OutputTarget::dir("/p/pkg/.dev").format(ModuleFormat::Esm);
        let options = lower(&config(vec![PluginSpec::Iife { sourcemap: true }]), &target).unwrap();
        assert!(matches!(options.format, Some(OutputFormat::Iife)));
    }

    #[test]
    fn replace_values_become_defines() {
        let plugins = vec![PluginSpec::Replace {
            values: IndexMap::from([(
                "process.env.NODE_ENV".to_string(),
                "\"production\"".to_string(),
            )]),
            prevent_assignment: true,
        }];
        let options = lower(&config(plugins), &OutputTarget::dir("/p/pkg/lib")).unwrap();
        let define = options.define.unwrap();
        assert_eq!(define.len(), 1);
        assert_eq!(
            define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"production\"")
        );
    }

    #[test]
    fn target_without_location_is_rejected() {
        let err = lower(&config(Vec::new()), &OutputTarget::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidOutputPath(_)));
    }

    #[test]
    fn resolution_walks_up_node_modules() {
        let resolve = configure_resolution(&config(vec![PluginSpec::NodeResolve {
            extensions: vec![".js".to_string(), ".ts".to_string()],
        }]));
        let modules = resolve.modules.unwrap();
        assert_eq!(modules.first().map(String::as_str), Some("/p/pkg/node_modules"));
        assert!(modules.contains(&"/p/node_modules".to_string()));
        assert_eq!(modules.last().map(String::as_str), Some("node_modules"));

        let extensions = resolve.extensions.unwrap();
        assert_eq!(&extensions[..2], &[".js".to_string(), ".ts".to_string()]);
        assert!(extensions.contains(&".vue".to_string()));
    }

    #[tokio::test]
    async fn escaping_file_names_are_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            EmittedFile {
                file_name: "index.js".to_string(),
                content: b"ok".to_vec(),
            },
            EmittedFile {
                file_name: "../escape.js".to_string(),
                content: b"no".to_vec(),
            },
        ];

        let err = write_emitted(dir.path(), &files).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOutputPath(_)));
        assert!(!dir.path().join("index.js").exists());
    }

    #[tokio::test]
    async fn nested_files_are_written() {
        let dir = TempDir::new().unwrap();
        let files = vec![EmittedFile {
            file_name: "button/Button.vue.js".to_string(),
            content: b"export {}".to_vec(),
        }];

        let written = write_emitted(dir.path(), &files).await.unwrap();
        assert_eq!(written, vec![dir.path().join("button/Button.vue.js")]);
        assert_eq!(
            std::fs::read_to_string(&written[0]).unwrap(),
            "export {}"
        );
    }
}
