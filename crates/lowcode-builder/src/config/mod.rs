//! Declarative bundle configuration.
//!
//! A [`BundleConfig`] describes one bundler run without tying it to rolldown.
//! Configs are layered with [`Merge`]: the assembler starts from a common base
//! and merges format-specific pieces over it.

mod assemble;

pub use assemble::{Command, ConfigAssembler};

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Module entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleInput {
    Entry(PathBuf),
    Files(Vec<PathBuf>),
    Named(IndexMap<String, PathBuf>),
}

/// External package pattern. Matches the name itself and anything that
/// starts with it, so `vue` also covers `vue/server-renderer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPattern(String);

impl ExternalPattern {
    pub fn prefix(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, specifier: &str) -> bool {
        specifier.starts_with(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Cjs,
    Esm,
    Umd,
    Iife,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcemapMode {
    File,
    Inline,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportsMode {
    Auto,
    Named,
    Default,
}

/// Bundler plugins, in the order they run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginSpec {
    /// Hoist `defineOptions()` out of `<script setup>`.
    DefineOptions,
    VueSfc { production: bool },
    VueJsx,
    NodeResolve { extensions: Vec<String> },
    CommonJs,
    Transpile {
        target: String,
        sourcemap: bool,
        /// File extension to loader, e.g. `.vue` -> `ts`.
        loaders: IndexMap<String, String>,
    },
    Babel {
        extensions: Vec<String>,
        bundled_helpers: bool,
    },
    /// Compile-time constant replacement. Values are JavaScript source text.
    Replace {
        values: IndexMap<String, String>,
        prevent_assignment: bool,
    },
    Minify,
    /// Serve the output directory during `start`.
    DevServer { dir: PathBuf },
    /// Wrap each output chunk in an IIFE.
    Iife { sourcemap: bool },
}

impl PluginSpec {
    pub fn name(&self) -> &'static str {
        match self {
            PluginSpec::DefineOptions => "define-options",
            PluginSpec::VueSfc { .. } => "vue",
            PluginSpec::VueJsx => "vue-jsx",
            PluginSpec::NodeResolve { .. } => "node-resolve",
            PluginSpec::CommonJs => "commonjs",
            PluginSpec::Transpile { .. } => "transpile",
            PluginSpec::Babel { .. } => "babel",
            PluginSpec::Replace { .. } => "replace",
            PluginSpec::Minify => "minify",
            PluginSpec::DevServer { .. } => "dev-server",
            PluginSpec::Iife { .. } => "iife",
        }
    }
}

/// Where and how one bundle is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub format: Option<ModuleFormat>,
    /// Global name for umd/iife bundles.
    pub name: Option<String>,
    pub globals: IndexMap<String, String>,
    pub exports: Option<ExportsMode>,
    pub entry_file_names: Option<String>,
    pub preserve_modules: Option<bool>,
    pub preserve_modules_root: Option<PathBuf>,
    pub sourcemap: Option<SourcemapMode>,
}

impl OutputTarget {
    pub fn dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Default::default()
        }
    }

    pub fn file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: ModuleFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn globals(mut self, globals: IndexMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    pub fn exports(mut self, exports: ExportsMode) -> Self {
        self.exports = Some(exports);
        self
    }

    pub fn entry_file_names(mut self, pattern: impl Into<String>) -> Self {
        self.entry_file_names = Some(pattern.into());
        self
    }

    pub fn preserve_modules(mut self, root: impl Into<PathBuf>) -> Self {
        self.preserve_modules = Some(true);
        self.preserve_modules_root = Some(root.into());
        self
    }

    pub fn sourcemap(mut self, mode: SourcemapMode) -> Self {
        self.sourcemap = Some(mode);
        self
    }

    /// Directory the output lands in: `dir`, or the parent of `file`.
    pub fn out_dir(&self) -> Option<&Path> {
        self.dir
            .as_deref()
            .or_else(|| self.file.as_deref().and_then(Path::parent))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTargets {
    Single(OutputTarget),
    List(Vec<OutputTarget>),
}

impl OutputTargets {
    pub fn iter(&self) -> impl Iterator<Item = &OutputTarget> {
        let slice = match self {
            OutputTargets::Single(target) => std::slice::from_ref(target),
            OutputTargets::List(targets) => targets.as_slice(),
        };
        slice.iter()
    }
}

/// One bundler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleConfig {
    pub cwd: PathBuf,
    pub input: Option<BundleInput>,
    pub plugins: Vec<PluginSpec>,
    pub external: Vec<ExternalPattern>,
    pub treeshake: Option<bool>,
    pub output: Option<OutputTargets>,
}

impl BundleConfig {
    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|plugin| plugin.name() == name)
    }

    /// Output targets, in declaration order.
    pub fn targets(&self) -> Vec<&OutputTarget> {
        self.output
            .as_ref()
            .map(|output| output.iter().collect())
            .unwrap_or_default()
    }
}

/// A labelled config, as executed by the build driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTask {
    pub label: String,
    pub config: BundleConfig,
}

impl BundleTask {
    pub fn new(label: impl Into<String>, config: BundleConfig) -> Self {
        Self {
            label: label.into(),
            config,
        }
    }
}

/// Layering of configuration pieces. `self` is the base, `other` wins.
pub trait Merge {
    fn merge(self, other: Self) -> Self;
}

impl<T: Merge> Merge for Option<T> {
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Some(base), Some(other)) => Some(base.merge(other)),
            (base, None) => base,
            (None, other) => other,
        }
    }
}

impl Merge for OutputTarget {
    fn merge(self, other: Self) -> Self {
        let mut globals = self.globals;
        globals.extend(other.globals);

        Self {
            dir: other.dir.or(self.dir),
            file: other.file.or(self.file),
            format: other.format.or(self.format),
            name: other.name.or(self.name),
            globals,
            exports: other.exports.or(self.exports),
            entry_file_names: other.entry_file_names.or(self.entry_file_names),
            preserve_modules: other.preserve_modules.or(self.preserve_modules),
            preserve_modules_root: other.preserve_modules_root.or(self.preserve_modules_root),
            sourcemap: other.sourcemap.or(self.sourcemap),
        }
    }
}

impl Merge for OutputTargets {
    /// Two single targets merge field by field. A list on either side
    /// replaces whatever was there.
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (OutputTargets::Single(base), OutputTargets::Single(other)) => {
                OutputTargets::Single(base.merge(other))
            }
            (_, other) => other,
        }
    }
}

impl Merge for BundleConfig {
    fn merge(self, other: Self) -> Self {
        let mut plugins = self.plugins;
        plugins.extend(other.plugins);
        let mut external = self.external;
        external.extend(other.external);

        Self {
            cwd: if other.cwd.as_os_str().is_empty() {
                self.cwd
            } else {
                other.cwd
            },
            input: other.input.or(self.input),
            plugins,
            external,
            treeshake: other.treeshake.or(self.treeshake),
            output: self.output.merge(other.output),
        }
    }
}

/// Merge `layers` over `base`, in order.
pub fn merge_all(base: BundleConfig, layers: impl IntoIterator<Item = BundleConfig>) -> BundleConfig {
    layers.into_iter().fold(base, BundleConfig::merge)
}
