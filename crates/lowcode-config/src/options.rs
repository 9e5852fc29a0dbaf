//! Resolved option types and built-in defaults.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, Result};

/// Output formats the builder knows how to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Cjs,
    Esm,
    Umd,
}

impl TargetFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Cjs => "cjs",
            TargetFormat::Esm => "esm",
            TargetFormat::Umd => "umd",
        }
    }
}

/// Fully merged and normalized options for one command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    /// Absolute project root.
    pub context: PathBuf,
    /// Global variable name of the UMD bundle.
    pub library: String,
    /// Requested format tokens. Unknown tokens are kept as given.
    pub format: Vec<String>,
    pub out_dir: PathBuf,
    /// Package name (or prefix) to browser global.
    pub externals: IndexMap<String, String>,
    pub lowcode: LowcodeOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowcodeOptions {
    pub meta_dir: PathBuf,
    pub base_url: BaseUrl,
    pub groups: Vec<String>,
    pub categories: Vec<String>,
    pub npm_info: Map<String, Value>,
    pub builtin_assets: BuiltinAssets,
}

/// Where published assets are served from, either one template or one per mode.
///
/// Templates may contain `{name}` and `{version}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseUrl {
    Template(String),
    ByMode(IndexMap<String, String>),
}

impl BaseUrl {
    /// Pick the template for `mode` and substitute the package placeholders.
    pub fn render(&self, mode: &str, name: &str, version: &str) -> Result<String> {
        let template = match self {
            BaseUrl::Template(template) => template,
            BaseUrl::ByMode(modes) => modes
                .get(mode)
                .ok_or_else(|| ConfigError::MissingBaseUrl(mode.to_string()))?,
        };
        Ok(template
            .replace("{name}", name)
            .replace("{version}", version)
            .trim_end_matches('/')
            .to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuiltinAssets {
    #[serde(default)]
    pub packages: Vec<Value>,
    #[serde(default)]
    pub components: Vec<Value>,
}

impl Default for ResolvedOptions {
    /// Built-in defaults. Paths are relative and get rebased onto the context
    /// during resolution.
    fn default() -> Self {
        Self {
            context: PathBuf::new(),
            library: String::new(),
            format: vec!["cjs".into(), "esm".into(), "umd".into()],
            out_dir: PathBuf::new(),
            externals: IndexMap::from([("vue".to_string(), "Vue".to_string())]),
            lowcode: LowcodeOptions::default(),
        }
    }
}

impl Default for LowcodeOptions {
    fn default() -> Self {
        let mut npm_info = Map::new();
        npm_info.insert("destructuring".into(), Value::Bool(true));

        Self {
            meta_dir: PathBuf::from("lowcode"),
            base_url: BaseUrl::Template("https://unpkg.com/{name}@{version}".into()),
            groups: vec!["精选组件".into(), "院子组件".into()],
            categories: [
                "基础元素",
                "布局容器类",
                "表格类",
                "表单详情类",
                "帮助类",
                "对话框类",
                "业务类",
                "通用",
                "引导",
                "信息输入",
                "信息展示",
                "信息反馈",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            npm_info,
            builtin_assets: BuiltinAssets::default(),
        }
    }
}

impl ResolvedOptions {
    pub fn wants(&self, format: TargetFormat) -> bool {
        self.format.iter().any(|token| token == format.as_str())
    }

    /// Resolve `path` against the project context.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve_against(&self.context, path.as_ref())
    }

    /// Rebase relative default paths onto `context`.
    pub(crate) fn rebase(mut self, context: &Path) -> Self {
        self.context = context.to_path_buf();
        self.out_dir = resolve_against(context, &self.out_dir);
        self.lowcode.meta_dir = resolve_against(context, &self.lowcode.meta_dir);
        self
    }

    pub(crate) fn ensure_library(&self) -> Result<()> {
        if self.wants(TargetFormat::Umd) && self.library.trim().is_empty() {
            return Err(ConfigError::MissingLibrary);
        }
        Ok(())
    }

    /// Directory holding the sources that get checked and compiled.
    pub fn src_dir(&self) -> PathBuf {
        self.context.join("src")
    }

    /// Scratch directory for synthesized entry files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.context.join("node_modules").join(".lowcode-builder")
    }

    /// Output directory of the watch/serve session.
    pub fn dev_dir(&self) -> PathBuf {
        self.context.join("node_modules").join(".lowcode-builder-dev")
    }

    /// Global name the metadata bundle registers under.
    pub fn meta_library(&self) -> String {
        format!("{}Meta", self.library)
    }
}

pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        base.join(path).clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_resolves_default_paths() {
        let options = ResolvedOptions::default().rebase(Path::new("/project"));
        assert_eq!(options.out_dir, PathBuf::from("/project"));
        assert_eq!(options.lowcode.meta_dir, PathBuf::from("/project/lowcode"));
    }

    #[test]
    fn wants_matches_exact_tokens() {
        let mut options = ResolvedOptions::default();
        options.format = vec!["cjs".into(), "iife".into()];
        assert!(options.wants(TargetFormat::Cjs));
        assert!(!options.wants(TargetFormat::Umd));
    }

    #[test]
    fn base_url_renders_placeholders() {
        let url = BaseUrl::Template("https://unpkg.com/{name}@{version}/".into());
        assert_eq!(
            url.render("production", "@acme/ui", "1.2.0").unwrap(),
            "https://unpkg.com/@acme/ui@1.2.0"
        );
    }

    #[test]
    fn base_url_by_mode_requires_mode() {
        let url = BaseUrl::ByMode(IndexMap::from([(
            "production".to_string(),
            "https://cdn.example.com/{name}".to_string(),
        )]));
        assert_eq!(
            url.render("production", "ui", "1.0.0").unwrap(),
            "https://cdn.example.com/ui"
        );
        assert!(matches!(
            url.render("development", "ui", "1.0.0"),
            Err(ConfigError::MissingBaseUrl(mode)) if mode == "development"
        ));
    }

    #[test]
    fn missing_library_only_matters_for_umd() {
        let mut options = ResolvedOptions::default();
        assert!(matches!(options.ensure_library(), Err(ConfigError::MissingLibrary)));

        options.format = vec!["cjs".into(), "esm".into()];
        assert!(options.ensure_library().is_ok());
    }
}
