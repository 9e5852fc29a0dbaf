//! The project's `package.json`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: IndexMap<String, String>,
}

impl PackageManifest {
    /// Read `<context>/package.json`. A missing file is an error.
    pub fn load(context: &Path) -> Result<Self> {
        Self::find(context)?.ok_or_else(|| ConfigError::MissingManifest(context.join("package.json")))
    }

    /// Read `<context>/package.json` if it exists.
    pub fn find(context: &Path) -> Result<Option<Self>> {
        let path = context.join("package.json");
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::InvalidManifest {
                path,
                message: e.to_string(),
            })
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    /// Runtime and peer dependency names, in declaration order.
    pub fn external_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .keys()
            .chain(self.peer_dependencies.keys())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_requires_manifest() {
        let dir = TempDir::new().unwrap();
        let err = PackageManifest::load(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("package.json not found at"));
    }

    #[test]
    fn external_names_lists_deps_then_peers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{
  "name": "@acme/ui",
  "version": "1.0.0",
  "dependencies": { "lodash-es": "^4.17.21", "dayjs": "^1.11.0" },
  "peerDependencies": { "vue": "^3.3.0" }
}"#,
        )
        .unwrap();

        let manifest = PackageManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.name(), "@acme/ui");
        assert_eq!(
            manifest.external_names().collect::<Vec<_>>(),
            vec!["lodash-es", "dayjs", "vue"]
        );
    }
}
