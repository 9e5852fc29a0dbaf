//! Low-code assets manifest (`assets.json`).
//!
//! Tells the page builder where the component package and its metadata bundle
//! are served from.

use std::path::{Path, PathBuf};

use lowcode_config::{PackageManifest, ResolvedOptions};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::Result;

pub const ASSETS_FILE: &str = "assets.json";

/// Where the view and meta bundles are served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUrls {
    pub view: String,
    pub meta: String,
}

impl AssetUrls {
    /// Published locations under the configured base url for `mode`.
    pub fn published(
        options: &ResolvedOptions,
        manifest: &PackageManifest,
        mode: &str,
    ) -> Result<Self> {
        let base = options
            .lowcode
            .base_url
            .render(mode, manifest.name(), manifest.version())?;
        Ok(Self {
            view: format!("{base}/dist/index.prod.js"),
            meta: format!("{base}/dist/meta.js"),
        })
    }

    /// Locations on the dev server at `origin`, e.g. `http://127.0.0.1:3333`.
    pub fn dev_server(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            view: format!("{origin}/index.js"),
            meta: format!("{origin}/meta.js"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetsManifest {
    pub packages: Vec<Value>,
    pub components: Vec<Value>,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOrder {
    pub group_list: Vec<String>,
    pub category_list: Vec<String>,
}

#[derive(Serialize)]
struct PackageEntry<'a> {
    package: &'a str,
    version: &'a str,
    library: &'a str,
    urls: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComponentEntry<'a> {
    export_name: &'a str,
    npm: NpmRef<'a>,
    url: &'a str,
}

#[derive(Serialize)]
struct NpmRef<'a> {
    package: &'a str,
    version: &'a str,
}

impl AssetsManifest {
    /// Built-in assets first, then this package.
    pub fn build(options: &ResolvedOptions, manifest: &PackageManifest, urls: &AssetUrls) -> Self {
        let lowcode = &options.lowcode;
        let meta_library = options.meta_library();

        let mut packages = lowcode.builtin_assets.packages.clone();
        packages.push(to_value(PackageEntry {
            package: manifest.name(),
            version: manifest.version(),
            library: &options.library,
            urls: [&urls.view],
        }));

        let mut components = lowcode.builtin_assets.components.clone();
        components.push(to_value(ComponentEntry {
            export_name: &meta_library,
            npm: NpmRef {
                package: manifest.name(),
                version: manifest.version(),
            },
            url: &urls.meta,
        }));

        Self {
            packages,
            components,
            sort: SortOrder {
                group_list: lowcode.groups.clone(),
                category_list: lowcode.categories.clone(),
            },
        }
    }

    /// Manifest for a production build, or `None` when the project has no
    /// package manifest.
    pub fn for_build(options: &ResolvedOptions) -> Result<Option<Self>> {
        let Some(manifest) = PackageManifest::find(&options.context)? else {
            warn!(
                context = %options.context.display(),
                "no package.json found, skipping {ASSETS_FILE}"
            );
            return Ok(None);
        };
        let urls = AssetUrls::published(options, &manifest, "production")?;
        Ok(Some(Self::build(options, &manifest, &urls)))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Write `<out_dir>/dist/assets.json`.
    pub async fn write(&self, out_dir: &Path) -> Result<PathBuf> {
        let path = out_dir.join("dist").join(ASSETS_FILE);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, self.to_json()).await?;
        info!(path = %path.display(), "assets manifest written");
        Ok(path)
    }
}

fn to_value(entry: impl Serialize) -> Value {
    serde_json::to_value(entry).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use lowcode_config::{BaseUrl, ConfigError};
    use serde_json::json;

    fn manifest() -> PackageManifest {
        PackageManifest {
            name: Some("@acme/ui".to_string()),
            version: Some("1.2.0".to_string()),
            ..Default::default()
        }
    }

    fn options() -> ResolvedOptions {
        ResolvedOptions {
            library: "AcmeUI".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn template_base_url_is_filled_in() {
        let urls = AssetUrls::published(&options(), &manifest(), "production").unwrap();
        assert_eq!(urls.view, "https://unpkg.com/@acme/ui@1.2.0/dist/index.prod.js");
        assert_eq!(urls.meta, "https://unpkg.com/@acme/ui@1.2.0/dist/meta.js");
    }

    #[test]
    fn base_url_by_mode() {
        let mut options = options();
        options.lowcode.base_url = BaseUrl::ByMode(IndexMap::from([(
            "production".to_string(),
            "https://cdn.acme.dev/{name}/{version}/".to_string(),
        )]));

        let urls = AssetUrls::published(&options, &manifest(), "production").unwrap();
        assert_eq!(urls.meta, "https://cdn.acme.dev/@acme/ui/1.2.0/dist/meta.js");

        let err = AssetUrls::published(&options, &manifest(), "development").unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::MissingBaseUrl(mode)) if mode == "development"
        ));
    }

    #[test]
    fn builtin_assets_come_first() {
        let mut options = options();
        options.lowcode.builtin_assets.packages = vec![json!({ "package": "vue" })];
        options.lowcode.groups = vec!["base".to_string()];
        options.lowcode.categories = vec!["form".to_string()];

        let urls = AssetUrls::dev_server("http://127.0.0.1:3333/");
        let assets = AssetsManifest::build(&options, &manifest(), &urls);

        assert_eq!(
            serde_json::to_value(&assets).unwrap(),
            json!({
                "packages": [
                    { "package": "vue" },
                    {
                        "package": "@acme/ui",
                        "version": "1.2.0",
                        "library": "AcmeUI",
                        "urls": ["http://127.0.0.1:3333/index.js"]
                    }
                ],
                "components": [{
                    "exportName": "AcmeUIMeta",
                    "npm": { "package": "@acme/ui", "version": "1.2.0" },
                    "url": "http://127.0.0.1:3333/meta.js"
                }],
                "sort": { "groupList": ["base"], "categoryList": ["form"] }
            })
        );
    }
}
