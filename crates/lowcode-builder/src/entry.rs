//! Synthesized entry modules.
//!
//! The view entry re-exports the library and, for the dev session, registers
//! it on `window`. The meta entry gathers every component metadata module into
//! one `components` list with package info filled in.
//!
//! Output is deterministic: the same inputs always produce byte-identical
//! files, so rebuilding does not churn the scratch directory.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;

use crate::Result;

pub const VIEW_ENTRY_FILE: &str = "view-entry.js";
pub const META_ENTRY_FILE: &str = "meta-entry.js";

/// Write `view-entry.js` into `scratch_dir` and return its path.
pub async fn generate_view_entry(
    scratch_dir: &Path,
    view_file: &Path,
    global_name: Option<&str>,
) -> Result<PathBuf> {
    let code = render_view_entry(view_file, global_name);
    write_entry(scratch_dir, VIEW_ENTRY_FILE, code).await
}

/// Write `meta-entry.js` into `scratch_dir` and return its path.
pub async fn generate_meta_entry(
    scratch_dir: &Path,
    meta_files: &[PathBuf],
    npm_info: &Map<String, Value>,
    global_name: Option<&str>,
) -> Result<PathBuf> {
    let code = render_meta_entry(meta_files, npm_info, global_name);
    write_entry(scratch_dir, META_ENTRY_FILE, code).await
}

async fn write_entry(scratch_dir: &Path, name: &str, code: String) -> Result<PathBuf> {
    fs::create_dir_all(scratch_dir).await?;
    let path = scratch_dir.join(name);
    fs::write(&path, code).await?;
    debug!(path = %path.display(), "entry generated");
    Ok(path)
}

pub fn render_view_entry(view_file: &Path, global_name: Option<&str>) -> String {
    let source = string_literal(&slash(view_file));

    match global_name {
        None => format!("export * from {source};\n"),
        Some(global) => format!(
            "import * as view from {source};\n\
             export * from {source};\n\
             window[{}] = Object.assign({{ __esModule: true }}, view);\n",
            string_literal(global)
        ),
    }
}

pub fn render_meta_entry(
    meta_files: &[PathBuf],
    npm_info: &Map<String, Value>,
    global_name: Option<&str>,
) -> String {
    let mut code = String::new();

    for (idx, file) in meta_files.iter().enumerate() {
        code.push_str(&format!(
            "import meta{idx} from {};\n",
            string_literal(&slash(file))
        ));
    }

    let npm_info = canonical(&Value::Object(npm_info.clone()));
    code.push_str(&format!("\nconst npmInfo = {npm_info};\n"));

    let names: Vec<String> = (0..meta_files.len()).map(|idx| format!("meta{idx}")).collect();
    code.push_str(&format!(
        "\nconst components = [{}].map((meta) =>\n  Object.assign({{}}, meta, {{ npm: Object.assign({{}}, npmInfo, meta.npm) }})\n);\n\n",
        names.join(", ")
    ));

    match global_name {
        None => code.push_str("export { components };\n"),
        Some(global) => code.push_str(&format!(
            "window[{}] = Object.assign({{ __esModule: true }}, {{ components }});\n",
            string_literal(global)
        )),
    }

    code
}

/// Forward-slash form of a path, for embedding in import specifiers.
pub(crate) fn slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn string_literal(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Rebuild objects with their keys in sorted order, at every depth.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn npm_info() -> Map<String, Value> {
        match json!({ "package": "@acme/ui", "destructuring": true, "version": "1.0.0" }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn view_entry_without_global_only_reexports() {
        let code = render_view_entry(Path::new("/p/src/index.ts"), None);
        assert_eq!(code, "export * from \"/p/src/index.ts\";\n");
    }

    #[test]
    fn view_entry_with_global_registers_on_window() {
        let code = render_view_entry(Path::new("/p/src/index.ts"), Some("AcmeUI"));
        assert_eq!(
            code,
            "import * as view from \"/p/src/index.ts\";\n\
             export * from \"/p/src/index.ts\";\n\
             window[\"AcmeUI\"] = Object.assign({ __esModule: true }, view);\n"
        );
    }

    #[test]
    fn meta_entry_exports_components_without_global() {
        let files = vec![
            PathBuf::from("/p/lowcode/button/meta.ts"),
            PathBuf::from("/p/lowcode/input/meta.ts"),
        ];
        let code = render_meta_entry(&files, &npm_info(), None);

        assert_eq!(
            code,
            r#"import meta0 from "/p/lowcode/button/meta.ts";
import meta1 from "/p/lowcode/input/meta.ts";

const npmInfo = {"destructuring":true,"package":"@acme/ui","version":"1.0.0"};

const components = [meta0, meta1].map((meta) =>
  Object.assign({}, meta, { npm: Object.assign({}, npmInfo, meta.npm) })
);

export { components };
"#
        );
    }

    #[test]
    fn meta_entry_with_global_exports_nothing() {
        let files = vec![PathBuf::from("/p/lowcode/button/meta.ts")];
        let code = render_meta_entry(&files, &npm_info(), Some("AcmeUIMeta"));

        assert!(code.ends_with(
            "window[\"AcmeUIMeta\"] = Object.assign({ __esModule: true }, { components });\n"
        ));
        assert!(!code.contains("export"));
    }

    #[test]
    fn meta_entry_without_files_is_empty_list() {
        let code = render_meta_entry(&[], &Map::new(), None);
        assert!(code.contains("const npmInfo = {};"));
        assert!(code.contains("const components = [].map("));
    }

    #[test]
    fn embedded_strings_are_escaped() {
        let code = render_view_entry(Path::new(r#"C:\work\"ui"\index.ts"#), Some("a\"b"));
        assert!(code.contains(r#"from "C:/work/\"ui\"/index.ts";"#));
        assert!(code.contains(r#"window["a\"b"]"#));
    }

    #[tokio::test]
    async fn generation_is_byte_identical_across_runs() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("node_modules/.lowcode-builder");
        let files = vec![dir.path().join("lowcode/button/meta.ts")];

        let first = generate_meta_entry(&scratch, &files, &npm_info(), None)
            .await
            .unwrap();
        let first_bytes = std::fs::read(&first).unwrap();
        let second = generate_meta_entry(&scratch, &files, &npm_info(), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, scratch.join(META_ENTRY_FILE));
        assert_eq!(first_bytes, std::fs::read(&second).unwrap());
    }

    #[tokio::test]
    async fn view_entry_creates_scratch_dir() {
        let dir = TempDir::new().unwrap();
        let scratch = dir.path().join("a/b/c");
        let path = generate_view_entry(&scratch, &dir.path().join("src/index.ts"), None)
            .await
            .unwrap();
        assert!(path.is_file());
    }
}
