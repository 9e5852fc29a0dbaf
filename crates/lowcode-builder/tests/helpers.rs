//! Shared test utilities for lowcode-builder tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lowcode_builder::{BundleConfig, Bundler, EmittedFile, OutputTarget, ResolvedOptions};
use lowcode_config::LowcodeOptions;
use parking_lot::Mutex;
use tempfile::TempDir;

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
    fs::write(path, content).expect("write file");
}

/// A component library with one component, one utility and one meta file.
pub fn create_component_project() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();

    write(
        root,
        "package.json",
        r#"{
  "name": "@acme/ui",
  "version": "1.2.0",
  "dependencies": { "dayjs": "^1.11.0" },
  "peerDependencies": { "vue": "^3.4.0" }
}"#,
    );
    write(
        root,
        "src/index.ts",
        "export { default as Button } from './button/Button.vue';\nexport * from './utils/size';\n",
    );
    write(
        root,
        "src/utils/size.ts",
        "export function px(value: number): string {\n  return `${value}px`;\n}\n",
    );
    write(
        root,
        "src/button/Button.vue",
        r#"<template><button class="acme-button"><slot /></button></template>
<script setup lang="ts">
defineOptions({ name: 'AcmeButton' })
const size: number = 12
</script>
"#,
    );
    write(
        root,
        "lowcode/button/meta.ts",
        "export default { componentName: 'AcmeButton', title: 'Button' };\n",
    );

    dir
}

/// Resolved options for a project rooted at `root`, as the resolver would
/// produce them with `library = AcmeUI`.
pub fn options_for(root: &Path) -> ResolvedOptions {
    ResolvedOptions {
        context: root.to_path_buf(),
        library: "AcmeUI".to_string(),
        out_dir: root.to_path_buf(),
        lowcode: LowcodeOptions {
            meta_dir: root.join("lowcode"),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// One bundler call as seen by [`RecordingBundler`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub config: BundleConfig,
    pub target: OutputTarget,
}

/// Stand-in bundler that records every call and emits one small file per
/// target.
#[derive(Default)]
pub struct RecordingBundler {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingBundler {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Bundler for RecordingBundler {
    async fn generate(
        &self,
        config: &BundleConfig,
        target: &OutputTarget,
    ) -> lowcode_builder::Result<Vec<EmittedFile>> {
        self.calls.lock().push(RecordedCall {
            config: config.clone(),
            target: target.clone(),
        });

        let file_name = match &target.file {
            Some(file) => file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            None => target
                .entry_file_names
                .as_deref()
                .unwrap_or("[name].js")
                .replace("[name]", "index"),
        };
        Ok(vec![EmittedFile {
            file_name,
            content: b"/* bundle */\n".to_vec(),
        }])
    }
}

impl<'a> From<&'a TempDir> for ProjectPaths {
    fn from(dir: &'a TempDir) -> Self {
        ProjectPaths {
            root: dir.path().to_path_buf(),
        }
    }
}

/// Well-known locations inside a test project.
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn lib(&self, rel: &str) -> PathBuf {
        self.root.join("lib").join(rel)
    }

    pub fn es(&self, rel: &str) -> PathBuf {
        self.root.join("es").join(rel)
    }

    pub fn dist(&self, rel: &str) -> PathBuf {
        self.root.join("dist").join(rel)
    }
}
