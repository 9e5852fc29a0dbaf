//! Source tree enumeration.
//!
//! All walks skip `node_modules`, and results are sorted so that generated
//! entries and diagnostics are stable across runs.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

const META_STEMS: [&str; 4] = ["meta.js", "meta.jsx", "meta.ts", "meta.tsx"];

/// Component metadata files (`**/meta.{js,jsx,ts,tsx}`) under `meta_dir`.
///
/// A missing directory yields an empty list.
pub fn discover_meta_files(meta_dir: &Path) -> Vec<PathBuf> {
    collect(meta_dir, &["node_modules"], |path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| META_STEMS.contains(&name))
    })
}

/// Files the checker looks at: `src/**/*.{ts,tsx,vue}` outside `demos`.
pub fn check_sources(src_dir: &Path) -> Vec<PathBuf> {
    collect(src_dir, &["node_modules", "demos"], |path| {
        has_extension(path, &["ts", "tsx", "vue"])
    })
}

/// Per-module inputs of the cjs/esm build: `src/**/*.{ts,tsx,js,jsx,vue}`.
///
/// Declaration files and `demos` are left out.
pub fn library_inputs(src_dir: &Path) -> Vec<PathBuf> {
    collect(src_dir, &["node_modules", "demos"], |path| {
        has_extension(path, &["ts", "tsx", "js", "jsx", "vue"]) && !is_declaration(path)
    })
}

pub(crate) fn is_declaration(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".d.ts"))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn collect(root: &Path, skip_dirs: &[&str], keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    let skipped = |entry: &DirEntry| {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| skip_dirs.contains(&name))
    };

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !skipped(entry))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && keep(entry.path()))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}
