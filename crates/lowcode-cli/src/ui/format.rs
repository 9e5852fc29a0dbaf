//! The build summary: written files grouped by output tree.

use std::path::{Path, PathBuf};
use std::time::Duration;

use console::Term;
use indexmap::IndexMap;
use owo_colors::OwoColorize;

/// Bundle size in decimal kilobytes, the unit bundlers report.
///
/// ```
/// use lowcode_cli::ui::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(15_360), "15.36 kB");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes < 1000 {
        format!("{bytes} B")
    } else {
        format!("{:.2} kB", bytes as f64 / 1000.0)
    }
}

/// Build or rebuild time: milliseconds under a second, seconds otherwise.
pub fn format_duration(duration: Duration) -> String {
    match duration.as_millis() {
        ms @ 0..1000 => format!("{ms}ms"),
        _ => format!("{:.1}s", duration.as_secs_f64()),
    }
}

/// Files of one output tree (`lib`, `es`, `dist`).
#[derive(Debug, Default, PartialEq, Eq)]
struct TreeSummary {
    bundles: Vec<(String, u64)>,
    declarations: usize,
    bytes: u64,
}

fn group_by_tree(root: &Path, files: &[(PathBuf, u64)]) -> IndexMap<String, TreeSummary> {
    let mut trees: IndexMap<String, TreeSummary> = IndexMap::new();

    for (file, size) in files {
        let relative = file.strip_prefix(root).unwrap_or(file);
        let mut components = relative.components();
        let tree = components
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();
        let rest = components.as_path().to_string_lossy().replace('\\', "/");

        let summary = trees.entry(tree).or_default();
        summary.bytes += size;
        if rest.ends_with(".d.ts") {
            summary.declarations += 1;
        } else {
            summary.bundles.push((rest, *size));
        }
    }
    trees
}

/// Print written files per output tree, relative to `root`. Declaration
/// files are counted, not listed.
pub fn print_build_summary(root: &Path, files: &[PathBuf], duration: Duration) {
    let width = (Term::stderr().size().1 as usize).clamp(20, 80);
    let sized: Vec<(PathBuf, u64)> = files
        .iter()
        .map(|file| {
            let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
            (file.clone(), size)
        })
        .collect();
    let trees = group_by_tree(root, &sized);

    eprintln!("\n{}", "Build Summary".bold().underline());
    eprintln!("{}", "─".repeat(width));

    for (tree, summary) in &trees {
        eprintln!("  {}/", tree.bright_white().bold());
        for (name, size) in &summary.bundles {
            eprintln!("    {} {} {}", "▸".blue(), name, format_size(*size).dimmed());
        }
        if summary.declarations > 0 {
            eprintln!(
                "    {} {} declaration files",
                "▸".blue(),
                summary.declarations
            );
        }
    }

    let total: u64 = trees.values().map(|summary| summary.bytes).sum();
    eprintln!("{}", "─".repeat(width));
    eprintln!(
        "  {} {} files, {} in {}",
        "Total:".bold(),
        files.len(),
        format_size(total).green(),
        format_duration(duration).green()
    );
}
