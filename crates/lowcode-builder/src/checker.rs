//! Check gate and declaration emit.
//!
//! Every script and component under `src` is parsed with oxc before anything
//! is bundled, then the project's TypeScript compiler type checks the lot. A
//! single diagnostic fails the whole build. Components are compiled and
//! checked under a synthetic `<file>.vue.<ext>` name so the extension drives
//! the parser dialect.

use std::path::{Path, PathBuf};

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_isolated_declarations::{IsolatedDeclarations, IsolatedDeclarationsOptions};
use oxc_parser::{Parser, ParserReturn};
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::discover::{check_sources, is_declaration};
use crate::typecheck::type_check;
use crate::{Result, sfc};

/// One problem found in a source file.
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(lowcode::check))]
pub struct CheckDiagnostic {
    pub message: String,
    #[source_code]
    pub source_code: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
    #[help]
    pub help: Option<String>,
}

/// The check gate failed.
#[derive(Debug, Error)]
#[error("syntax check failed")]
pub struct CheckError {
    pub diagnostics: Vec<CheckDiagnostic>,
}

impl CheckError {
    /// Diagnostics rendered with source context, one after another.
    pub fn render(&self) -> String {
        let handler = GraphicalReportHandler::new();
        let mut out = String::new();
        for diagnostic in &self.diagnostics {
            if handler.render_report(&mut out, diagnostic).is_err() {
                out.push_str(&diagnostic.message);
                out.push('\n');
            }
        }
        out
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Path the unit is registered under. For components this is the
    /// synthetic `<file>.vue.<ext>` name.
    pub path: PathBuf,
    /// The file the unit came from.
    pub origin: PathBuf,
    pub code: String,
}

/// Sources that passed the check, kept for declaration emit.
#[derive(Debug, Default)]
pub struct CheckedProject {
    pub units: Vec<SourceUnit>,
}

struct FileCheck {
    unit: Option<SourceUnit>,
    diagnostics: Vec<CheckDiagnostic>,
}

/// Parse every checkable file under `<project_root>/src`, then type check
/// them when the project has TypeScript installed.
///
/// Files are parsed in parallel on the blocking pool. Diagnostics come back in
/// path order regardless of completion order. The type check only runs once
/// every file parses.
pub async fn check(project_root: &Path) -> Result<CheckedProject> {
    let src_dir = project_root.join("src");
    let files = check_sources(&src_dir);
    info!(files = files.len(), "checking sources");

    let mut set = JoinSet::new();
    for (idx, file) in files.into_iter().enumerate() {
        set.spawn_blocking(move || (idx, check_file(file)));
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        let (idx, result) = joined?;
        results.push((idx, result?));
    }
    results.sort_by_key(|(idx, _)| *idx);

    let mut project = CheckedProject::default();
    let mut diagnostics = Vec::new();
    for (_, checked) in results {
        project.units.extend(checked.unit);
        diagnostics.extend(checked.diagnostics);
    }

    if !diagnostics.is_empty() {
        return Err(CheckError { diagnostics }.into());
    }

    let diagnostics = type_check(project_root, &project.units).await?;
    if !diagnostics.is_empty() {
        return Err(CheckError { diagnostics }.into());
    }

    debug!(units = project.units.len(), "check passed");
    Ok(project)
}

fn check_file(path: PathBuf) -> std::io::Result<FileCheck> {
    let raw = std::fs::read_to_string(&path)?;

    if path.extension().is_some_and(|ext| ext == "vue") {
        return Ok(check_component(path, raw));
    }

    let source = NamedSource::new(path.display().to_string(), raw.clone());
    let diagnostics = parse_diagnostics(&path, &raw, &source, 0);
    Ok(FileCheck {
        unit: Some(SourceUnit {
            path: path.clone(),
            origin: path,
            code: raw,
        }),
        diagnostics,
    })
}

fn check_component(path: PathBuf, raw: String) -> FileCheck {
    let failed = |message: String| FileCheck {
        unit: None,
        diagnostics: vec![CheckDiagnostic {
            message,
            source_code: NamedSource::new(path.display().to_string(), raw.clone()),
            span: None,
            help: None,
        }],
    };

    let scripts = match sfc::extract(&raw) {
        Ok(scripts) => scripts,
        Err(err) => return failed(err.to_string()),
    };

    if scripts.is_empty() {
        debug!(path = %path.display(), "component has no script, skipped");
        return FileCheck {
            unit: None,
            diagnostics: Vec::new(),
        };
    }

    let mut name = path.clone().into_os_string();
    name.push(".");
    name.push(scripts.extension());
    let unit_path = PathBuf::from(name);

    // Blocks are parsed on their own so spans land in the component file.
    let component = NamedSource::new(path.display().to_string(), raw.clone());
    let diagnostics: Vec<CheckDiagnostic> = [&scripts.script_setup, &scripts.script]
        .into_iter()
        .flatten()
        .flat_map(|block| parse_diagnostics(&unit_path, block.content, &component, block.offset))
        .collect();
    if !diagnostics.is_empty() {
        return FileCheck {
            unit: None,
            diagnostics,
        };
    }

    let code = match sfc::compile(&raw, sfc::CompileOptions { define_options: true }) {
        Ok(code) => code,
        Err(err) => return failed(err.to_string()),
    };
    let compiled = NamedSource::new(unit_path.display().to_string(), code.clone());
    let diagnostics = parse_diagnostics(&unit_path, &code, &compiled, 0);
    FileCheck {
        unit: Some(SourceUnit {
            path: unit_path,
            origin: path,
            code,
        }),
        diagnostics,
    }
}

/// Parser errors plus early errors from semantic analysis.
///
/// `code` sits at byte `offset` of `source`, which diagnostics are reported
/// against. `path` only picks the dialect.
fn parse_diagnostics(
    path: &Path,
    code: &str,
    source: &NamedSource<String>,
    offset: usize,
) -> Vec<CheckDiagnostic> {
    let source_type = SourceType::from_path(path).unwrap_or_default();
    let allocator = Allocator::default();
    let ParserReturn {
        program, errors, ..
    } = Parser::new(&allocator, code, source_type).parse();

    let mut errors = errors;
    if errors.is_empty() {
        let semantic = SemanticBuilder::new()
            .with_check_syntax_error(true)
            .build(&program);
        errors = semantic.errors;
    }

    errors
        .into_iter()
        .map(|err| {
            let span = err
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| SourceSpan::from((offset + label.offset(), label.len())));
            CheckDiagnostic {
                message: err.message.to_string(),
                source_code: source.clone(),
                span,
                help: err.help.as_ref().map(|help| help.to_string()),
            }
        })
        .collect()
}

impl CheckedProject {
    /// Emit `.d.ts` files for the TypeScript units under `src_root` into
    /// `out_dir`, mirroring their relative paths.
    pub async fn emit_declarations(&self, src_root: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for unit in &self.units {
            let Some(target) = declaration_path(&unit.path, src_root, out_dir) else {
                continue;
            };

            let path = unit.path.clone();
            let code = unit.code.clone();
            let declarations = tokio::task::spawn_blocking(move || emit_declaration(&path, &code)).await?;

            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, declarations).await?;
            written.push(target);
        }

        info!(count = written.len(), out_dir = %out_dir.display(), "declarations emitted");
        Ok(written)
    }
}

/// Where the declaration of `unit_path` goes, if it gets one.
///
/// Only TypeScript units under `src_root` qualify, and existing `.d.ts`
/// files are never re-emitted.
pub fn declaration_path(unit_path: &Path, src_root: &Path, out_dir: &Path) -> Option<PathBuf> {
    if is_declaration(unit_path) {
        return None;
    }
    let is_typescript = unit_path
        .extension()
        .is_some_and(|ext| ext == "ts" || ext == "tsx");
    if !is_typescript {
        return None;
    }

    let relative = unit_path.strip_prefix(src_root).ok()?;
    Some(out_dir.join(relative).with_extension("d.ts"))
}

fn emit_declaration(path: &Path, code: &str) -> String {
    let source_type = SourceType::from_path(path).unwrap_or_default();
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, source_type).parse();

    let ret = IsolatedDeclarations::new(
        &allocator,
        IsolatedDeclarationsOptions {
            strip_internal: true,
        },
    )
    .build(&parsed.program);

    if !ret.errors.is_empty() {
        debug!(
            path = %path.display(),
            errors = ret.errors.len(),
            "declaration emit reported problems"
        );
    }

    Codegen::new().build(&ret.program).code
}
