//! Type check of the checked sources with the project's TypeScript compiler.
//!
//! Units are mirrored into a scratch directory, components under their
//! compiled `<file>.vue.<ext>` names so `./Button.vue` imports resolve. A
//! generated `tsconfig.json` extends the project's own when there is one. The
//! compiler runs with `--noEmit` and its `file(line,col): error TSxxxx:`
//! lines become [`CheckDiagnostic`]s against the unit code.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use miette::{NamedSource, SourceSpan};
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::Result;
use crate::checker::{CheckDiagnostic, SourceUnit};

/// Scratch directory of the type check, relative to the project root.
const SCRATCH_DIR: &str = "node_modules/.lowcode-builder/typecheck";

/// The compiler binary installed for `project_root`: `node_modules/.bin/tsc`
/// of the project or one of its ancestors.
pub fn find_compiler(project_root: &Path) -> Option<PathBuf> {
    let binary = if cfg!(windows) { "tsc.cmd" } else { "tsc" };
    project_root
        .ancestors()
        .map(|dir| dir.join("node_modules").join(".bin").join(binary))
        .find(|candidate| candidate.is_file())
}

/// Run the compiler over `units`. Returns no diagnostics when the project has
/// no TypeScript installed.
pub async fn type_check(project_root: &Path, units: &[SourceUnit]) -> Result<Vec<CheckDiagnostic>> {
    let Some(compiler) = find_compiler(project_root) else {
        warn!("typescript is not installed in the project, skipping type check");
        return Ok(Vec::new());
    };
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let scratch = project_root.join(SCRATCH_DIR);
    match tokio::fs::remove_dir_all(&scratch).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err.into()),
        _ => {}
    }

    let mut files = Vec::with_capacity(units.len());
    for unit in units {
        let Ok(relative) = unit.path.strip_prefix(project_root) else {
            continue;
        };
        let target = scratch.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &unit.code).await?;
        files.push(slash(relative));
    }

    let tsconfig = scratch.join("tsconfig.json");
    let config = tsconfig_for(project_root, &files);
    let config = serde_json::to_vec_pretty(&config).map_err(std::io::Error::other)?;
    tokio::fs::write(&tsconfig, config).await?;

    info!(compiler = %compiler.display(), files = files.len(), "type checking");
    let output = Command::new(&compiler)
        .arg("--project")
        .arg(&tsconfig)
        .arg("--pretty")
        .arg("false")
        .current_dir(&scratch)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output.status.success() {
        debug!("type check passed");
        return Ok(Vec::new());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let messages = parse_compiler_output(&format!("{stdout}\n{stderr}"));
    if messages.is_empty() {
        let raw = [stdout.trim(), stderr.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(vec![CheckDiagnostic {
            message: format!(
                "type check exited with {}: {raw}",
                output.status.code().unwrap_or(-1)
            ),
            source_code: NamedSource::new(compiler.display().to_string(), String::new()),
            span: None,
            help: None,
        }]);
    }

    Ok(messages
        .into_iter()
        .map(|message| to_diagnostic(message, project_root, units))
        .collect())
}

fn tsconfig_for(project_root: &Path, files: &[String]) -> serde_json::Value {
    let mut config = json!({
        "compilerOptions": {
            "noEmit": true,
            "declaration": false,
            "skipLibCheck": true,
            "noImplicitAny": false,
            "preserveSymlinks": true,
            "allowJs": true,
            "module": "esnext",
            "moduleResolution": "bundler",
            "target": "es2018",
            "jsx": "preserve",
            "jsxImportSource": "vue",
            "baseUrl": "src",
        },
        "files": files,
        // An extended config would otherwise bring its own `include` along.
        "include": [],
    });

    let project_tsconfig = project_root.join("tsconfig.json");
    if project_tsconfig.is_file() {
        config["extends"] = json!(slash(&project_tsconfig));
    }
    config
}

/// One `file(line,col): error TSxxxx: message` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerMessage {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
    pub code: String,
    pub message: String,
}

/// Parse `--pretty false` compiler output. Indented continuation lines are
/// folded into the message above them.
pub fn parse_compiler_output(output: &str) -> Vec<CompilerMessage> {
    let mut messages: Vec<CompilerMessage> = Vec::new();

    for line in output.lines() {
        if let Some(message) = parse_located(line).or_else(|| parse_global(line)) {
            messages.push(message);
        } else if line.starts_with(' ') && !line.trim().is_empty() {
            if let Some(last) = messages.last_mut() {
                last.message.push('\n');
                last.message.push_str(line.trim());
            }
        }
    }
    messages
}

fn parse_located(line: &str) -> Option<CompilerMessage> {
    let (location, rest) = line.split_once("): error ")?;
    let (file, position) = location.rsplit_once('(')?;
    let (line_no, column) = position.split_once(',')?;
    let (code, message) = rest.split_once(": ")?;
    Some(CompilerMessage {
        file: Some(file.trim().to_string()),
        line: line_no.trim().parse().ok()?,
        column: column.trim().parse().ok()?,
        code: code.to_string(),
        message: message.to_string(),
    })
}

fn parse_global(line: &str) -> Option<CompilerMessage> {
    let rest = line.strip_prefix("error ")?;
    let (code, message) = rest.split_once(": ")?;
    Some(CompilerMessage {
        file: None,
        line: 0,
        column: 0,
        code: code.to_string(),
        message: message.to_string(),
    })
}

fn to_diagnostic(message: CompilerMessage, project_root: &Path, units: &[SourceUnit]) -> CheckDiagnostic {
    let text = format!("{}: {}", message.code, message.message);
    let unit = message.file.as_deref().and_then(|file| {
        let file = file.replace('\\', "/");
        units.iter().find(|unit| {
            unit.path
                .strip_prefix(project_root)
                .is_ok_and(|relative| file.ends_with(&slash(relative)))
        })
    });

    match unit {
        Some(unit) => CheckDiagnostic {
            message: text,
            source_code: NamedSource::new(unit.path.display().to_string(), unit.code.clone()),
            span: byte_offset(&unit.code, message.line, message.column)
                .map(|offset| SourceSpan::from((offset, 1))),
            help: None,
        },
        None => CheckDiagnostic {
            message: text,
            source_code: NamedSource::new(message.file.unwrap_or_default(), String::new()),
            span: None,
            help: None,
        },
    }
}

/// Byte offset of a 1-based line and column.
fn byte_offset(code: &str, line: usize, column: usize) -> Option<usize> {
    let line_start = if line <= 1 {
        0
    } else {
        code.match_indices('\n').nth(line - 2).map(|(idx, _)| idx + 1)?
    };
    let rest = &code[line_start..];
    let within = rest
        .char_indices()
        .nth(column.saturating_sub(1))
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len());
    Some(line_start + within)
}

fn slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_located_and_global_errors() {
        let output = "src/index.ts(1,14): error TS2322: Type 'string' is not assignable to type 'number'.\n\
                      src/button/Button.vue.ts(3,7): error TS2304: Cannot find name 'missing'.\n  \
                      Did you mean 'mission'?\n\
                      error TS5083: Cannot read file 'tsconfig.base.json'.\n";
        let messages = parse_compiler_output(output);

        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            CompilerMessage {
                file: Some("src/index.ts".to_string()),
                line: 1,
                column: 14,
                code: "TS2322".to_string(),
                message: "Type 'string' is not assignable to type 'number'.".to_string(),
            }
        );
        assert_eq!(
            messages[1].message,
            "Cannot find name 'missing'.\nDid you mean 'mission'?"
        );
        assert_eq!(messages[2].file, None);
        assert_eq!(messages[2].code, "TS5083");
    }

    #[test]
    fn unrelated_lines_are_skipped() {
        assert!(parse_compiler_output("Version 5.4.5\n\nFound 0 errors.\n").is_empty());
    }

    #[test]
    fn offsets_follow_lines_and_columns() {
        let code = "const a = 1;\nexport const b: number = \"x\";\n";
        assert_eq!(byte_offset(code, 1, 1), Some(0));
        assert_eq!(byte_offset(code, 2, 14), Some(26));
        assert_eq!(byte_offset(code, 9, 1), None);
    }

    #[test]
    fn diagnostics_point_into_their_unit() {
        let root = Path::new("/p");
        let units = vec![SourceUnit {
            path: PathBuf::from("/p/src/index.ts"),
            origin: PathBuf::from("/p/src/index.ts"),
            code: "export const a: number = \"not a number\";\n".to_string(),
        }];
        let message = parse_compiler_output(
            "src/index.ts(1,14): error TS2322: Type 'string' is not assignable to type 'number'.",
        )
        .remove(0);

        let diagnostic = to_diagnostic(message, root, &units);
        assert!(diagnostic.message.starts_with("TS2322: "));
        assert_eq!(diagnostic.span, Some(SourceSpan::from((13, 1))));
    }

    #[test]
    fn project_tsconfig_is_extended() {
        let dir = tempfile::TempDir::new().unwrap();
        let files = vec!["src/index.ts".to_string()];
        assert!(tsconfig_for(dir.path(), &files).get("extends").is_none());

        std::fs::write(dir.path().join("tsconfig.json"), "{}").unwrap();
        let config = tsconfig_for(dir.path(), &files);
        assert!(config["extends"].as_str().unwrap().ends_with("/tsconfig.json"));
        assert_eq!(config["files"][0], "src/index.ts");
        assert_eq!(config["include"], json!([]));
        assert_eq!(config["compilerOptions"]["noEmit"], true);
    }
}
