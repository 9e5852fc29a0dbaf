//! `lowcode start`: rebuild on change and serve the bundle from memory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lowcode_builder::{Bundler, DevBuild, Error as BuildError, RolldownBundler};
use lowcode_config::ResolvedOptions;
use tracing::{debug, info, warn};

use crate::cli::StartArgs;
use crate::dev::{
    BundleCache, DevServer, DevServerState, FileWatcher, IgnoreRules, SharedState, debounce,
};
use crate::error::{Result, ResultExt};
use crate::ui;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Run the watch session until Ctrl+C or SIGTERM.
///
/// Build failures are reported and the session keeps watching. Once a close
/// is requested, further changes are dropped and the command exits cleanly
/// after the watcher shuts down.
pub async fn execute(args: StartArgs) -> Result<()> {
    let options = lowcode_config::resolve(
        args.common.context(),
        ResolvedOptions::default(),
        args.overrides(),
    )?;
    let origin = args.origin();

    let rules = ignore_rules(&options);
    let dev = DevBuild::new(options, RolldownBundler);
    let state: SharedState = Arc::new(DevServerState::new());

    let server = DevServer::bind(SocketAddr::new(args.host, args.port), state.clone())
        .await
        .with_hint("Pick another port with --port")?;
    let addr = server.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = server.serve().await {
            ui::error(&err.to_string());
        }
    });
    ui::success(&format!("Development server running at http://{addr}"));

    rebuild(&dev, &state, &origin).await;

    let (mut watcher, mut changes) =
        FileWatcher::new(rules).context("Failed to watch the project")?;
    ui::info(&format!("Watching {}", watcher.root().display()));

    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(change) = change else {
                    break;
                };
                let batch = debounce(change, &mut changes, DEBOUNCE).await;
                if !state.is_running() {
                    debug!(changes = batch.len(), "session closing, change dropped");
                    continue;
                }
                for change in &batch {
                    debug!(path = %change.path().display(), "changed");
                }
                rebuild(&dev, &state, &origin).await;
            }
            _ = shutdown_signal(), if state.is_running() => {
                info!("shutdown requested");
                state.request_close();
                watcher.close();
            }
        }
    }

    state.finish_close();
    ui::success("Development server stopped");
    Ok(())
}

/// Output trees never trigger a rebuild.
fn ignore_rules(options: &ResolvedOptions) -> IgnoreRules {
    let outputs = [
        PathBuf::from("lib"),
        PathBuf::from("es"),
        options.resolve("dist"),
        options.out_dir.clone(),
        options.resolve(&options.out_dir).join("dist"),
    ];
    IgnoreRules::new(options.context.clone(), outputs)
}

async fn rebuild<B: Bundler>(dev: &DevBuild<B>, state: &DevServerState, origin: &str) {
    let started = Instant::now();
    state.start_build();

    match dev.rebuild().await {
        Ok(files) => {
            let duration = started.elapsed();
            state.complete_build(duration.as_millis() as u64, BundleCache::from_files(files));
            ui::success(&format!("Rebuilt in {}", ui::format_duration(duration)));
        }
        Err(err) => {
            let message = describe(&err);
            ui::error(&message);
            state.fail_build(message);
        }
    }

    match dev.assets(origin) {
        Ok(assets) => state.set_assets(assets.map(|manifest| manifest.to_json())),
        Err(err) => ui::warning(&format!("assets.json unavailable: {err}")),
    }
}

/// Check failures carry their source context; everything else its message.
fn describe(err: &BuildError) -> String {
    match err {
        BuildError::Check(check) => format!("{check}\n{}", check.render()),
        other => other.to_string(),
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn ignores_default_output_trees() {
        let options = ResolvedOptions {
            context: PathBuf::from("/p"),
            out_dir: PathBuf::from("/p"),
            ..ResolvedOptions::default()
        };
        let rules = ignore_rules(&options);
        assert!(rules.is_ignored(Path::new("/p/dist/index.js")));
        assert!(rules.is_ignored(Path::new("/p/lib/index.js")));
        assert!(rules.is_ignored(Path::new("/p/es/index.mjs")));
        assert!(!rules.is_ignored(Path::new("/p/src/index.ts")));
    }

    #[test]
    fn ignores_custom_out_dir() {
        let options = ResolvedOptions {
            context: PathBuf::from("/p"),
            out_dir: PathBuf::from("/p/build"),
            ..ResolvedOptions::default()
        };
        let rules = ignore_rules(&options);
        assert!(rules.is_ignored(Path::new("/p/build/dist/index.js")));
        assert!(!rules.is_ignored(Path::new("/p/src/index.ts")));
    }
}
