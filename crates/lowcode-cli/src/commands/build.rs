//! `lowcode build`.

use lowcode_builder::{Builder, RolldownBundler};
use lowcode_config::ResolvedOptions;
use tracing::debug;

use crate::cli::BuildArgs;
use crate::error::Result;
use crate::ui;

/// Resolve options, then check, bundle and write every requested format.
///
/// Errors from the option resolver or the builder are returned unchanged so
/// `main` can report them with their diagnostic codes.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let options = lowcode_config::resolve(
        args.common.context(),
        ResolvedOptions::default(),
        args.overrides(),
    )?;
    debug!(?options, "resolved build options");

    ui::info(&format!(
        "Building {} ({})",
        options.context.display(),
        options.format.join(", ")
    ));

    let context = options.context.clone();
    let builder = Builder::new(options, RolldownBundler);

    let spinner = ui::Spinner::new("Checking and bundling...");
    let report = match builder.build().await {
        Ok(report) => {
            spinner.finish("Build complete");
            report
        }
        Err(err) => {
            spinner.fail("Build failed");
            return Err(err.into());
        }
    };

    ui::print_build_summary(&context, &report.written, report.duration);
    ui::success(&format!(
        "Built in {}",
        ui::format_duration(report.duration)
    ));
    Ok(())
}
