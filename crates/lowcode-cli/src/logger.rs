//! Logging setup for the lowcode CLI.
//!
//! Library crates only emit `tracing` events; this module installs the
//! subscriber that prints them.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "lowcode=debug,lowcode_builder=debug,lowcode_config=debug,lowcode_cli=debug";
const QUIET_FILTER: &str = "error";
const DEFAULT_FILTER: &str = "lowcode=info,lowcode_builder=info,lowcode_config=info,lowcode_cli=info";

/// Pick the filter for the given flags.
///
/// `--verbose` wins over `--quiet`. Without either flag `RUST_LOG` is
/// honoured, falling back to info for the lowcode crates.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize the global tracing subscriber. Call once, before logging.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .init();
}
