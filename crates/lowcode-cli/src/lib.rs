//! # lowcode-cli
//!
//! Command-line front end of the lowcode builder.
//!
//! - [`cli`] - clap definitions and the flag-to-override mapping
//! - [`commands`] - `build` and `start`
//! - [`dev`] - watch session state, watcher and in-memory dev server
//! - [`error`] - [`CliError`] and its conversion to miette reports
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - spinners, status lines and the build summary

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
