//! Command implementations.
//!
//! - [`build`] - check, bundle and write every requested format
//! - [`start`] - watch the project and serve the development bundle
//!
//! Each command exposes an `execute` function taking its parsed arguments.

pub mod build;
pub mod start;

pub use build::execute as build_execute;
pub use start::execute as start_execute;
