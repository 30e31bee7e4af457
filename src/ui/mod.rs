//! User interface module - everything printed for the person pushing.
//!
//! Diagnostics go through `tracing` (see [crate::telemetry]); this module
//! only covers the few lines meant to be read in the `git push` output.

pub mod formatter;

pub use formatter::{display_done, display_error, format_usage};
