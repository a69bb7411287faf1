//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Everything the CLI prints goes through this module so quiet mode and
//! the stdout/stderr split are handled in one place. Data goes to stdout;
//! warnings, hints and errors go to stderr.

pub mod output;
