//! ui::output
//!
//! Terminal output for the `aula` commands.
//!
//! Results go to stdout and diagnostics to stderr. `-q` silences everything
//! except errors and the machine-readable answer of a command.

use std::fmt::Display;

use serde::Serialize;

/// How much a command prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `-q`: errors and terse answers only
    Quiet,
    Normal,
    /// `--debug`
    Debug,
}

impl Verbosity {
    /// `-q` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Line on stdout, skipped under `-q`.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Error line on stderr, never silenced.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Warning on stderr, skipped under `-q`.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a next-step hint to stderr.
pub fn hint(message: impl Display) {
    eprintln!("{}", message);
}

/// Print a value as pretty JSON on stdout.
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a `key: value` line with the key padded to `width`.
pub fn field(key: &str, value: impl Display, width: usize) -> String {
    format!("{:<width$} {}", format!("{}:", key), value, width = width + 1)
}

/// One line per item, each starting with `prefix`.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
