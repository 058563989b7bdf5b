//! `TerminalReporter` — Presentation-layer implementation of `ProgressReporter`.
//!
//! Wraps `&OutputContext` and implements the `application::ports::ProgressReporter`
//! trait so application services can emit progress events without depending on
//! any presentation type directly.

use chrono::Local;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::OutputContext;

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// Every line is prefixed with the local wall-clock time:
///
/// - `step()` prints `"[HH:MM:SS] → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"[HH:MM:SS] ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"[HH:MM:SS] ! {message}"` (suppressed when `ctx.quiet`)
/// - `error()` prints `"[HH:MM:SS] ✗ {message}"` to stderr, always
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub(crate) fn timestamp(&self) -> String {
        let now = format!("[{}]", Local::now().format("%H:%M:%S"));
        now.style(self.ctx.styles.dim).to_string()
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("{} {} {message}", self.timestamp(), "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            println!("{} {} {message}", self.timestamp(), "✓".style(self.ctx.styles.success));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            println!("{} {} {message}", self.timestamp(), "!".style(self.ctx.styles.warning));
        }
    }

    fn error(&self, message: &str) {
        eprintln!("{} {} {message}", self.timestamp(), "✗".style(self.ctx.styles.error));
    }
}
