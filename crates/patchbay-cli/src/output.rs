//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use patchbay_core::ChangeAttempt;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        eprintln!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        eprintln!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
pub fn detail(msg: &str) {
    if !is_quiet() {
        eprintln!("{msg}");
    }
}

/// Print essential machine-readable output to stdout (always prints).
///
/// Use for results meant for piping, like the patch or a JSON report.
pub fn essential(msg: &str) {
    print!("{msg}");
}

/// Get the status indicator for an attempt.
#[must_use]
pub fn attempt_indicator(attempt: &ChangeAttempt) -> String {
    if attempt.is_error() {
        "●".red().to_string()
    } else if attempt.diff().is_empty() {
        "○".dimmed().to_string()
    } else {
        "●".green().to_string()
    }
}

/// One summary line for an attempt: indicator, short id, memo.
#[must_use]
pub fn attempt_line(attempt: &ChangeAttempt) -> String {
    let id = attempt.id().to_string();
    let short = &id[..id.len().min(8)];
    let memo = attempt.memo().unwrap_or("(no memo)");
    format!("{} {} {}", attempt_indicator(attempt), short.dimmed(), memo)
}
