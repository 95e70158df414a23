//! Shared styling utilities for command output.
//!
//! `console` drops the escape codes when stdout is not a terminal, so piped
//! output stays plain text.

use console::Style;

/// Section header (bold).
pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

/// The branch head points at (green).
pub fn current(msg: &str) -> String {
    Style::new().green().apply_to(msg).to_string()
}

/// Something the user should look at (yellow).
pub fn warn(msg: &str) -> String {
    Style::new().yellow().apply_to(msg).to_string()
}

/// Commit ids and other secondary detail.
pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}
