//! Pure formatting functions for UI output.
//!
//! This module contains all display/formatting logic separated from user interaction.

use console::style;

use crate::boundary::BoundaryWarning;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a boundary warning to the user.
pub fn display_boundary_warning(warning: &BoundaryWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Format one `{action, message}` frame from the remote build.
pub fn format_build_action(action: &str, message: &str, failed: bool) -> String {
    let action = if failed {
        style(action).red().bold()
    } else {
        style(action).cyan()
    };
    if message.is_empty() {
        format!("[build] {}", action)
    } else {
        format!("[build] {} {}", action, message)
    }
}

/// Print a build action, failures on stderr.
pub fn display_build_action(action: &str, message: &str, failed: bool) {
    let line = format_build_action(action, message, failed);
    if failed {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

/// Print raw build output verbatim.
pub fn display_build_output(output: &str) {
    println!("{}", style(output).dim());
}
