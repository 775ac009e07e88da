//! Operator-facing terminal output.

use console::{style, Style};
use std::fmt::Display;
use std::time::Duration;

/// Success message
pub fn success(msg: impl Display) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Warning message
pub fn warning(msg: impl Display) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Error message
pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: impl Display) {
    let key_style = Style::new().cyan().bold();
    println!("{}: {}", key_style.apply_to(key), value);
}

/// Print a section header
pub fn print_header(title: &str) {
    println!();
    println!("{}", style(title).bold().underlined());
    println!();
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Cluster health status with color
pub fn status_indicator(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "green" => format!("{}", style(status).green()),
        "yellow" => format!("{}", style(status).yellow()),
        "red" => format!("{}", style(status).red()),
        _ => status.to_string(),
    }
}
