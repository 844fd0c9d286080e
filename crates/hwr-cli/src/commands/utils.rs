//! Utils - Common Utilities for CLI Commands
//!
//! @version 0.1.0

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

// =============================================================================
// Output Formatting
// =============================================================================

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Format an accuracy in [0, 1] as a percentage
pub fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

// =============================================================================
// Input
// =============================================================================

/// Read one trimmed line from stdin after printing `label`
pub fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

// =============================================================================
// Progress Bars
// =============================================================================

/// Epoch progress bar for a training run
pub fn epoch_progress_bar(total_epochs: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_epochs);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] epoch {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Spinner for indeterminate waits
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0.9876), "98.76%");
        assert_eq!(percent(1.0), "100.00%");
    }
}
