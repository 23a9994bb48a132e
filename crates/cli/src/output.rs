//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use recommender_lib::ResourceRequirement;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Requested quantity of `resource`, or "-"
pub fn request(requirement: Option<&ResourceRequirement>, resource: &str) -> String {
    requirement
        .and_then(|r| r.request(resource))
        .unwrap_or("-")
        .to_string()
}

/// Limit quantity of `resource`, or "-"
pub fn limit(requirement: Option<&ResourceRequirement>, resource: &str) -> String {
    requirement
        .and_then(|r| r.limit(resource))
        .unwrap_or("-")
        .to_string()
}

/// Format currency
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${:.2}", amount)
    }
}

/// Savings in green, extra spend in red
pub fn color_savings(savings: Option<f64>) -> String {
    match savings {
        Some(amount) if amount > 0.0 => format_currency(amount).green().to_string(),
        Some(amount) if amount < 0.0 => format_currency(amount).red().to_string(),
        Some(amount) => format_currency(amount),
        None => "-".dimmed().to_string(),
    }
}

pub fn color_flag(flag: bool) -> String {
    if flag {
        "yes".green().to_string()
    } else {
        "no".yellow().to_string()
    }
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
