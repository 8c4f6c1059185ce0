//! Output formatting utilities

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV in the export schema
    Csv,
}

/// Render a list of items in the requested format
///
/// CSV uses the items' serde field names as the header row.
pub fn render_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                return Ok("No items found".yellow().to_string());
            }
            Ok(Table::new(items).with(Style::rounded()).to_string())
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&items)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for item in items {
                writer.serialize(item)?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| anyhow!("failed to flush CSV buffer: {}", e.error()))?;
            Ok(String::from_utf8(bytes)?)
        }
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    println!("{}", render_table(items, format)?.trim_end());
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a cost in USD, which is what Kubecost reports on EKS
pub fn format_currency(amount: f64) -> String {
    format!("${:.4}", amount)
}

/// Format an optional cell, `-` when absent
pub fn format_optional(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Color capacity type
pub fn color_capacity(capacity_type: Option<&str>) -> String {
    match capacity_type {
        Some("spot") => "spot".yellow().to_string(),
        Some("on_demand") => "on_demand".green().to_string(),
        Some(other) => other.to_string(),
        None => "unknown".red().to_string(),
    }
}
