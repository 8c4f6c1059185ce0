//! Preview and local export commands

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use cost_lib::export::encode_csv;
use cost_lib::{CostRow, CostTable, Extraction, LocalExporter, RunOutcome};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use tabled::Tabled;
use tracing::{debug, info};

use super::{KubecostArgs, WindowArgs};
use crate::output::{
    color_capacity, format_currency, format_optional, print_info, print_success, print_table,
    print_warning, OutputFormat,
};

/// Row for the preview table
#[derive(Tabled, Serialize)]
struct PreviewRow {
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Submission")]
    submission: String,
    #[tabled(rename = "Job / Subscription")]
    workload: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Capacity")]
    capacity: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

impl From<&CostRow> for PreviewRow {
    fn from(row: &CostRow) -> Self {
        Self {
            pod: row.pod_name.clone(),
            submission: row.submission_type.clone(),
            workload: format_optional(row.job_id.as_deref().or(row.subscription_id.as_deref())),
            role: format_optional(row.spark_role.as_deref()),
            instance: format_optional(row.instance_id.as_deref()),
            capacity: row
                .capacity_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            cost: format_currency(row.total_cost.unwrap_or_default()),
        }
    }
}

/// Show the joined rows for a window without exporting
pub async fn show_preview(
    kubecost: &KubecostArgs,
    window: &WindowArgs,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let driver = kubecost.driver(window.hours)?;
    let window = window.resolve(Utc::now())?;

    let table = match driver.extract(&window).await? {
        Extraction::Table(table) => {
            debug!(rows = table.len(), "Extracted cost rows for preview");
            table
        }
        Extraction::NoData(reason) => {
            print_warning(&format!("No data for {}: {}", window, reason));
            return Ok(());
        }
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&table.rows)?);
        }
        OutputFormat::Csv => {
            let bytes = encode_csv(&table)?;
            std::io::stdout()
                .write_all(&bytes)
                .context("failed to write CSV to stdout")?;
        }
        OutputFormat::Table => {
            println!("{} {}", "Cost Preview".bold(), window.to_string().dimmed());
            println!("{}", "=".repeat(50));

            let rows: Vec<PreviewRow> = table
                .rows
                .iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(PreviewRow::from)
                .collect();
            print_table(&rows, format)?;

            if rows.len() < table.len() {
                print_info(&format!("Showing {} of {} rows", rows.len(), table.len()));
            }
            println!();
            print_summary(&table);
        }
    }

    Ok(())
}

/// Run the export for a window into a local directory
pub async fn export_local(
    kubecost: &KubecostArgs,
    window: &WindowArgs,
    output: &str,
    format: OutputFormat,
) -> Result<()> {
    let driver = kubecost.driver(window.hours)?;
    let window = window.resolve(Utc::now())?;
    let exporter = LocalExporter::new(output);
    info!(window = %window, output = %output, "Exporting window to local directory");

    let outcome = driver.run_window(window, &exporter).await?;

    match (format, outcome) {
        (
            OutputFormat::Json,
            RunOutcome::Exported {
                window,
                file_name,
                location,
                rows,
            },
        ) => {
            let value = json!({
                "window": window.to_query(),
                "file_name": file_name,
                "location": location,
                "rows": rows,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        (OutputFormat::Json, RunOutcome::NoData { window, reason }) => {
            let value = json!({
                "window": window.to_query(),
                "no_data": reason.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        (_, RunOutcome::Exported { location, rows, .. }) => {
            print_success(&format!("Wrote {} rows to {}", rows, location));
        }
        (_, RunOutcome::NoData { window, reason }) => {
            print_warning(&format!("Nothing exported for {}: {}", window, reason));
        }
    }

    Ok(())
}

fn print_summary(table: &CostTable) {
    println!("{}", "Summary".bold());
    println!("{}", "-".repeat(50));
    println!("Rows:                   {}", table.len());
    println!(
        "Total cost:             {}",
        format_currency(table.total_cost()).green().bold()
    );
    for (capacity, count) in table.capacity_breakdown() {
        let label = (capacity != "unknown").then_some(capacity.as_str());
        println!("  {:<22}{}", color_capacity(label), count);
    }
}
