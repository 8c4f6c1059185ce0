//! Window inspection command

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde_json::json;

use super::WindowArgs;
use crate::output::OutputFormat;

/// Show the window a run started now would cover
pub fn show_window(args: &WindowArgs, format: OutputFormat) -> Result<()> {
    let window = args.resolve(Utc::now())?;

    match format {
        OutputFormat::Json => {
            let value = json!({
                "start": window.start().to_rfc3339(),
                "end": window.end().to_rfc3339(),
                "window": window.to_query(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => {
            println!("{}", window.to_query());
        }
        OutputFormat::Table => {
            println!("{}", "Batch Window".bold());
            println!("{}", "=".repeat(50));
            println!("Start:                  {}", window.start().to_rfc3339().cyan());
            println!("End:                    {}", window.end().to_rfc3339().cyan());
            println!("Query parameter:        {}", window.to_query());
        }
    }

    Ok(())
}
