//! EMR on EKS cost exporter CLI
//!
//! A command-line tool for previewing what the exporter would write for a
//! window, writing an export to a local directory, and checking which window
//! a run would cover.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{preview, window, KubecostArgs, WindowArgs};
use tracing_subscriber::EnvFilter;

/// EMR on EKS cost exporter CLI
#[derive(Parser)]
#[command(name = "kce")]
#[command(author, version, about = "CLI for the EMR on EKS Kubecost cost exporter", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the joined cost rows for a window without exporting
    Preview {
        #[command(flatten)]
        kubecost: KubecostArgs,

        #[command(flatten)]
        window: WindowArgs,

        /// Show at most this many rows in table output
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write the export for a window to a local directory
    Export {
        #[command(flatten)]
        kubecost: KubecostArgs,

        #[command(flatten)]
        window: WindowArgs,

        /// Output directory
        #[arg(long, short, default_value = ".")]
        output: String,
    },

    /// Show the window a run would cover
    Window {
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Preview {
            kubecost,
            window,
            limit,
        } => {
            preview::show_preview(&kubecost, &window, limit, cli.format).await?;
        }
        Commands::Export {
            kubecost,
            window,
            output,
        } => {
            preview::export_local(&kubecost, &window, &output, cli.format).await?;
        }
        Commands::Window { window } => {
            window::show_window(&window, cli.format)?;
        }
    }

    Ok(())
}
