//! Cost Exporter - EMR on EKS cost extraction job
//!
//! This binary runs once per schedule tick (typically as a Kubernetes
//! CronJob), exporting the last completed hour of Kubecost allocation data
//! for EMR on EKS workloads to S3 as CSV.
//!
//! The CSV carries the Kubecost allocation columns followed by the workload
//! identifiers, and ends with a `submission_type` column (`start_job_run`,
//! `spark_operator` or `spark_submit`). Tables defined over the earlier
//! layout without that trailing column need it added before reading new
//! files.

use anyhow::{Context, Result};
use chrono::Utc;
use cost_lib::{ExtractionDriver, KubecostClient, RunOutcome, S3Exporter, StructuredLogger};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ExporterConfig::load()?;
    info!(
        endpoint = %config.kubecost_api_endpoint,
        bucket = %config.s3_bucket_name,
        prefix = %config.s3_prefix,
        window_hours = config.window_hours,
        "Exporter configured"
    );

    let client = KubecostClient::new(config.client_config())
        .context("failed to create Kubecost client")?;
    let exporter = S3Exporter::from_env(&config.s3_bucket_name, &config.s3_prefix).await;

    let logger = StructuredLogger::new(uuid::Uuid::new_v4().to_string());
    let driver = ExtractionDriver::new(Arc::new(client), config.driver_config(), logger);

    // Failures are logged by the driver; the error return sets a non-zero exit
    match driver.run(Utc::now(), &exporter).await? {
        RunOutcome::Exported {
            window,
            location,
            rows,
            ..
        } => {
            info!(window = %window, location = %location, rows, "Export finished");
        }
        RunOutcome::NoData { window, reason } => {
            info!(window = %window, reason = %reason, "Nothing exported");
        }
    }

    Ok(())
}
