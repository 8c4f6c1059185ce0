//! CLI commands and their shared arguments

pub mod preview;
pub mod window;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use cost_lib::{
    BatchWindow, ClientConfig, DriverConfig, ExtractionDriver, KubecostClient, StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Kubecost connection settings
#[derive(Args, Debug, Clone)]
pub struct KubecostArgs {
    /// Kubecost cost analyzer URL
    #[arg(
        long,
        env = "KUBECOST_API_ENDPOINT",
        default_value = "http://localhost:9090"
    )]
    pub endpoint: String,

    /// Allocation query step
    #[arg(long, env = "STEP", default_value = "1h")]
    pub step: String,

    /// Allocation query timeout in seconds
    #[arg(long, env = "ALLOCATION_TIMEOUT_SECS", default_value_t = 30)]
    pub allocation_timeout_secs: u64,

    /// Asset query timeout in seconds
    #[arg(long, env = "ASSETS_TIMEOUT_SECS", default_value_t = 120)]
    pub assets_timeout_secs: u64,
}

impl KubecostArgs {
    /// Build an extraction driver against the configured endpoint
    pub fn driver(&self, window_hours: u32) -> Result<ExtractionDriver> {
        let client = KubecostClient::new(ClientConfig {
            endpoint: self.endpoint.clone(),
            allocation_timeout: Duration::from_secs(self.allocation_timeout_secs),
            assets_timeout: Duration::from_secs(self.assets_timeout_secs),
        })
        .with_context(|| format!("invalid Kubecost endpoint {}", self.endpoint))?;

        debug!(endpoint = %client.base_url(), step = %self.step, "Using Kubecost endpoint");

        let config = DriverConfig {
            window_hours,
            step: self.step.clone(),
            ..Default::default()
        };

        Ok(ExtractionDriver::new(
            Arc::new(client),
            config,
            StructuredLogger::new("kce"),
        ))
    }
}

/// Window selection
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Completed hours to cover, ending one hour before now
    #[arg(long, env = "WINDOW_HOURS", default_value_t = 1)]
    pub hours: u32,

    /// Explicit window start (RFC 3339), requires --end
    #[arg(long, requires = "end")]
    pub start: Option<DateTime<Utc>>,

    /// Explicit window end (RFC 3339), requires --start
    #[arg(long, requires = "start")]
    pub end: Option<DateTime<Utc>>,
}

impl WindowArgs {
    /// Resolve to a concrete window relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<BatchWindow> {
        let window = match (self.start, self.end) {
            (Some(start), Some(end)) => BatchWindow::new(start, end)?,
            _ => BatchWindow::completed_hours(now, self.hours)?,
        };
        debug!(window = %window, explicit = self.start.is_some(), "Resolved batch window");
        Ok(window)
    }
}
