//! Exporter configuration

use anyhow::{Context, Result};
use cost_lib::{ClientConfig, DriverConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Exporter configuration, read from the process environment
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Destination bucket
    pub s3_bucket_name: String,

    /// Key prefix for exported files
    pub s3_prefix: String,

    /// Kubecost cost analyzer base URL
    pub kubecost_api_endpoint: String,

    /// Completed hours covered by one run
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,

    /// Allocation query step
    #[serde(default = "default_step")]
    pub step: String,

    #[serde(default = "default_allocation_timeout")]
    pub allocation_timeout_secs: u64,

    #[serde(default = "default_assets_timeout")]
    pub assets_timeout_secs: u64,
}

fn default_window_hours() -> u32 {
    1
}

fn default_step() -> String {
    "1h".to_string()
}

fn default_allocation_timeout() -> u64 {
    30
}

fn default_assets_timeout() -> u64 {
    120
}

impl ExporterConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("failed to read exporter environment")?;

        let config: Self = config
            .try_deserialize()
            .context("S3_BUCKET_NAME, S3_PREFIX and KUBECOST_API_ENDPOINT must be set")?;

        if config.s3_bucket_name.trim().is_empty() {
            anyhow::bail!("S3_BUCKET_NAME must not be empty");
        }

        Ok(config)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            endpoint: self.kubecost_api_endpoint.clone(),
            allocation_timeout: Duration::from_secs(self.allocation_timeout_secs),
            assets_timeout: Duration::from_secs(self.assets_timeout_secs),
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            window_hours: self.window_hours,
            step: self.step.clone(),
            ..Default::default()
        }
    }
}
