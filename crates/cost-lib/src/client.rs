//! HTTP client for the Kubecost allocation and assets APIs

use crate::error::{ExtractError, ExtractResult};
use crate::models::{AllocationRecord, AllocationSet, AssetRecord, AssetSet, CostResponse};
use crate::window::BatchWindow;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Source of allocation and asset data for a window
///
/// `Ok(None)` means the API answered with no data for the window.
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Allocation buckets partitioned by `aggregate`
    async fn allocations(
        &self,
        window: &BatchWindow,
        aggregate: &str,
        step: &str,
    ) -> ExtractResult<Option<AllocationSet>>;

    /// Compute node assets
    async fn assets(&self, window: &BatchWindow) -> ExtractResult<Option<AssetSet>>;
}

/// Timeouts for the Kubecost queries
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Kubecost base URL, e.g. `http://kubecost-cost-analyzer.kubecost:9090`
    pub endpoint: String,
    pub allocation_timeout: Duration,
    pub assets_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://kubecost-cost-analyzer.kubecost:9090".to_string(),
            allocation_timeout: Duration::from_secs(30),
            assets_timeout: Duration::from_secs(120),
        }
    }
}

/// Kubecost API client
pub struct KubecostClient {
    client: Client,
    base_url: Url,
    config: ClientConfig,
}

impl KubecostClient {
    pub fn new(config: ClientConfig) -> ExtractResult<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let mut endpoint = config.endpoint.trim_end_matches('/').to_string();
        endpoint.push('/');
        let base_url = Url::parse(&endpoint)?;

        Ok(Self {
            client: Client::new(),
            base_url,
            config,
        })
    }

    /// Create a client with default timeouts
    pub fn with_endpoint(endpoint: impl Into<String>) -> ExtractResult<Self> {
        Self::new(ClientConfig {
            endpoint: endpoint.into(),
            ..Default::default()
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> ExtractResult<CostResponse<T>> {
        let url = self.base_url.join(path)?;
        let endpoint = url.to_string();

        debug!(endpoint = %endpoint, ?query, "Querying Kubecost");

        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| ExtractError::Unreachable {
                endpoint: endpoint.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                endpoint,
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| ExtractError::Decode { endpoint, source })
    }
}

#[async_trait]
impl CostSource for KubecostClient {
    async fn allocations(
        &self,
        window: &BatchWindow,
        aggregate: &str,
        step: &str,
    ) -> ExtractResult<Option<AllocationSet>> {
        let window_param = window.to_query();
        info!(window = %window_param, aggregate = %aggregate, "Querying Kubecost allocation API");

        let response: CostResponse<AllocationRecord> = self
            .get(
                "model/allocation/compute",
                &[
                    ("window", window_param.as_str()),
                    ("aggregate", aggregate),
                    ("accumulate", "false"),
                    ("step", step),
                ],
                self.config.allocation_timeout,
            )
            .await?;

        let buckets = response.into_buckets();
        if buckets.is_none() {
            info!(aggregate = %aggregate, "No allocation data found in Kubecost");
        }
        Ok(buckets)
    }

    async fn assets(&self, window: &BatchWindow) -> ExtractResult<Option<AssetSet>> {
        let window_param = window.to_query();
        info!(window = %window_param, "Querying Kubecost assets API");

        let response: CostResponse<AssetRecord> = self
            .get(
                "model/assets",
                &[
                    ("window", window_param.as_str()),
                    ("accumulate", "false"),
                    ("filterCategories", "compute"),
                    ("filterTypes", "Node"),
                ],
                self.config.assets_timeout,
            )
            .await?;

        let buckets = response.into_buckets();
        if buckets.is_none() {
            info!("No asset data found in Kubecost");
        }
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = KubecostClient::with_endpoint("http://kubecost.kubecost:9090/proxy").unwrap();
        assert_eq!(client.base_url().as_str(), "http://kubecost.kubecost:9090/proxy/");
        assert_eq!(
            client.base_url().join("model/assets").unwrap().as_str(),
            "http://kubecost.kubecost:9090/proxy/model/assets"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            KubecostClient::with_endpoint("not a url"),
            Err(ExtractError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_default_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.allocation_timeout, Duration::from_secs(30));
        assert_eq!(config.assets_timeout, Duration::from_secs(120));
    }
}
