//! Extraction driver
//!
//! Runs one batch: fetch assets and both allocation variants for the window,
//! normalize, join, and hand the result to an exporter. Skip conditions come
//! back as [`RunOutcome::NoData`]; anything fatal is an [`ExtractError`].

use crate::client::CostSource;
use crate::error::{ExtractError, ExtractResult};
use crate::export::{generate_file_name, Exporter};
use crate::join::{join_and_project, CostTable};
use crate::models::{AllocationSet, AllocationTable, Pathway};
use crate::normalize::{normalize_allocations, normalize_assets, Normalized};
use crate::observability::StructuredLogger;
use crate::window::BatchWindow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Aggregate selecting job-run pods by job id and virtual cluster id
pub const JOB_RUN_AGGREGATE: &str =
    "pod,label:emr-containers.amazonaws.com/job.id,label:emr-containers.amazonaws.com/virtual-cluster-id";

/// Aggregate selecting operator pods by EMR internal subscription id
pub const OPERATOR_AGGREGATE: &str = "pod,label:eks-subscription.amazonaws.com/emr.internal.id";

/// Configuration for an extraction run
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Completed hours covered by one run
    pub window_hours: u32,
    /// Allocation query step
    pub step: String,
    pub job_run_aggregate: String,
    pub operator_aggregate: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            window_hours: 1,
            step: "1h".to_string(),
            job_run_aggregate: JOB_RUN_AGGREGATE.to_string(),
            operator_aggregate: OPERATOR_AGGREGATE.to_string(),
        }
    }
}

/// Why a run ended without exporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// Kubecost returned no node assets for the window
    NoAssets,
    /// Neither pathway produced allocation rows
    NoAllocations,
}

impl fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDataReason::NoAssets => f.write_str("no asset data for window"),
            NoDataReason::NoAllocations => f.write_str("no EMR on EKS allocation data for window"),
        }
    }
}

/// Joined data for a window, before export
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Table(CostTable),
    NoData(NoDataReason),
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Exported {
        window: BatchWindow,
        file_name: String,
        location: String,
        rows: usize,
    },
    NoData {
        window: BatchWindow,
        reason: NoDataReason,
    },
}

/// Orchestrates one extraction run
pub struct ExtractionDriver {
    source: Arc<dyn CostSource>,
    config: DriverConfig,
    logger: StructuredLogger,
}

impl ExtractionDriver {
    pub fn new(source: Arc<dyn CostSource>, config: DriverConfig, logger: StructuredLogger) -> Self {
        Self {
            source,
            config,
            logger,
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Window for a run started at `now`
    pub fn window_at(&self, now: DateTime<Utc>) -> ExtractResult<BatchWindow> {
        BatchWindow::completed_hours(now, self.config.window_hours)
    }

    /// Run for the most recently completed window and export the result
    pub async fn run(&self, now: DateTime<Utc>, exporter: &dyn Exporter) -> ExtractResult<RunOutcome> {
        let window = self.window_at(now)?;
        self.run_window(window, exporter).await
    }

    /// Run for an explicit window and export the result
    pub async fn run_window(
        &self,
        window: BatchWindow,
        exporter: &dyn Exporter,
    ) -> ExtractResult<RunOutcome> {
        let result = self.export_window(window, exporter).await;
        if let Err(e) = &result {
            self.logger.log_run_failed(e);
        }
        result
    }

    async fn export_window(
        &self,
        window: BatchWindow,
        exporter: &dyn Exporter,
    ) -> ExtractResult<RunOutcome> {
        let table = match self.extract(&window).await? {
            Extraction::Table(table) => table,
            Extraction::NoData(reason) => {
                self.logger.log_no_data(&reason.to_string());
                return Ok(RunOutcome::NoData { window, reason });
            }
        };

        let file_name = generate_file_name();
        let receipt = exporter.export(&file_name, &table).await?;

        self.logger.log_export_completed(
            &receipt.location,
            table.len(),
            receipt.bytes,
            table.total_cost(),
            &table.capacity_breakdown(),
        );

        Ok(RunOutcome::Exported {
            window,
            file_name,
            location: receipt.location,
            rows: table.len(),
        })
    }

    /// Fetch, normalize and join the data for a window without exporting
    pub async fn extract(&self, window: &BatchWindow) -> ExtractResult<Extraction> {
        self.logger.log_run_started(window, env!("CARGO_PKG_VERSION"));

        let Some(assets) = self.source.assets(window).await? else {
            return Ok(Extraction::NoData(NoDataReason::NoAssets));
        };

        let job_run = self
            .source
            .allocations(window, &self.config.job_run_aggregate, &self.config.step)
            .await?;
        let operator = self
            .source
            .allocations(window, &self.config.operator_aggregate, &self.config.step)
            .await?;

        let tables: Vec<AllocationTable> = [(Pathway::JobRun, job_run), (Pathway::Operator, operator)]
            .into_iter()
            .filter_map(|(pathway, buckets)| self.normalize_pathway(pathway, buckets))
            .collect();

        if tables.is_empty() {
            return Ok(Extraction::NoData(NoDataReason::NoAllocations));
        }

        let assets = normalize_assets(&assets)
            .into_table()
            .ok_or(ExtractError::NoProvisioningLabels)?;
        self.logger.log_assets_normalized(assets.rows.len());

        match join_and_project(&tables, &assets)? {
            Some(table) => Ok(Extraction::Table(table)),
            None => Ok(Extraction::NoData(NoDataReason::NoAllocations)),
        }
    }

    fn normalize_pathway(
        &self,
        pathway: Pathway,
        buckets: Option<AllocationSet>,
    ) -> Option<AllocationTable> {
        let Some(buckets) = buckets else {
            self.logger.log_pathway_skipped(pathway, "no allocation data");
            return None;
        };

        match normalize_allocations(&buckets, pathway) {
            Normalized::Table(table) => {
                self.logger.log_pathway_normalized(pathway, table.rows.len());
                Some(table)
            }
            Normalized::NoData => {
                self.logger.log_pathway_skipped(pathway, "no workload rows after filtering");
                None
            }
            Normalized::Unsupported(reason) => {
                self.logger.log_pathway_skipped(pathway, &reason);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportReceipt;
    use crate::fixtures::*;
    use crate::models::AssetSet;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock Kubecost returning canned buckets per aggregate
    #[derive(Default)]
    struct MockSource {
        assets: Option<AssetSet>,
        job_run: Option<AllocationSet>,
        operator: Option<AllocationSet>,
        unavailable: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CostSource for MockSource {
        async fn allocations(
            &self,
            _window: &BatchWindow,
            aggregate: &str,
            step: &str,
        ) -> ExtractResult<Option<AllocationSet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(step, "1h");
            if aggregate == JOB_RUN_AGGREGATE {
                Ok(self.job_run.clone())
            } else {
                Ok(self.operator.clone())
            }
        }

        async fn assets(&self, _window: &BatchWindow) -> ExtractResult<Option<AssetSet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                return Err(ExtractError::Api {
                    endpoint: "http://kubecost:9090/model/assets".to_string(),
                    status: 503,
                    body: "service unavailable".to_string(),
                });
            }
            Ok(self.assets.clone())
        }
    }

    /// Exporter that keeps tables in memory
    #[derive(Default)]
    struct RecordingExporter {
        exports: Mutex<Vec<(String, CostTable)>>,
    }

    #[async_trait]
    impl Exporter for RecordingExporter {
        async fn export(&self, file_name: &str, table: &CostTable) -> ExtractResult<ExportReceipt> {
            self.exports
                .lock()
                .unwrap()
                .push((file_name.to_string(), table.clone()));
            Ok(ExportReceipt {
                location: format!("memory://{}", file_name),
                bytes: 0,
            })
        }
    }

    fn build_driver(source: MockSource) -> (ExtractionDriver, Arc<MockSource>) {
        let source = Arc::new(source);
        let driver = ExtractionDriver::new(
            source.clone(),
            DriverConfig::default(),
            StructuredLogger::new("test-run"),
        );
        (driver, source)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()
    }

    fn spot_node() -> AssetSet {
        asset_set(vec![bucket(vec![(
            "cluster/node-1",
            node("i-123", "m5.xlarge", karpenter_labels("spot")),
        )])])
    }

    fn job_run_allocations() -> AllocationSet {
        allocation_set(vec![bucket(vec![
            ("pod-a/job1/vc1", allocation("pod-a/job1/vc1", "i-123", job_run_labels())),
            ("__idle__", allocation("__idle__", "", json!({}))),
        ])])
    }

    #[tokio::test]
    async fn test_exports_joined_job_run_rows() {
        let (driver, _) = build_driver(MockSource {
            assets: Some(spot_node()),
            job_run: Some(job_run_allocations()),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let outcome = driver.run(now(), &exporter).await.unwrap();

        let exports = exporter.exports.lock().unwrap();
        assert_eq!(exports.len(), 1);
        let (file_name, table) = &exports[0];

        match outcome {
            RunOutcome::Exported {
                rows,
                location,
                file_name: exported,
                window,
            } => {
                assert_eq!(rows, 1);
                assert_eq!(&exported, file_name);
                assert_eq!(location, format!("memory://{}", file_name));
                assert_eq!(window.to_query(), "2024-03-05T08:00:00Z,2024-03-05T09:00:00Z");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let row = &table.rows[0];
        assert_eq!(row.capacity_type.as_deref(), Some("spot"));
        assert_eq!(row.job_id.as_deref(), Some("job1"));
        assert_eq!(row.vc_id.as_deref(), Some("vc1"));
        assert_eq!(row.subscription_id, None);
        assert_eq!(row.submission_type, "start_job_run");
    }

    #[tokio::test]
    async fn test_union_orders_job_run_before_operator() {
        let operator = allocation_set(vec![bucket(vec![(
            "spark-driver/sub-1",
            allocation("spark-driver/sub-1", "i-123", operator_labels("sub-1")),
        )])]);
        let (driver, _) = build_driver(MockSource {
            assets: Some(spot_node()),
            job_run: Some(job_run_allocations()),
            operator: Some(operator),
            ..Default::default()
        });

        let Extraction::Table(table) = driver.extract(&driver.window_at(now()).unwrap()).await.unwrap()
        else {
            panic!("expected a table");
        };

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].submission_type, "start_job_run");
        assert_eq!(table.rows[1].submission_type, "spark_operator");
        assert_eq!(table.rows[1].subscription_id.as_deref(), Some("sub-1"));
        assert_eq!(table.rows[1].job_id, None);
        assert_eq!(table.rows[1].vc_id, None);
    }

    #[tokio::test]
    async fn test_no_assets_skips_allocation_queries() {
        let (driver, source) = build_driver(MockSource {
            job_run: Some(job_run_allocations()),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let outcome = driver.run(now(), &exporter).await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::NoData {
                reason: NoDataReason::NoAssets,
                ..
            }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(exporter.exports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_both_pathways_empty_produces_no_export() {
        let sentinel_only = allocation_set(vec![bucket(vec![
            ("__idle__", allocation("__idle__", "", json!({}))),
            ("__unallocated__", allocation("__unallocated__", "", json!({}))),
        ])]);
        let (driver, _) = build_driver(MockSource {
            assets: Some(spot_node()),
            job_run: Some(sentinel_only),
            operator: None,
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let outcome = driver.run(now(), &exporter).await.unwrap();

        assert!(matches!(
            outcome,
            RunOutcome::NoData {
                reason: NoDataReason::NoAllocations,
                ..
            }
        ));
        assert!(exporter.exports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operator_pathway_keeps_job_runs() {
        let unlabelled_operator = allocation_set(vec![bucket(vec![(
            "spark-driver/sub-1",
            allocation(
                "spark-driver/sub-1",
                "i-123",
                json!({"eks_subscription_amazonaws_com_emr_internal_id": "sub-1"}),
            ),
        )])]);
        let (driver, _) = build_driver(MockSource {
            assets: Some(spot_node()),
            job_run: Some(job_run_allocations()),
            operator: Some(unlabelled_operator),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let outcome = driver.run(now(), &exporter).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Exported { rows: 1, .. }));
    }

    #[tokio::test]
    async fn test_unlabelled_nodes_are_fatal() {
        let (driver, _) = build_driver(MockSource {
            assets: Some(asset_set(vec![bucket(vec![(
                "cluster/node-1",
                node("i-123", "m5.xlarge", json!({"label_topology_kubernetes_io_zone": "us-east-1a"})),
            )])])),
            job_run: Some(job_run_allocations()),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let err = driver.run(now(), &exporter).await.unwrap_err();

        assert!(matches!(err, ExtractError::NoProvisioningLabels));
        assert!(exporter.exports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_instance_is_fatal() {
        let duplicated = asset_set(vec![bucket(vec![
            ("cluster/node-1", node("i-123", "m5.xlarge", karpenter_labels("spot"))),
            ("cluster/node-1b", node("i-123", "m5.xlarge", managed_group_labels("ON_DEMAND"))),
        ])]);
        let (driver, _) = build_driver(MockSource {
            assets: Some(duplicated),
            job_run: Some(job_run_allocations()),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let err = driver.run(now(), &exporter).await.unwrap_err();

        assert!(matches!(err, ExtractError::Join(_)));
        assert!(exporter.exports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kubecost_unavailable_aborts_run() {
        let (driver, source) = build_driver(MockSource {
            unavailable: true,
            job_run: Some(job_run_allocations()),
            ..Default::default()
        });
        let exporter = RecordingExporter::default();

        let err = driver.run(now(), &exporter).await.unwrap_err();

        assert!(matches!(err, ExtractError::Api { status: 503, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(exporter.exports.lock().unwrap().is_empty());
    }
}
