//! Core data models for the cost exporter
//!
//! Raw types mirror the Kubecost allocation and assets API payloads. The
//! normalized types are what the normalizers hand to the join engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kubecost label keys, in the sanitised form the API reports them
pub mod labels {
    pub const COMPONENT: &str = "emr_containers_amazonaws_com_component";
    pub const SPARK_ROLE: &str = "spark_role";
    pub const SPARK_VERSION: &str = "spark_version";
    pub const NODE_INSTANCE_TYPE: &str = "node_kubernetes_io_instance_type";
    pub const SUBSCRIPTION_ID: &str = "eks_subscription_amazonaws_com_emr_internal_id";
    pub const RESOURCE_TYPE: &str = "emr_containers_amazonaws_com_resource_type";

    /// Value of [`RESOURCE_TYPE`] on pods created by the Spark operator
    pub const SPARK_OPERATOR_RESOURCE: &str = "spark.operator";

    /// Capacity type label set by EKS managed node groups
    pub const MANAGED_GROUP_CAPACITY: &[&str] = &[
        "label_eks_amazonaws_com_capacityType",
        "eks_amazonaws_com_capacityType",
    ];

    /// Capacity type label set by Karpenter
    pub const KARPENTER_CAPACITY: &[&str] = &[
        "label_karpenter_sh_capacity_type",
        "karpenter_sh_capacity_type",
    ];
}

/// Envelope shared by the allocation and assets endpoints
///
/// `data` holds one map per time bucket. Buckets can be `null`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct CostResponse<T> {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Vec::new", deserialize_with = "nullable_vec")]
    pub data: Vec<Option<BTreeMap<String, T>>>,
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> CostResponse<T> {
    /// Buckets with content, or `None` when every bucket is null or empty
    pub fn into_buckets(self) -> Option<Vec<BTreeMap<String, T>>> {
        let buckets: Vec<_> = self
            .data
            .into_iter()
            .flatten()
            .filter(|bucket| !bucket.is_empty())
            .collect();

        if buckets.is_empty() {
            None
        } else {
            Some(buckets)
        }
    }
}

/// Allocation buckets as returned by `/model/allocation/compute`
pub type AllocationSet = Vec<BTreeMap<String, AllocationRecord>>;

/// Asset buckets as returned by `/model/assets`
pub type AssetSet = Vec<BTreeMap<String, AssetRecord>>;

/// Numeric cost and usage fields of an allocation
///
/// Copied through to the export unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostMetrics {
    pub start: Option<String>,
    pub end: Option<String>,
    pub minutes: Option<f64>,
    pub cpu_cores: Option<f64>,
    pub cpu_core_request_average: Option<f64>,
    pub cpu_core_usage_average: Option<f64>,
    pub cpu_core_hours: Option<f64>,
    pub cpu_cost: Option<f64>,
    pub cpu_cost_adjustment: Option<f64>,
    pub cpu_efficiency: Option<f64>,
    pub gpu_count: Option<f64>,
    pub gpu_hours: Option<f64>,
    pub gpu_cost: Option<f64>,
    pub gpu_cost_adjustment: Option<f64>,
    pub network_transfer_bytes: Option<f64>,
    pub network_receive_bytes: Option<f64>,
    pub network_cost: Option<f64>,
    pub network_cross_zone_cost: Option<f64>,
    pub network_cross_region_cost: Option<f64>,
    pub network_internet_cost: Option<f64>,
    pub network_cost_adjustment: Option<f64>,
    pub load_balancer_cost: Option<f64>,
    pub load_balancer_cost_adjustment: Option<f64>,
    pub pv_bytes: Option<f64>,
    pub pv_byte_hours: Option<f64>,
    pub pv_cost: Option<f64>,
    pub pvs: Option<serde_json::Value>,
    pub pv_cost_adjustment: Option<f64>,
    pub ram_bytes: Option<f64>,
    pub ram_byte_request_average: Option<f64>,
    pub ram_byte_usage_average: Option<f64>,
    pub ram_byte_hours: Option<f64>,
    pub ram_cost: Option<f64>,
    pub ram_cost_adjustment: Option<f64>,
    pub ram_efficiency: Option<f64>,
    pub external_cost: Option<f64>,
    pub shared_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub total_efficiency: Option<f64>,
}

/// `properties` block of an allocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationProperties {
    pub cluster: Option<String>,
    pub node: Option<String>,
    pub container: Option<String>,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    #[serde(rename = "providerID")]
    pub provider_id: Option<String>,
    #[serde(deserialize_with = "nullable_labels")]
    pub labels: BTreeMap<String, String>,
}

impl AllocationProperties {
    /// Non-empty label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// A single allocation record keyed by its aggregate name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationRecord {
    pub name: Option<String>,
    pub properties: AllocationProperties,
    #[serde(flatten)]
    pub metrics: CostMetrics,
}

/// `properties` block of a node asset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetProperties {
    pub category: Option<String>,
    pub provider: Option<String>,
    #[serde(rename = "providerID")]
    pub provider_id: Option<String>,
    pub cluster: Option<String>,
    pub name: Option<String>,
}

/// A node asset record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetRecord {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub properties: AssetProperties,
    pub node_type: Option<String>,
    #[serde(deserialize_with = "nullable_labels")]
    pub labels: BTreeMap<String, String>,
    pub total_cost: Option<f64>,
}

impl AssetRecord {
    /// First non-empty value among equivalent label spellings
    pub fn label_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.labels.get(*key))
            .map(String::as_str)
            .find(|value| !value.is_empty())
    }
}

fn nullable_labels<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a workload reached the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionType {
    /// Submitted through the `StartJobRun` API
    StartJobRun,
    /// Submitted through the Spark operator
    SparkOperator,
    /// Submitted with `spark-submit`
    SparkSubmit,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::StartJobRun => "start_job_run",
            SubmissionType::SparkOperator => "spark_operator",
            SubmissionType::SparkSubmit => "spark_submit",
        }
    }
}

impl std::fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a workload, by pathway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadOrigin {
    /// Job and virtual cluster ids taken from the allocation key
    JobRun {
        job_id: String,
        virtual_cluster_id: String,
    },
    /// EMR internal subscription id, plus how the pod was submitted
    Operator {
        subscription_id: String,
        submission: SubmissionType,
    },
}

impl WorkloadOrigin {
    pub fn submission_type(&self) -> SubmissionType {
        match self {
            WorkloadOrigin::JobRun { .. } => SubmissionType::StartJobRun,
            WorkloadOrigin::Operator { submission, .. } => *submission,
        }
    }
}

/// One workload in one time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRow {
    pub pod_name: String,
    pub origin: WorkloadOrigin,
    pub instance_id: Option<String>,
    pub cluster: Option<String>,
    pub container: Option<String>,
    pub namespace: Option<String>,
    pub component: Option<String>,
    pub spark_role: Option<String>,
    pub spark_version: Option<String>,
    pub node_instance_type: Option<String>,
    pub metrics: CostMetrics,
}

/// Submission pathway an allocation query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathway {
    /// Aggregated by job id and virtual cluster id
    JobRun,
    /// Aggregated by the EMR internal subscription id
    Operator,
}

impl Pathway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pathway::JobRun => "job_run",
            Pathway::Operator => "operator",
        }
    }
}

impl std::fmt::Display for Pathway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized allocation rows of one pathway
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTable {
    pub pathway: Pathway,
    pub rows: Vec<AllocationRow>,
}

/// One node with a known capacity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRow {
    pub instance_id: String,
    pub capacity_type: String,
    pub instance_type: Option<String>,
}

/// Normalized node assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetTable {
    pub rows: Vec<AssetRow>,
}
