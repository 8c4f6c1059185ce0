//! Join of allocation rows to node assets and projection onto the export schema
//!
//! Allocation rows are left-joined to assets on instance id. An instance hosts
//! many pods over a window, so the join is many-to-one and the asset side must
//! be unique per instance.

use crate::error::JoinError;
use crate::models::{AllocationRow, AllocationTable, AssetRow, AssetTable, WorkloadOrigin};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Export columns, in file order
///
/// `submission_type` is last; the columns before it keep their positions.
pub const OUTPUT_COLUMNS: &[&str] = &[
    "start",
    "end",
    "minutes",
    "cpuCores",
    "cpuCoreRequestAverage",
    "cpuCoreUsageAverage",
    "cpuCoreHours",
    "cpuCost",
    "cpuCostAdjustment",
    "cpuEfficiency",
    "gpuCount",
    "gpuHours",
    "gpuCost",
    "gpuCostAdjustment",
    "networkTransferBytes",
    "networkReceiveBytes",
    "networkCost",
    "networkCrossZoneCost",
    "networkCrossRegionCost",
    "networkInternetCost",
    "networkCostAdjustment",
    "loadBalancerCost",
    "loadBalancerCostAdjustment",
    "pvBytes",
    "pvByteHours",
    "pvCost",
    "pvs",
    "pvCostAdjustment",
    "ramBytes",
    "ramByteRequestAverage",
    "ramByteUsageAverage",
    "ramByteHours",
    "ramCost",
    "ramCostAdjustment",
    "ramEfficiency",
    "externalCost",
    "sharedCost",
    "totalCost",
    "totalEfficiency",
    "properties.cluster",
    "properties.container",
    "properties.namespace",
    "instance_id",
    "properties.labels.emr_containers_amazonaws_com_component",
    "emr_eks_subscription_id",
    "properties.labels.spark_role",
    "spark_version",
    "capacity_type",
    "pod_name",
    "job_id",
    "vc_id",
    "submission_type",
];

/// One exported row
///
/// Field order matches [`OUTPUT_COLUMNS`]. `None` is written as an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRow {
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
    pub pvs: Option<String>,
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
    #[serde(rename = "properties.cluster")]
    pub cluster: Option<String>,
    #[serde(rename = "properties.container")]
    pub container: Option<String>,
    #[serde(rename = "properties.namespace")]
    pub namespace: Option<String>,
    #[serde(rename = "instance_id")]
    pub instance_id: Option<String>,
    #[serde(rename = "properties.labels.emr_containers_amazonaws_com_component")]
    pub component: Option<String>,
    #[serde(rename = "emr_eks_subscription_id")]
    pub subscription_id: Option<String>,
    #[serde(rename = "properties.labels.spark_role")]
    pub spark_role: Option<String>,
    #[serde(rename = "spark_version")]
    pub spark_version: Option<String>,
    #[serde(rename = "capacity_type")]
    pub capacity_type: Option<String>,
    #[serde(rename = "pod_name")]
    pub pod_name: String,
    #[serde(rename = "job_id")]
    pub job_id: Option<String>,
    #[serde(rename = "vc_id")]
    pub vc_id: Option<String>,
    #[serde(rename = "submission_type")]
    pub submission_type: String,
}

impl CostRow {
    /// Project an allocation row and its matched asset onto the export schema
    pub fn project(row: &AllocationRow, asset: Option<&AssetRow>) -> Self {
        let (job_id, vc_id, subscription_id) = match &row.origin {
            WorkloadOrigin::JobRun {
                job_id,
                virtual_cluster_id,
            } => (Some(job_id.clone()), Some(virtual_cluster_id.clone()), None),
            WorkloadOrigin::Operator {
                subscription_id, ..
            } => (None, None, Some(subscription_id.clone())),
        };

        let m = &row.metrics;

        Self {
            start: m.start.clone(),
            end: m.end.clone(),
            minutes: m.minutes,
            cpu_cores: m.cpu_cores,
            cpu_core_request_average: m.cpu_core_request_average,
            cpu_core_usage_average: m.cpu_core_usage_average,
            cpu_core_hours: m.cpu_core_hours,
            cpu_cost: m.cpu_cost,
            cpu_cost_adjustment: m.cpu_cost_adjustment,
            cpu_efficiency: m.cpu_efficiency,
            gpu_count: m.gpu_count,
            gpu_hours: m.gpu_hours,
            gpu_cost: m.gpu_cost,
            gpu_cost_adjustment: m.gpu_cost_adjustment,
            network_transfer_bytes: m.network_transfer_bytes,
            network_receive_bytes: m.network_receive_bytes,
            network_cost: m.network_cost,
            network_cross_zone_cost: m.network_cross_zone_cost,
            network_cross_region_cost: m.network_cross_region_cost,
            network_internet_cost: m.network_internet_cost,
            network_cost_adjustment: m.network_cost_adjustment,
            load_balancer_cost: m.load_balancer_cost,
            load_balancer_cost_adjustment: m.load_balancer_cost_adjustment,
            pv_bytes: m.pv_bytes,
            pv_byte_hours: m.pv_byte_hours,
            pv_cost: m.pv_cost,
            pvs: m
                .pvs
                .as_ref()
                .filter(|pvs| !pvs.is_null())
                .map(|pvs| pvs.to_string()),
            pv_cost_adjustment: m.pv_cost_adjustment,
            ram_bytes: m.ram_bytes,
            ram_byte_request_average: m.ram_byte_request_average,
            ram_byte_usage_average: m.ram_byte_usage_average,
            ram_byte_hours: m.ram_byte_hours,
            ram_cost: m.ram_cost,
            ram_cost_adjustment: m.ram_cost_adjustment,
            ram_efficiency: m.ram_efficiency,
            external_cost: m.external_cost,
            shared_cost: m.shared_cost,
            total_cost: m.total_cost,
            total_efficiency: m.total_efficiency,
            cluster: row.cluster.clone(),
            container: row.container.clone(),
            namespace: row.namespace.clone(),
            instance_id: row.instance_id.clone(),
            component: row.component.clone(),
            subscription_id,
            spark_role: row.spark_role.clone(),
            spark_version: row.spark_version.clone(),
            capacity_type: asset.map(|asset| asset.capacity_type.clone()),
            pod_name: row.pod_name.clone(),
            job_id,
            vc_id,
            submission_type: row.origin.submission_type().as_str().to_string(),
        }
    }
}

/// The joined export table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable {
    pub rows: Vec<CostRow>,
}

impl CostTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row count per capacity type, `unknown` for unmatched instances
    pub fn capacity_breakdown(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            let key = row.capacity_type.as_deref().unwrap_or("unknown").to_string();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Sum of `totalCost` over all rows
    pub fn total_cost(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.total_cost).sum()
    }
}

/// Asset rows indexed by instance id, unique by construction
#[derive(Debug)]
pub struct AssetIndex<'a> {
    by_instance: HashMap<&'a str, &'a AssetRow>,
}

impl<'a> AssetIndex<'a> {
    /// Index the asset table, rejecting duplicate instance ids
    pub fn build(table: &'a AssetTable) -> Result<Self, JoinError> {
        let mut grouped: BTreeMap<&'a str, Vec<&'a AssetRow>> = BTreeMap::new();
        for row in &table.rows {
            grouped.entry(row.instance_id.as_str()).or_default().push(row);
        }

        if let Some((instance_id, rows)) = grouped.iter().find(|(_, rows)| rows.len() > 1) {
            return Err(JoinError::DuplicateInstance {
                instance_id: instance_id.to_string(),
                count: rows.len(),
            });
        }

        let by_instance = grouped
            .into_iter()
            .filter_map(|(instance_id, rows)| rows.first().map(|row| (instance_id, *row)))
            .collect();

        Ok(Self { by_instance })
    }

    pub fn get(&self, instance_id: &str) -> Option<&'a AssetRow> {
        self.by_instance.get(instance_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_instance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_instance.is_empty()
    }
}

/// Join every allocation table to the assets and union the projected rows
///
/// Tables are emitted in the order given. Returns `Ok(None)` when there is no
/// allocation table to join.
pub fn join_and_project(
    allocations: &[AllocationTable],
    assets: &AssetTable,
) -> Result<Option<CostTable>, JoinError> {
    if allocations.is_empty() {
        return Ok(None);
    }

    let index = AssetIndex::build(assets)?;
    let mut rows = Vec::with_capacity(allocations.iter().map(|t| t.rows.len()).sum());

    for table in allocations {
        let mut unmatched = 0usize;
        for row in &table.rows {
            let asset = row.instance_id.as_deref().and_then(|id| index.get(id));
            if asset.is_none() {
                unmatched += 1;
            }
            rows.push(CostRow::project(row, asset));
        }

        if unmatched > 0 {
            debug!(
                pathway = %table.pathway,
                unmatched,
                "Allocation rows without a matching node asset"
            );
        }

        info!(
            pathway = %table.pathway,
            rows = table.rows.len(),
            "Joined allocations to node assets"
        );
    }

    Ok(Some(CostTable { rows }))
}
