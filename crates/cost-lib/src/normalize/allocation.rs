//! Allocation normalization for the job-run and operator pathways

use super::{bucket_keys, stack, Normalized};
use crate::models::{
    labels, AllocationRecord, AllocationRow, AllocationTable, Pathway, SubmissionType,
    WorkloadOrigin,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Aggregate names Kubecost uses for cost it cannot attribute to a workload
const SENTINEL_KEYS: &[&str] = &["__unallocated__", "__idle__"];

/// Whether an aggregate key is (or contains) a Kubecost sentinel
pub fn is_sentinel_key(key: &str) -> bool {
    SENTINEL_KEYS.iter().any(|sentinel| key.contains(sentinel))
}

/// Normalize allocation buckets for one pathway
///
/// Returns [`Normalized::NoData`] when only sentinel keys are present or when
/// every row is filtered out.
pub fn normalize_allocations(
    buckets: &[BTreeMap<String, AllocationRecord>],
    pathway: Pathway,
) -> Normalized<AllocationTable> {
    let mut keys = bucket_keys(buckets);
    keys.retain(|key| !is_sentinel_key(key));

    if keys.is_empty() {
        debug!(pathway = %pathway, "Only sentinel allocations in response");
        return Normalized::NoData;
    }

    info!(
        pathway = %pathway,
        workloads = keys.len(),
        buckets = buckets.len(),
        "Normalizing allocations"
    );

    let records = stack(buckets, &keys);

    let rows = match pathway {
        Pathway::JobRun => job_run_rows(&records),
        Pathway::Operator => match operator_rows(&records) {
            Ok(rows) => rows,
            Err(reason) => return Normalized::Unsupported(reason),
        },
    };

    if rows.is_empty() {
        return Normalized::NoData;
    }

    Normalized::Table(AllocationTable { pathway, rows })
}

fn job_run_rows(records: &[(&str, &AllocationRecord)]) -> Vec<AllocationRow> {
    records
        .iter()
        .filter_map(|(key, record)| {
            let Some([pod, job_id, vc_id]) = split_key::<3>(key) else {
                warn!(key = %key, "Skipping allocation key not shaped pod/job/virtual-cluster");
                return None;
            };

            let origin = WorkloadOrigin::JobRun {
                job_id: job_id.to_string(),
                virtual_cluster_id: vc_id.to_string(),
            };

            Some(build_row(pod, origin, record, true))
        })
        .collect()
}

/// How operator-scoped rows are classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorPolicy {
    /// Resource type labels exist: keep only Spark operator pods
    OperatorOnly,
    /// Neither resource type nor subscription labels exist
    SparkSubmit,
}

fn operator_policy(records: &[(&str, &AllocationRecord)]) -> Result<OperatorPolicy, String> {
    let has_label = |key: &str| {
        records
            .iter()
            .any(|(_, record)| record.properties.label(key).is_some())
    };

    if has_label(labels::RESOURCE_TYPE) {
        Ok(OperatorPolicy::OperatorOnly)
    } else if has_label(labels::SUBSCRIPTION_ID) {
        Err(format!(
            "subscription label present without {}",
            labels::RESOURCE_TYPE
        ))
    } else {
        Ok(OperatorPolicy::SparkSubmit)
    }
}

fn operator_rows(records: &[(&str, &AllocationRecord)]) -> Result<Vec<AllocationRow>, String> {
    let policy = operator_policy(records)?;
    let mut dropped = 0usize;

    let rows: Vec<AllocationRow> = records
        .iter()
        .filter_map(|(key, record)| {
            let Some([pod, subscription_id]) = split_key::<2>(key) else {
                warn!(key = %key, "Skipping allocation key not shaped pod/subscription");
                return None;
            };

            let submission = match policy {
                OperatorPolicy::SparkSubmit => SubmissionType::SparkSubmit,
                OperatorPolicy::OperatorOnly => {
                    match record.properties.label(labels::RESOURCE_TYPE) {
                        Some(labels::SPARK_OPERATOR_RESOURCE) => SubmissionType::SparkOperator,
                        _ => {
                            dropped += 1;
                            return None;
                        }
                    }
                }
            };

            let origin = WorkloadOrigin::Operator {
                subscription_id: subscription_id.to_string(),
                submission,
            };

            Some(build_row(pod, origin, record, false))
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "Dropped operator-scoped rows not created by the Spark operator");
    }

    Ok(rows)
}

/// Split an aggregate key into exactly `N` non-empty parts
fn split_key<const N: usize>(key: &str) -> Option<[&str; N]> {
    let parts: Vec<&str> = key.split('/').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return None;
    }
    parts.try_into().ok()
}

fn build_row(
    pod_name: &str,
    origin: WorkloadOrigin,
    record: &AllocationRecord,
    keep_instance_type: bool,
) -> AllocationRow {
    let properties = &record.properties;
    let label = |key: &str| properties.label(key).map(str::to_string);

    AllocationRow {
        pod_name: pod_name.to_string(),
        origin,
        instance_id: properties.provider_id.clone().filter(|id| !id.is_empty()),
        cluster: properties.cluster.clone(),
        container: properties.container.clone(),
        namespace: properties.namespace.clone(),
        component: label(labels::COMPONENT),
        spark_role: label(labels::SPARK_ROLE),
        spark_version: label(labels::SPARK_VERSION),
        node_instance_type: if keep_instance_type {
            label(labels::NODE_INSTANCE_TYPE)
        } else {
            None
        },
        metrics: record.metrics.clone(),
    }
}
