//! Kubecost payload builders shared by unit tests

use crate::models::{AllocationRecord, AllocationSet, AssetRecord, AssetSet};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Allocation record as Kubecost reports it
pub fn allocation(name: &str, provider_id: &str, labels: Value) -> Value {
    json!({
        "name": name,
        "properties": {
            "cluster": "emr-cluster",
            "node": "ip-10-0-0-1.ec2.internal",
            "container": "spark-kubernetes-executor",
            "namespace": "emr-jobs",
            "pod": name.split('/').next().unwrap_or(name),
            "providerID": provider_id,
            "labels": labels
        },
        "window": {"start": "2024-03-05T08:00:00Z", "end": "2024-03-05T09:00:00Z"},
        "start": "2024-03-05T08:00:00Z",
        "end": "2024-03-05T09:00:00Z",
        "minutes": 60.0,
        "cpuCores": 2.0,
        "cpuCoreHours": 2.0,
        "cpuCost": 0.08,
        "ramBytes": 4294967296u64,
        "ramCost": 0.02,
        "pvs": null,
        "totalCost": 0.1,
        "totalEfficiency": 0.5
    })
}

/// Node asset record as Kubecost reports it
pub fn node(provider_id: &str, node_type: &str, labels: Value) -> Value {
    json!({
        "type": "Node",
        "properties": {
            "category": "Compute",
            "provider": "AWS",
            "providerID": provider_id,
            "cluster": "emr-cluster",
            "name": format!("ip-{}.ec2.internal", provider_id)
        },
        "nodeType": node_type,
        "labels": labels,
        "totalCost": 0.192
    })
}

/// One bucket from `(key, record)` pairs
pub fn bucket(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    )
}

pub fn allocation_set(buckets: Vec<Value>) -> AllocationSet {
    buckets
        .into_iter()
        .map(|bucket| {
            serde_json::from_value::<BTreeMap<String, AllocationRecord>>(bucket)
                .expect("valid allocation bucket")
        })
        .collect()
}

pub fn asset_set(buckets: Vec<Value>) -> AssetSet {
    buckets
        .into_iter()
        .map(|bucket| {
            serde_json::from_value::<BTreeMap<String, AssetRecord>>(bucket)
                .expect("valid asset bucket")
        })
        .collect()
}

/// Labels on a `StartJobRun` executor pod
pub fn job_run_labels() -> Value {
    json!({
        "emr_containers_amazonaws_com_component": "executor",
        "spark_role": "executor",
        "node_kubernetes_io_instance_type": "m5.xlarge",
        "emr_containers_amazonaws_com_job_id": "job1",
        "emr_containers_amazonaws_com_virtual_cluster_id": "vc1"
    })
}

/// Labels on a pod created by the Spark operator
pub fn operator_labels(subscription_id: &str) -> Value {
    json!({
        "eks_subscription_amazonaws_com_emr_internal_id": subscription_id,
        "emr_containers_amazonaws_com_resource_type": "spark.operator",
        "spark_role": "driver",
        "spark_version": "3.3.1",
        "node_kubernetes_io_instance_type": "m5.2xlarge"
    })
}

/// Labels on a Karpenter node
pub fn karpenter_labels(capacity_type: &str) -> Value {
    json!({ "label_karpenter_sh_capacity_type": capacity_type })
}

/// Labels on a managed node group node
pub fn managed_group_labels(capacity_type: &str) -> Value {
    json!({ "label_eks_amazonaws_com_capacityType": capacity_type })
}
