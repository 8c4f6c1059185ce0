//! Node asset normalization
//!
//! Managed node groups and Karpenter label capacity type under different
//! keys and spellings (`ON_DEMAND` vs `on-demand`). Nodes are classified by
//! whichever label they carry and the value is folded to `spot`/`on_demand`.

use super::{bucket_keys, stack, Normalized};
use crate::models::{labels, AssetRecord, AssetRow, AssetTable};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Node provisioning mechanism, by the label it sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provisioner {
    Karpenter,
    ManagedGroup,
}

/// Lowercase and replace `-` with `_`
///
/// `"Spot"` becomes `spot`, `"ON-DEMAND"` and `"on-demand"` become `on_demand`.
pub fn normalize_capacity_type(raw: &str) -> String {
    raw.trim().to_lowercase().replace('-', "_")
}

fn classify(record: &AssetRecord) -> Option<(Provisioner, &str)> {
    if let Some(value) = record.label_any(labels::KARPENTER_CAPACITY) {
        return Some((Provisioner::Karpenter, value));
    }
    record
        .label_any(labels::MANAGED_GROUP_CAPACITY)
        .map(|value| (Provisioner::ManagedGroup, value))
}

/// Normalize node assets into instance to capacity type rows
///
/// [`Normalized::NoData`] means no node carries either provisioning label,
/// which the caller must treat as fatal.
pub fn normalize_assets(buckets: &[BTreeMap<String, AssetRecord>]) -> Normalized<AssetTable> {
    let keys = bucket_keys(buckets);
    let records = stack(buckets, &keys);

    let mut karpenter = Vec::new();
    let mut managed = Vec::new();

    for &(key, record) in &records {
        match classify(record) {
            Some((Provisioner::Karpenter, capacity)) => karpenter.push((key, record, capacity)),
            Some((Provisioner::ManagedGroup, capacity)) => managed.push((key, record, capacity)),
            None => debug!(asset = %key, "Node has no capacity type label"),
        }
    }

    if karpenter.is_empty() && managed.is_empty() {
        return Normalized::NoData;
    }

    info!(
        karpenter_nodes = karpenter.len(),
        managed_group_nodes = managed.len(),
        "Classified node assets"
    );

    let rows: Vec<AssetRow> = karpenter
        .into_iter()
        .chain(managed)
        .filter_map(|(key, record, capacity)| {
            let Some(instance_id) = record
                .properties
                .provider_id
                .as_deref()
                .filter(|id| !id.is_empty())
            else {
                warn!(asset = %key, "Skipping node asset without providerID");
                return None;
            };

            Some(AssetRow {
                instance_id: instance_id.to_string(),
                capacity_type: normalize_capacity_type(capacity),
                instance_type: record.node_type.clone(),
            })
        })
        .collect();

    Normalized::Table(AssetTable { rows })
}
