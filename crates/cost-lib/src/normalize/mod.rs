//! Normalization of Kubecost responses
//!
//! Both endpoints return one map per time bucket, keyed by an aggregate name.
//! The normalizers stack those buckets into one row per (key, bucket) and
//! turn the loosely shaped records into typed rows.

mod allocation;
mod asset;


pub use allocation::{is_sentinel_key, normalize_allocations};
pub use asset::{normalize_assets, normalize_capacity_type};

use std::collections::{BTreeMap, BTreeSet};

/// Result of normalizing one response
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    /// Rows were produced
    Table(T),
    /// Nothing to export for this response
    NoData,
    /// The response shape cannot be interpreted, treated as no data
    Unsupported(String),
}

impl<T> Normalized<T> {
    pub fn into_table(self) -> Option<T> {
        match self {
            Normalized::Table(table) => Some(table),
            Normalized::NoData | Normalized::Unsupported(_) => None,
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Normalized::Table(_))
    }
}

/// Union of keys across all buckets, in sorted order
fn bucket_keys<T>(buckets: &[BTreeMap<String, T>]) -> BTreeSet<&str> {
    buckets
        .iter()
        .flat_map(|bucket| bucket.keys().map(String::as_str))
        .collect()
}

/// One entry per (key, bucket) pair present in the response
///
/// Rows are ordered by key, then by bucket. Keys missing from a bucket
/// produce no row for that bucket.
fn stack<'a, T>(
    buckets: &'a [BTreeMap<String, T>],
    keys: &BTreeSet<&'a str>,
) -> Vec<(&'a str, &'a T)> {
    keys.iter()
        .flat_map(|key| {
            buckets
                .iter()
                .filter_map(move |bucket| bucket.get(*key).map(|record| (*key, record)))
        })
        .collect()
}
