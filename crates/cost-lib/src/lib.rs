//! Cost extraction library for EMR on EKS workloads
//!
//! This crate provides the core functionality for:
//! - Querying the Kubecost allocation and assets APIs
//! - Normalizing job-run and operator allocations and node assets
//! - Joining allocations to node capacity types
//! - Exporting the joined table as CSV to S3 or a local directory

pub mod client;
pub mod driver;
pub mod error;
pub mod export;
pub mod join;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod window;

#[cfg(test)]
mod fixtures;

pub use client::{ClientConfig, CostSource, KubecostClient};
pub use driver::{DriverConfig, Extraction, ExtractionDriver, NoDataReason, RunOutcome};
pub use error::{ExtractError, ExtractResult, JoinError};
pub use export::{ExportReceipt, Exporter, LocalExporter, S3Exporter};
pub use join::{CostRow, CostTable, OUTPUT_COLUMNS};
pub use models::*;
pub use observability::StructuredLogger;
pub use window::BatchWindow;
