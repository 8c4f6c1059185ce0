//! Error types for an extraction run
//!
//! Every variant here is fatal to the run. Skip conditions (no data,
//! unsupported operator schema) are not errors and are reported through
//! [`crate::normalize::Normalized`] and [`crate::driver::RunOutcome`].

use thiserror::Error;

/// Errors raised while joining allocation rows to node assets
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("asset table has {count} rows for instance {instance_id}, expected at most one")]
    DuplicateInstance { instance_id: String, count: usize },
}

/// Errors that abort an extraction run
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not reach Kubecost API at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Kubecost API returned {status} for {endpoint}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode Kubecost response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid Kubecost endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("no node carries a managed node group or Karpenter capacity type label")]
    NoProvisioningLabels,

    #[error("join failed: {0}")]
    Join(#[from] JoinError),

    #[error("invalid batch window: {0}")]
    Window(String),

    #[error("failed to encode export: {0}")]
    Encode(#[from] csv::Error),

    #[error("export failed: {0}")]
    Export(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
