//! CSV encoding and delivery of the joined cost table
//!
//! This module provides:
//! - CSV encoding with a fixed header row
//! - Unique file naming per run
//! - An S3 exporter (default credential chain, IRSA in-cluster)
//! - A local directory exporter for previews and tests

use crate::error::{ExtractError, ExtractResult};
use crate::join::{CostTable, OUTPUT_COLUMNS};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Encode the table as CSV with a header row
///
/// An empty table still gets its header.
pub fn encode_csv(table: &CostTable) -> ExtractResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(OUTPUT_COLUMNS)?;
    for row in &table.rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| ExtractError::Export(format!("failed to flush CSV buffer: {}", e)))
}

/// Fresh, unique export file name
pub fn generate_file_name() -> String {
    format!("{}.csv", Uuid::new_v4())
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    /// `s3://bucket/key` or a local path
    pub location: String,
    pub bytes: usize,
}

/// Destination for the joined cost table
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Persist the table under `file_name`
    async fn export(&self, file_name: &str, table: &CostTable) -> ExtractResult<ExportReceipt>;
}

/// Uploads exports to S3 under `<prefix>/<file_name>`
#[derive(Clone)]
pub struct S3Exporter {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Exporter {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_env(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config), bucket, prefix)
    }

    /// Object key for a file name
    pub fn object_key(&self, file_name: &str) -> String {
        object_key(&self.prefix, file_name)
    }
}

fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

#[async_trait]
impl Exporter for S3Exporter {
    async fn export(&self, file_name: &str, table: &CostTable) -> ExtractResult<ExportReceipt> {
        let body = encode_csv(table)?;
        let bytes = body.len();
        let key = self.object_key(file_name);

        info!(bucket = %self.bucket, key = %key, bytes, "Uploading export to S3");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("text/csv")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                ExtractError::Export(format!(
                    "upload to s3://{}/{} failed: {}",
                    self.bucket,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        Ok(ExportReceipt {
            location: format!("s3://{}/{}", self.bucket, key),
            bytes,
        })
    }
}

/// Writes exports into a local directory
#[derive(Debug, Clone)]
pub struct LocalExporter {
    dir: PathBuf,
}

impl LocalExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Exporter for LocalExporter {
    async fn export(&self, file_name: &str, table: &CostTable) -> ExtractResult<ExportReceipt> {
        let body = encode_csv(table)?;
        let path = self.dir.join(file_name);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ExtractError::Export(format!("{}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| ExtractError::Export(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), bytes = body.len(), "Wrote export to local file");

        Ok(ExportReceipt {
            location: path.display().to_string(),
            bytes: body.len(),
        })
    }
}
