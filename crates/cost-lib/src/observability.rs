//! Structured run logging
//!
//! Every record carries an `event` field and the run id so a run can be
//! followed through JSON logs.

use crate::models::Pathway;
use crate::window::BatchWindow;
use std::collections::BTreeMap;
use tracing::{error, info};

/// Structured logger for extraction run events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log the start of a run
    pub fn log_run_started(&self, window: &BatchWindow, version: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            window_start = %window.start(),
            window_end = %window.end(),
            version = %version,
            "Starting cost extraction"
        );
    }

    /// Log node assets classified for the run
    pub fn log_assets_normalized(&self, nodes: usize) {
        info!(
            event = "assets_normalized",
            run_id = %self.run_id,
            nodes = nodes,
            "Normalized node assets"
        );
    }

    /// Log a pathway that produced rows
    pub fn log_pathway_normalized(&self, pathway: Pathway, rows: usize) {
        info!(
            event = "pathway_normalized",
            run_id = %self.run_id,
            pathway = %pathway,
            rows = rows,
            "Normalized allocations"
        );
    }

    /// Log a pathway that was skipped
    pub fn log_pathway_skipped(&self, pathway: Pathway, reason: &str) {
        info!(
            event = "pathway_skipped",
            run_id = %self.run_id,
            pathway = %pathway,
            reason = %reason,
            "Skipping allocation pathway"
        );
    }

    /// Log a completed export
    pub fn log_export_completed(
        &self,
        location: &str,
        rows: usize,
        bytes: usize,
        total_cost: f64,
        capacity_breakdown: &BTreeMap<String, usize>,
    ) {
        info!(
            event = "export_completed",
            run_id = %self.run_id,
            location = %location,
            rows = rows,
            bytes = bytes,
            total_cost = total_cost,
            capacity_breakdown = ?capacity_breakdown,
            "Exported cost allocation data"
        );
    }

    /// Log a run that ended without exporting
    pub fn log_no_data(&self, reason: &str) {
        info!(
            event = "run_no_data",
            run_id = %self.run_id,
            reason = %reason,
            "No EMR on EKS cost data to export"
        );
    }

    /// Log a fatal run failure
    pub fn log_run_failed(&self, error: &dyn std::error::Error) {
        error!(
            event = "run_failed",
            run_id = %self.run_id,
            error = %error,
            "Cost extraction failed"
        );
    }
}
