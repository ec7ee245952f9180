//! Types for the processor module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::stager::{StagedPackage, StagingError};
use crate::workorder::{TransferInfo, WorkOrder};

/// Staging report header.
pub const STAGING_REPORT_HEADER: [&str; 4] = ["worker_id", "component_id", "result", "error"];

/// Read-only state shared by every worker in a staging run.
#[derive(Debug, Clone)]
pub struct StagingParams {
    /// Source package root (one sub-directory per component).
    pub source: PathBuf,
    /// Staging location packages are written to.
    pub staging_location: PathBuf,
    pub partner_code: String,
    pub resource_code: String,
    pub work_order: Arc<WorkOrder>,
    pub transfer_info: Arc<TransferInfo>,
}

/// Outcome of staging one work order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingResult {
    /// Position of the row in the work order.
    pub row_index: usize,
    /// Worker that handled the row; 0 if no worker picked it up.
    pub worker_id: usize,
    pub component_id: String,
    pub result: String,
    /// Empty on success.
    pub error: String,
}

impl StagingResult {
    pub(crate) fn from_outcome(
        row_index: usize,
        worker_id: usize,
        component_id: &str,
        outcome: Result<StagedPackage, StagingError>,
    ) -> Self {
        match outcome {
            Ok(package) => Self {
                row_index,
                worker_id,
                component_id: component_id.to_string(),
                result: package.summary(),
                error: String::new(),
            },
            Err(e) => Self {
                row_index,
                worker_id,
                component_id: component_id.to_string(),
                result: format!("failed: {}", e.kind().as_str()),
                error: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Report columns in header order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.worker_id.to_string(),
            self.component_id.clone(),
            self.result.clone(),
            self.error.clone(),
        ]
    }
}

/// Progress updates from the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineProgress {
    /// One row finished, successfully or not.
    RowCompleted {
        row_index: usize,
        worker_id: usize,
        component_id: String,
        success: bool,
        completed: usize,
        total: usize,
    },
    /// Every row has a result.
    Finished(PipelineSummary),
}

/// Counts over a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PipelineSummary {
    pub fn from_results(results: &[StagingResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

/// Status of the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub active_jobs: usize,
    pub max_concurrent: usize,
    pub queued_jobs: usize,
    pub total_processed: u64,
    pub total_failed: u64,
}
