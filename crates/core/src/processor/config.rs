//! Configuration for the processor module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the row-processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Optional time budget for a single row in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_timeout_secs: Option<u64>,
}

fn default_workers() -> usize {
    5
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            row_timeout_secs: None,
        }
    }
}

impl ProcessorConfig {
    /// Sets the number of workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-row timeout.
    pub fn with_row_timeout(mut self, secs: u64) -> Self {
        self.row_timeout_secs = Some(secs);
        self
    }

    pub(crate) fn row_timeout(&self) -> Option<Duration> {
        self.row_timeout_secs.map(Duration::from_secs)
    }
}
