//! Configuration for the reconciliation engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Rows reconciled concurrently. 1 walks the work order sequentially.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Timeout for a single registry call in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

fn default_workers() -> usize {
    1
}

fn default_call_timeout() -> u64 {
    30
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl ReconcileConfig {
    /// Sets the number of concurrent rows.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    pub(crate) fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
