//! Row-processing pipeline implementation.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::stager::{StagedPackage, Stager, StagingError, StagingJob};

use super::config::ProcessorConfig;
use super::types::{PipelineProgress, PipelineSummary, PoolStatus, StagingParams, StagingResult};

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Concurrency must be at least one.
    #[error("Invalid concurrency: {0} (must be at least 1)")]
    InvalidConcurrency(usize),
}

/// Tracks statistics for the worker pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the workers of one run.
struct RunState<S> {
    stager: Arc<S>,
    params: StagingParams,
    config: ProcessorConfig,
    stats: Arc<PoolStats>,
    next_row: AtomicUsize,
    completed: AtomicUsize,
    progress: Option<mpsc::Sender<PipelineProgress>>,
    results: mpsc::UnboundedSender<StagingResult>,
    cancel: CancellationToken,
}

/// Stages every row of a work order with a fixed pool of workers.
///
/// Workers pull rows from a shared cursor until the work order is drained,
/// so at most `workers` rows are in flight at once. Every row yields exactly
/// one [`StagingResult`]; a failing or panicking row never affects the
/// others. Each result is handed back as soon as its row finishes.
pub struct RowProcessor<S: Stager> {
    config: ProcessorConfig,
    stager: Arc<S>,
    stats: Arc<PoolStats>,
    progress: Option<mpsc::Sender<PipelineProgress>>,
    cancel: CancellationToken,
}

impl<S: Stager + 'static> RowProcessor<S> {
    /// Creates a new row processor.
    pub fn new(config: ProcessorConfig, stager: S) -> Self {
        Self::with_shared_stager(config, Arc::new(stager))
    }

    /// Creates a processor around a stager that is also used elsewhere.
    pub fn with_shared_stager(config: ProcessorConfig, stager: Arc<S>) -> Self {
        Self {
            config,
            stager,
            stats: Arc::new(PoolStats::default()),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sends a [`PipelineProgress`] update for every finished row.
    pub fn with_progress(mut self, tx: mpsc::Sender<PipelineProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Stops handing out rows once `token` is cancelled.
    ///
    /// Rows already being staged run to completion; rows not yet started
    /// are reported with the error `cancelled`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the current pool status.
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(self.config.workers)
    }

    /// Processes every row of the work order using the configured worker count.
    pub async fn process(
        &self,
        params: StagingParams,
    ) -> Result<Vec<StagingResult>, ProcessorError> {
        self.process_with_concurrency(params, self.config.workers)
            .await
    }

    /// Processes every row of the work order with `concurrency` workers.
    ///
    /// Results are ordered by row index and there is exactly one per row.
    pub async fn process_with_concurrency(
        &self,
        params: StagingParams,
        concurrency: usize,
    ) -> Result<Vec<StagingResult>, ProcessorError> {
        if concurrency == 0 {
            return Err(ProcessorError::InvalidConcurrency(concurrency));
        }

        let total = params.work_order.len();
        let started = Instant::now();
        info!(
            rows = total,
            workers = concurrency,
            source = %params.source.display(),
            staging = %params.staging_location.display(),
            "Starting staging run"
        );

        self.stats.queued.store(total as u64, Ordering::Relaxed);

        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let state = Arc::new(RunState {
            stager: Arc::clone(&self.stager),
            params,
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
            next_row: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            progress: self.progress.clone(),
            results: results_tx,
            cancel: self.cancel.clone(),
        });

        let mut workers = JoinSet::new();
        for worker_id in 1..=concurrency.min(total.max(1)) {
            let state = Arc::clone(&state);
            workers.spawn(run_worker(worker_id, state));
        }

        let mut slots: Vec<Option<StagingResult>> = vec![None; total];
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Staging worker terminated abnormally");
            }
        }
        while let Ok(result) = results_rx.try_recv() {
            let index = result.row_index;
            slots[index] = Some(result);
        }

        let cancelled = state.cancel.is_cancelled();
        let results: Vec<StagingResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| unfinished_row(&state.params, index, cancelled))
            })
            .collect();

        self.stats.queued.store(0, Ordering::Relaxed);

        let summary = PipelineSummary::from_results(&results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Staging run finished"
        );

        if let Some(ref tx) = self.progress {
            let _ = tx.send(PipelineProgress::Finished(summary)).await;
        }

        Ok(results)
    }
}

/// Result for a row that no worker completed.
fn unfinished_row(params: &StagingParams, index: usize, cancelled: bool) -> StagingResult {
    let component_id = params.work_order.rows()[index].component_id.clone();
    let error = if cancelled {
        StagingError::Cancelled.to_string()
    } else {
        "worker terminated before the row completed".to_string()
    };
    StagingResult {
        row_index: index,
        worker_id: 0,
        component_id,
        result: "failed: not started".to_string(),
        error,
    }
}

async fn run_worker<S: Stager>(worker_id: usize, state: Arc<RunState<S>>) {
    let rows = state.params.work_order.rows();

    loop {
        if state.cancel.is_cancelled() {
            debug!(worker_id, "Worker stopping: run cancelled");
            break;
        }

        let index = state.next_row.fetch_add(1, Ordering::Relaxed);
        let Some(row) = rows.get(index) else {
            break;
        };

        state.stats.queued.fetch_sub(1, Ordering::Relaxed);
        state.stats.active.fetch_add(1, Ordering::Relaxed);

        let job = StagingJob {
            row_index: index,
            component_id: row.component_id.clone(),
            archival_object_uri: row.uri.clone(),
            source_root: state.params.source.clone(),
            staging_root: state.params.staging_location.clone(),
            partner_code: state.params.partner_code.clone(),
            resource_code: state.params.resource_code.clone(),
            transfer_info: Arc::clone(&state.params.transfer_info),
        };

        debug!(worker_id, row = index, component_id = %job.component_id, "Staging row");
        let outcome = stage_row(&state, &job).await;

        match &outcome {
            Ok(package) => info!(
                worker_id,
                component_id = %job.component_id,
                files = package.files,
                bytes = package.total_bytes,
                "Row staged"
            ),
            Err(e) => {
                state.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                warn!(worker_id, component_id = %job.component_id, error = %e, "Row failed");
            }
        }

        state.stats.active.fetch_sub(1, Ordering::Relaxed);
        state.stats.total_processed.fetch_add(1, Ordering::Relaxed);

        let result = StagingResult::from_outcome(index, worker_id, &job.component_id, outcome);
        let completed = state.completed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(ref tx) = state.progress {
            let _ = tx
                .send(PipelineProgress::RowCompleted {
                    row_index: index,
                    worker_id,
                    component_id: result.component_id.clone(),
                    success: result.is_success(),
                    completed,
                    total: rows.len(),
                })
                .await;
        }

        // The receiver outlives every worker.
        let _ = state.results.send(result);
    }
}

async fn stage_row<S: Stager>(
    state: &RunState<S>,
    job: &StagingJob,
) -> Result<StagedPackage, StagingError> {
    let staging = AssertUnwindSafe(state.stager.stage(job)).catch_unwind();
    let outcome = match state.config.row_timeout() {
        Some(limit) => match tokio::time::timeout(limit, staging).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    component_id = %job.component_id,
                    path = %job.target_dir().display(),
                    "Row timed out; a partial package may remain"
                );
                return Err(StagingError::Timeout {
                    timeout_secs: limit.as_secs(),
                });
            }
        },
        None => staging.await,
    };

    outcome.unwrap_or_else(|panic| {
        Err(StagingError::Panicked {
            message: panic_message(panic.as_ref()),
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockStager};
    use std::path::PathBuf;
    use std::time::Duration;

    fn params(rows: usize) -> StagingParams {
        let pairs: Vec<(String, String)> = (0..rows)
            .map(|i| {
                (
                    format!("/repositories/2/archival_objects/{}", 100 + i),
                    format!("cuid{i:03}"),
                )
            })
            .collect();
        StagingParams {
            source: PathBuf::from("/sip"),
            staging_location: PathBuf::from("/staging"),
            partner_code: "fales".to_string(),
            resource_code: "mss123".to_string(),
            work_order: Arc::new(fixtures::work_order(&pairs)),
            transfer_info: Arc::new(fixtures::transfer_info("mss_123")),
        }
    }

    #[tokio::test]
    async fn test_zero_concurrency_rejected() {
        let processor = RowProcessor::new(ProcessorConfig::default(), MockStager::new());
        let err = processor
            .process_with_concurrency(params(3), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidConcurrency(0)));
    }

    #[tokio::test]
    async fn test_empty_work_order() {
        let processor = RowProcessor::new(ProcessorConfig::default(), MockStager::new());
        let results = processor.process(params(0)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_one_result_per_row_in_order() {
        let stager = MockStager::new();
        let processor =
            RowProcessor::new(ProcessorConfig::default().with_workers(3), stager.clone());

        let results = processor.process(params(8)).await.unwrap();

        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.row_index, i);
            assert_eq!(result.component_id, format!("cuid{i:03}"));
            assert!(result.is_success());
            assert!((1..=3).contains(&result.worker_id));
        }
        assert_eq!(stager.staged_components().await.len(), 8);
    }

    #[tokio::test]
    async fn test_concurrency_bounded() {
        let stager = MockStager::new();
        stager.set_delay(Duration::from_millis(20)).await;
        let processor =
            RowProcessor::new(ProcessorConfig::default().with_workers(2), stager.clone());

        processor.process(params(6)).await.unwrap();

        assert!(stager.max_in_flight() <= 2);
        assert!(stager.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let stager = MockStager::new();
        stager.fail_component("cuid001").await;
        let processor =
            RowProcessor::new(ProcessorConfig::default().with_workers(2), stager.clone());

        let results = processor.process(params(4)).await.unwrap();

        assert_eq!(results.len(), 4);
        assert!(!results[1].is_success());
        assert!(results[1].result.starts_with("failed:"));
        assert!(results[0].is_success());
        assert!(results[2].is_success());
        assert!(results[3].is_success());
        assert_eq!(processor.status().total_failed, 1);
        assert_eq!(processor.status().total_processed, 4);
    }

    #[tokio::test]
    async fn test_panicking_row_is_isolated() {
        let stager = MockStager::new();
        stager.panic_on_component("cuid004").await;
        let processor =
            RowProcessor::new(ProcessorConfig::default().with_workers(1), stager.clone());

        let results = processor.process(params(6)).await.unwrap();

        assert_eq!(results.len(), 6);
        for (i, result) in results.iter().enumerate() {
            if i == 4 {
                assert_eq!(result.result, "failed: panic");
                assert!(result.error.contains("cuid004"));
                assert_eq!(result.worker_id, 1);
            } else {
                assert!(result.is_success(), "row {i}: {}", result.error);
                assert_eq!(result.worker_id, 1);
            }
        }
        assert_eq!(stager.staged_components().await.len(), 5);
        assert_eq!(processor.status().total_failed, 1);
    }

    #[tokio::test]
    async fn test_row_timeout() {
        let stager = MockStager::new();
        stager.set_delay(Duration::from_secs(5)).await;
        let config = ProcessorConfig::default().with_workers(2).with_row_timeout(0);
        let processor = RowProcessor::new(config, stager);

        let results = processor.process(params(2)).await.unwrap();

        assert!(results.iter().all(|r| r.result == "failed: timeout"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let stager = MockStager::new();
        let processor = RowProcessor::new(ProcessorConfig::default(), stager.clone())
            .with_cancellation(token);

        let results = processor.process(params(3)).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.error == "cancelled"));
        assert!(results.iter().all(|r| r.worker_id == 0));
        assert!(stager.staged_components().await.is_empty());
    }

    #[tokio::test]
    async fn test_progress_updates() {
        let (tx, mut rx) = mpsc::channel(16);
        let processor =
            RowProcessor::new(ProcessorConfig::default(), MockStager::new()).with_progress(tx);

        processor.process(params(3)).await.unwrap();
        drop(processor);

        let mut rows = 0;
        let mut finished = None;
        while let Some(update) = rx.recv().await {
            match update {
                PipelineProgress::RowCompleted { total, .. } => {
                    assert_eq!(total, 3);
                    rows += 1;
                }
                PipelineProgress::Finished(summary) => finished = Some(summary),
            }
        }
        assert_eq!(rows, 3);
        assert_eq!(finished.unwrap().succeeded, 3);
    }
}
