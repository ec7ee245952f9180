//! Mock stager for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, Semaphore};

use crate::stager::{
    ChecksumAlgorithm, StagedPackage, Stager, StagingError, StagingErrorKind, StagingJob,
};

/// Mock implementation of the Stager trait.
///
/// Nothing touches the filesystem. Components can be configured to fail
/// with a given error class, and the mock tracks how many jobs ran at once.
///
/// # Example
///
/// ```rust,ignore
/// use adoc_core::testing::MockStager;
///
/// let stager = MockStager::new();
/// stager.fail_component("cuid002").await;
///
/// assert!(stager.stage(&job).await.is_err());
/// assert_eq!(stager.max_in_flight(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockStager {
    /// Component ids staged successfully, in completion order.
    staged: Arc<RwLock<Vec<String>>>,
    /// Components that fail, with the failure class to report.
    failures: Arc<RwLock<HashMap<String, StagingErrorKind>>>,
    /// Components whose staging panics.
    panics: Arc<RwLock<HashSet<String>>>,
    /// Simulated staging duration.
    delay: Arc<RwLock<Duration>>,
    /// When set, every job waits for a permit before finishing.
    gate: Arc<RwLock<Option<Arc<Semaphore>>>>,
    started: Arc<AtomicUsize>,
    started_signal: Arc<Notify>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockStager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStager {
    /// Create a new mock stager where every job succeeds.
    pub fn new() -> Self {
        Self {
            staged: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            panics: Arc::new(RwLock::new(HashSet::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            gate: Arc::new(RwLock::new(None)),
            started: Arc::new(AtomicUsize::new(0)),
            started_signal: Arc::new(Notify::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make staging `component_id` fail with an I/O error.
    pub async fn fail_component(&self, component_id: &str) {
        self.fail_component_with(component_id, StagingErrorKind::Io)
            .await;
    }

    /// Make staging `component_id` fail with an error of class `kind`.
    pub async fn fail_component_with(&self, component_id: &str, kind: StagingErrorKind) {
        self.failures
            .write()
            .await
            .insert(component_id.to_string(), kind);
    }

    /// Make staging `component_id` panic.
    pub async fn panic_on_component(&self, component_id: &str) {
        self.panics.write().await.insert(component_id.to_string());
    }

    /// Hold every job until the returned semaphore hands out a permit.
    pub async fn hold_jobs(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.write().await = Some(Arc::clone(&gate));
        gate
    }

    /// Wait until at least `count` jobs have started.
    pub async fn wait_for_started(&self, count: usize) {
        loop {
            let notified = self.started_signal.notified();
            if self.started.load(Ordering::SeqCst) >= count {
                return;
            }
            notified.await;
        }
    }

    /// Set the simulated staging duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Component ids staged successfully, in completion order.
    pub async fn staged_components(&self) -> Vec<String> {
        self.staged.read().await.clone()
    }

    /// Highest number of jobs observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter even if the job is dropped mid-way.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn error_for(kind: StagingErrorKind, job: &StagingJob) -> StagingError {
    match kind {
        StagingErrorKind::Io => StagingError::SourceNotFound {
            path: job.source_dir(),
        },
        StagingErrorKind::Validation => StagingError::InvalidComponentId {
            component_id: job.component_id.clone(),
            reason: "rejected by mock".to_string(),
        },
        StagingErrorKind::ResourceExhausted => StagingError::StorageFull {
            path: job.staging_root.clone(),
        },
        StagingErrorKind::Timeout => StagingError::Timeout { timeout_secs: 0 },
        StagingErrorKind::Cancelled => StagingError::Cancelled,
        StagingErrorKind::Panicked => StagingError::Panicked {
            message: "mock".to_string(),
        },
    }
}

#[async_trait]
impl Stager for MockStager {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stage(&self, job: &StagingJob) -> Result<StagedPackage, StagingError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);
        self.started_signal.notify_waiters();

        if self.panics.read().await.contains(&job.component_id) {
            panic!("mock stager panicked on {}", job.component_id);
        }

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let gate = self.gate.read().await.clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| StagingError::Cancelled)?;
        }

        if let Some(kind) = self.failures.read().await.get(&job.component_id) {
            return Err(error_for(*kind, job));
        }

        self.staged.write().await.push(job.component_id.clone());

        Ok(StagedPackage {
            component_id: job.component_id.clone(),
            path: job.target_dir(),
            files: 1,
            total_bytes: 1024,
            checksum: ChecksumAlgorithm::default(),
            duration_ms: delay.as_millis() as u64,
        })
    }

    async fn validate(&self, _staging_root: &Path) -> Result<(), StagingError> {
        Ok(())
    }
}
