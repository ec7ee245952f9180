//! Mock registry client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::registry::{
    split_uri, ArchivalObject, DigitalObject, RegistryClient, RegistryError,
};

/// A recorded registry lookup for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedLookup {
    ArchivalObject { repo_id: u32, local_id: u32 },
    DigitalObject { repo_id: u32, local_id: u32 },
}

/// Mock implementation of the RegistryClient trait.
///
/// Records are keyed by the `(repository, id)` pair taken from their URI.
/// Lookups of anything not added return [`RegistryError::NotFound`].
///
/// # Example
///
/// ```rust,ignore
/// use adoc_core::testing::{fixtures, MockRegistry};
///
/// let registry = MockRegistry::new();
/// registry.add_archival_object(fixtures::archival_object(2, 100, "Letters", &[55])).await;
/// registry.add_digital_object(fixtures::digital_object(2, 55, "ABC123")).await;
///
/// let ao = registry.get_archival_object(2, 100).await?;
/// assert_eq!(registry.recorded_lookups().await.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockRegistry {
    archival_objects: Arc<RwLock<HashMap<(u32, u32), ArchivalObject>>>,
    digital_objects: Arc<RwLock<HashMap<(u32, u32), DigitalObject>>>,
    lookups: Arc<RwLock<Vec<RecordedLookup>>>,
    /// If set, the next lookup will fail with this error.
    next_error: Arc<RwLock<Option<RegistryError>>>,
    /// Simulated latency per lookup.
    delay: Arc<RwLock<Duration>>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistry {
    /// Create a new empty mock registry.
    pub fn new() -> Self {
        Self {
            archival_objects: Arc::new(RwLock::new(HashMap::new())),
            digital_objects: Arc::new(RwLock::new(HashMap::new())),
            lookups: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Add an archival object, keyed by its URI.
    ///
    /// # Panics
    ///
    /// Panics if the object's URI cannot be split.
    pub async fn add_archival_object(&self, ao: ArchivalObject) {
        let key = key_for(&ao.uri);
        self.archival_objects.write().await.insert(key, ao);
    }

    /// Add a digital object, keyed by its URI.
    ///
    /// # Panics
    ///
    /// Panics if the object's URI cannot be split.
    pub async fn add_digital_object(&self, digital_object: DigitalObject) {
        let key = key_for(&digital_object.uri);
        self.digital_objects.write().await.insert(key, digital_object);
    }

    /// Get all recorded lookups, in call order.
    pub async fn recorded_lookups(&self) -> Vec<RecordedLookup> {
        self.lookups.read().await.clone()
    }

    /// Number of digital object lookups performed.
    pub async fn digital_object_lookups(&self) -> usize {
        self.lookups
            .read()
            .await
            .iter()
            .filter(|l| matches!(l, RecordedLookup::DigitalObject { .. }))
            .count()
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: RegistryError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated latency of every lookup.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    async fn before_lookup(&self, lookup: RecordedLookup) -> Result<(), RegistryError> {
        self.lookups.write().await.push(lookup);

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn key_for(uri: &str) -> (u32, u32) {
    match split_uri(uri) {
        Ok(key) => key,
        Err(e) => panic!("mock registry record has an unusable URI: {e}"),
    }
}

#[async_trait]
impl RegistryClient for MockRegistry {
    async fn get_archival_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<ArchivalObject, RegistryError> {
        self.before_lookup(RecordedLookup::ArchivalObject { repo_id, local_id })
            .await?;

        self.archival_objects
            .read()
            .await
            .get(&(repo_id, local_id))
            .cloned()
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "/repositories/{}/archival_objects/{}",
                    repo_id, local_id
                ))
            })
    }

    async fn get_digital_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<DigitalObject, RegistryError> {
        self.before_lookup(RecordedLookup::DigitalObject { repo_id, local_id })
            .await?;

        self.digital_objects
            .read()
            .await
            .get(&(repo_id, local_id))
            .cloned()
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "/repositories/{}/digital_objects/{}",
                    repo_id, local_id
                ))
            })
    }
}
