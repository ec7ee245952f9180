//! Reconciliation engine implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::registry::{ArchivalObject, Instance, RegistryClient, RegistryError};
use crate::workorder::{WorkOrder, WorkOrderRow};

use super::config::ReconcileConfig;
use super::links::LinkBuilder;
use super::types::{ReconcileStatus, ReconciliationRecord};

/// Walks a work order against the registry and classifies every row.
pub struct ReconciliationEngine<R: RegistryClient> {
    registry: Arc<R>,
    config: ReconcileConfig,
    links: LinkBuilder,
}

impl<R: RegistryClient> ReconciliationEngine<R> {
    /// Creates a new engine.
    pub fn new(registry: Arc<R>, config: ReconcileConfig, links: LinkBuilder) -> Self {
        Self {
            registry,
            config,
            links,
        }
    }

    /// Reconciles every row of `work_order`.
    ///
    /// Rows are processed by up to `config.workers` concurrent units. The
    /// returned records are ordered by row and instance position, so the
    /// output is identical for any worker count.
    pub async fn reconcile(
        &self,
        work_order: &WorkOrder,
        resource_id: &str,
    ) -> Vec<ReconciliationRecord> {
        let workers = self.config.workers.max(1);
        info!(
            rows = work_order.len(),
            workers,
            resource_id = %resource_id,
            "Starting reconciliation"
        );

        let per_row: Vec<Vec<ReconciliationRecord>> =
            stream::iter(work_order.rows().iter().enumerate())
                .map(|(row_index, row)| self.reconcile_row(row_index, row, resource_id))
                .buffer_unordered(workers)
                .collect()
                .await;

        let mut records: Vec<ReconciliationRecord> = per_row.into_iter().flatten().collect();
        records.sort_by_key(|r| (r.row_index, r.instance_index));
        records
    }

    /// Reconciles a single row. Always yields at least one record.
    async fn reconcile_row(
        &self,
        row_index: usize,
        row: &WorkOrderRow,
        resource_id: &str,
    ) -> Vec<ReconciliationRecord> {
        info!(uri = %row.uri, "Checking");

        let (repo_id, ao_id) = match self.registry.split_uri(&row.uri) {
            Ok(ids) => ids,
            Err(e) => {
                return vec![emit(ReconciliationRecord::row_failure(
                    row_index,
                    &row.uri,
                    ReconcileStatus::UriSplitError,
                    e.to_string(),
                ))];
            }
        };

        let archival_object = match self
            .call(self.registry.get_archival_object(repo_id, ao_id))
            .await
        {
            Ok(ao) => ao,
            Err(e) => {
                return vec![emit(ReconciliationRecord::row_failure(
                    row_index,
                    &row.uri,
                    ReconcileStatus::AoNotFound,
                    e.to_string(),
                ))];
            }
        };

        if archival_object.instances.is_empty() {
            return vec![emit(no_instances(
                row_index,
                &archival_object,
                "archival object has no instances",
            ))];
        }

        let mut records = Vec::new();
        for (instance_index, instance) in archival_object.digital_object_instances() {
            let record = self
                .reconcile_instance(
                    row,
                    &archival_object,
                    repo_id,
                    instance,
                    resource_id,
                    RecordPosition {
                        row_index,
                        instance_index: instance_index + 1,
                    },
                )
                .await;
            records.push(emit(record));
        }

        if records.is_empty() {
            records.push(emit(no_instances(
                row_index,
                &archival_object,
                "no digital object instances",
            )));
        }
        records
    }

    async fn reconcile_instance(
        &self,
        row: &WorkOrderRow,
        archival_object: &ArchivalObject,
        repo_id: u32,
        instance: &Instance,
        resource_id: &str,
        position: RecordPosition,
    ) -> ReconciliationRecord {
        let do_ref = instance.digital_object_ref();
        let failure = |status: ReconcileStatus, detail: String| ReconciliationRecord {
            row_index: position.row_index,
            instance_index: position.instance_index,
            archival_object_uri: row.uri.clone(),
            title: archival_object.title.clone(),
            digital_object_uri: do_ref.to_string(),
            digital_object_id: String::new(),
            status,
            detail,
        };

        // The digital object is looked up in the archival object's repository.
        let do_id = match self.registry.split_uri(do_ref) {
            Ok((_, do_id)) => do_id,
            Err(e) => return failure(ReconcileStatus::UriSplitError, e.to_string()),
        };

        let digital_object = match self
            .call(self.registry.get_digital_object(repo_id, do_id))
            .await
        {
            Ok(digital_object) => digital_object,
            Err(e) => {
                return failure(
                    ReconcileStatus::LookupError,
                    format!("not able to request {}: {}", do_ref, e),
                )
            }
        };

        if digital_object.digital_object_id != row.component_id {
            return ReconciliationRecord {
                row_index: position.row_index,
                instance_index: position.instance_index,
                archival_object_uri: row.uri.clone(),
                title: digital_object.title.clone(),
                digital_object_uri: digital_object.uri.clone(),
                digital_object_id: digital_object.digital_object_id.clone(),
                status: ReconcileStatus::IdMismatch,
                detail: format!(
                    "expected {}, found {}",
                    row.component_id, digital_object.digital_object_id
                ),
            };
        }

        let ao_uri = non_empty(&archival_object.uri, &row.uri);
        let do_uri = non_empty(&digital_object.uri, do_ref);
        ReconciliationRecord {
            row_index: position.row_index,
            instance_index: position.instance_index,
            archival_object_uri: self.links.archival_object(resource_id, ao_uri),
            title: digital_object.title,
            digital_object_uri: self.links.digital_object(do_uri),
            digital_object_id: digital_object.digital_object_id,
            status: ReconcileStatus::Ok,
            detail: String::new(),
        }
    }

    /// Runs one registry call under the configured timeout.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, RegistryError>>,
    ) -> Result<T, RegistryError> {
        let limit: Duration = self.config.call_timeout();
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout(limit.as_secs())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RecordPosition {
    row_index: usize,
    instance_index: usize,
}

fn no_instances(row_index: usize, ao: &ArchivalObject, detail: &str) -> ReconciliationRecord {
    ReconciliationRecord {
        row_index,
        instance_index: 0,
        archival_object_uri: ao.uri.clone(),
        title: ao.title.clone(),
        digital_object_uri: String::new(),
        digital_object_id: ao.component_id.clone(),
        status: ReconcileStatus::NoInstances,
        detail: detail.to_string(),
    }
}

fn non_empty<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

/// Logs a finished record as part of the operator trace.
fn emit(record: ReconciliationRecord) -> ReconciliationRecord {
    if record.status.is_ok() {
        info!(
            row = record.row_index,
            ao_uri = %record.archival_object_uri,
            do_id = %record.digital_object_id,
            "OK"
        );
    } else {
        warn!(
            row = record.row_index,
            ao_uri = %record.archival_object_uri,
            do_uri = %record.digital_object_uri,
            status = %record.status,
            detail = %record.detail,
            "Reconciliation problem"
        );
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockRegistry};

    fn engine(registry: MockRegistry) -> ReconciliationEngine<MockRegistry> {
        ReconciliationEngine::new(
            Arc::new(registry),
            ReconcileConfig::default(),
            LinkBuilder::default(),
        )
    }

    #[tokio::test]
    async fn test_ok_record_carries_deep_links() {
        let registry = MockRegistry::new();
        registry
            .add_archival_object(fixtures::archival_object(2, 100, "Letters", &[55]))
            .await;
        registry
            .add_digital_object(fixtures::digital_object(2, 55, "ABC123"))
            .await;

        let wo = fixtures::work_order(&[("/repositories/2/archival_objects/100", "ABC123")]);
        let records = engine(registry).reconcile(&wo, "1234").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ReconcileStatus::Ok);
        assert_eq!(
            records[0].archival_object_uri,
            "https://archivesspace.library.nyu.edu/resources/1234#tree::archival_object_100"
        );
        assert_eq!(
            records[0].digital_object_uri,
            "https://archivesspace.library.nyu.edu/digital_objects/55#tree::digital_object_55"
        );
        assert_eq!(records[0].message(), "OK");
    }

    #[tokio::test]
    async fn test_split_error_skips_lookup() {
        let registry = MockRegistry::new();
        let wo = fixtures::work_order(&[("not-a-uri", "ABC123")]);
        let records = engine(registry.clone()).reconcile(&wo, "1").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ReconcileStatus::UriSplitError);
        assert_eq!(records[0].archival_object_uri, "not-a-uri");
        assert!(registry.recorded_lookups().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_digital_instances_yield_no_instances() {
        let registry = MockRegistry::new();
        let mut ao = fixtures::archival_object(2, 100, "Box 1", &[]);
        ao.instances.push(Instance {
            instance_type: "mixed_materials".to_string(),
            digital_object: None,
        });
        registry.add_archival_object(ao).await;

        let wo = fixtures::work_order(&[("/repositories/2/archival_objects/100", "ABC123")]);
        let records = engine(registry).reconcile(&wo, "1").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ReconcileStatus::NoInstances);
        assert_eq!(records[0].detail, "no digital object instances");
    }

    #[tokio::test]
    async fn test_bad_instance_ref_does_not_skip_other_instances() {
        let registry = MockRegistry::new();
        let mut ao = fixtures::archival_object(2, 100, "Letters", &[]);
        ao.instances.push(fixtures::digital_object_instance("garbage"));
        ao.instances
            .push(fixtures::digital_object_instance("/repositories/2/digital_objects/56"));
        registry.add_archival_object(ao).await;
        registry
            .add_digital_object(fixtures::digital_object(2, 56, "ABC123"))
            .await;

        let wo = fixtures::work_order(&[("/repositories/2/archival_objects/100", "ABC123")]);
        let records = engine(registry).reconcile(&wo, "1").await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, ReconcileStatus::UriSplitError);
        assert_eq!(records[0].digital_object_uri, "garbage");
        assert_eq!(records[1].status, ReconcileStatus::Ok);
    }

    #[tokio::test]
    async fn test_missing_digital_object_is_lookup_error() {
        let registry = MockRegistry::new();
        registry
            .add_archival_object(fixtures::archival_object(2, 100, "Letters", &[57]))
            .await;

        let wo = fixtures::work_order(&[("/repositories/2/archival_objects/100", "ABC123")]);
        let records = engine(registry).reconcile(&wo, "1").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ReconcileStatus::LookupError);
        assert!(records[0].detail.contains("/repositories/2/digital_objects/57"));
    }

    #[tokio::test]
    async fn test_slow_registry_call_times_out() {
        let registry = MockRegistry::new();
        registry
            .add_archival_object(fixtures::archival_object(2, 100, "Letters", &[55]))
            .await;
        registry.set_delay(Duration::from_secs(5)).await;

        let engine = ReconciliationEngine::new(
            Arc::new(registry),
            ReconcileConfig::default().with_call_timeout(0),
            LinkBuilder::default(),
        );
        let wo = fixtures::work_order(&[("/repositories/2/archival_objects/100", "ABC123")]);
        let records = engine.reconcile(&wo, "1").await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ReconcileStatus::AoNotFound);
        assert!(records[0].detail.contains("timed out"));
    }
}
