//! Testing utilities and mock implementations.
//!
//! Mocks for the registry and stager traits let the reconciliation engine
//! and the row processor run without a live registry or real packages.
//!
//! # Example
//!
//! ```rust,ignore
//! use adoc_core::testing::{fixtures, MockRegistry, MockStager};
//!
//! let registry = MockRegistry::new();
//! registry.add_archival_object(fixtures::archival_object(2, 100, "Letters", &[55])).await;
//!
//! let stager = MockStager::new();
//! stager.fail_component("cuid002").await;
//! ```

mod mock_registry;
mod mock_stager;

pub use mock_registry::{MockRegistry, RecordedLookup};
pub use mock_stager::MockStager;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::registry::{
        ArchivalObject, DigitalObject, Instance, ObjectRef, DIGITAL_OBJECT_INSTANCE,
    };
    use crate::workorder::{TransferInfo, WorkOrder, WorkOrderRow, RESOURCE_ID_KEY};

    /// Create an archival object linked to the given digital objects.
    pub fn archival_object(repo_id: u32, id: u32, title: &str, do_ids: &[u32]) -> ArchivalObject {
        ArchivalObject {
            uri: format!("/repositories/{}/archival_objects/{}", repo_id, id),
            title: title.to_string(),
            component_id: String::new(),
            instances: do_ids
                .iter()
                .map(|d| {
                    digital_object_instance(&format!(
                        "/repositories/{}/digital_objects/{}",
                        repo_id, d
                    ))
                })
                .collect(),
        }
    }

    /// Create a digital object record.
    pub fn digital_object(repo_id: u32, id: u32, digital_object_id: &str) -> DigitalObject {
        DigitalObject {
            uri: format!("/repositories/{}/digital_objects/{}", repo_id, id),
            title: format!("Digital object {}", id),
            digital_object_id: digital_object_id.to_string(),
        }
    }

    /// Create a digital object instance pointing at `reference`.
    pub fn digital_object_instance(reference: &str) -> Instance {
        Instance {
            instance_type: DIGITAL_OBJECT_INSTANCE.to_string(),
            digital_object: Some(ObjectRef {
                reference: reference.to_string(),
            }),
        }
    }

    /// Create a work order from `(uri, component_id)` pairs.
    pub fn work_order<U: AsRef<str>, C: AsRef<str>>(rows: &[(U, C)]) -> WorkOrder {
        WorkOrder::from_rows(
            rows.iter()
                .enumerate()
                .map(|(i, (uri, component_id))| WorkOrderRow {
                    resource_id: "MSS.123".to_string(),
                    ref_id: format!("ref{:03}", i + 1),
                    uri: uri.as_ref().to_string(),
                    container_indicator_1: "1".to_string(),
                    container_indicator_2: (i + 1).to_string(),
                    container_indicator_3: String::new(),
                    title: format!("Folder {}", i + 1),
                    component_id: component_id.as_ref().to_string(),
                })
                .collect(),
        )
    }

    /// Create batch transfer info for `resource_id`.
    pub fn transfer_info(resource_id: &str) -> TransferInfo {
        TransferInfo::from_fields([
            (RESOURCE_ID_KEY, resource_id),
            ("nyu-dl-project-name", "fales/mss123"),
        ])
    }
}
