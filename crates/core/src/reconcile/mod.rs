//! Reconciliation of a work order against the registry.
//!
//! For every work order row the engine walks
//! archival object → instances → digital object, checks that the digital
//! object's id matches the row's component id, and emits one
//! [`ReconciliationRecord`] per outcome. Failures are recorded, never raised:
//! a run always accounts for every row.

mod config;
mod engine;
mod links;
mod types;

pub use config::ReconcileConfig;
pub use engine::ReconciliationEngine;
pub use links::{LinkBuilder, DEFAULT_PUBLIC_URL};
pub use types::{ReconcileStatus, ReconcileSummary, ReconciliationRecord, RECONCILE_REPORT_HEADER};
