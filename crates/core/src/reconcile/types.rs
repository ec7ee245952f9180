//! Reconciliation records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reconciliation report header.
pub const RECONCILE_REPORT_HEADER: [&str; 5] = ["ao_uri", "title", "do_uri", "do_id", "msg"];

/// Terminal outcome of one reconciled row or digital object instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileStatus {
    /// Digital object id matches the work order component id.
    Ok,
    /// Archival object lookup failed.
    AoNotFound,
    /// Archival object has no digital object instances.
    NoInstances,
    /// An archival or digital object URI could not be split.
    UriSplitError,
    /// Digital object lookup failed.
    LookupError,
    /// Digital object id differs from the component id.
    IdMismatch,
}

impl ReconcileStatus {
    /// Report code for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::AoNotFound => "AO_NOT_FOUND",
            Self::NoInstances => "NO_INSTANCES",
            Self::UriSplitError => "URI_SPLIT_ERROR",
            Self::LookupError => "LOOKUP_ERROR",
            Self::IdMismatch => "ID_MISMATCH",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// Position of the originating row in the work order.
    pub row_index: usize,
    /// Position of the digital object instance within the archival object,
    /// or 0 for row-level outcomes.
    pub instance_index: usize,
    pub archival_object_uri: String,
    pub title: String,
    pub digital_object_uri: String,
    pub digital_object_id: String,
    pub status: ReconcileStatus,
    /// Human readable explanation, empty for `OK`.
    pub detail: String,
}

impl ReconciliationRecord {
    /// Row-level record with only the archival object URI known.
    pub(crate) fn row_failure(
        row_index: usize,
        uri: &str,
        status: ReconcileStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            row_index,
            instance_index: 0,
            archival_object_uri: uri.to_string(),
            title: String::new(),
            digital_object_uri: String::new(),
            digital_object_id: String::new(),
            status,
            detail: detail.into(),
        }
    }

    /// The `msg` column: the status code, followed by the detail when present.
    pub fn message(&self) -> String {
        if self.detail.is_empty() {
            self.status.as_str().to_string()
        } else {
            format!("{}: {}", self.status, self.detail)
        }
    }

    /// Report columns in header order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.archival_object_uri.clone(),
            self.title.clone(),
            self.digital_object_uri.clone(),
            self.digital_object_id.clone(),
            self.message(),
        ]
    }
}

/// Outcome counts of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Distinct work order rows with at least one record.
    pub rows: usize,
    pub records: usize,
    pub by_status: BTreeMap<ReconcileStatus, usize>,
}

impl ReconcileSummary {
    pub fn from_records(records: &[ReconciliationRecord]) -> Self {
        let mut by_status = BTreeMap::new();
        let mut rows = BTreeSet::new();
        for record in records {
            *by_status.entry(record.status).or_insert(0) += 1;
            rows.insert(record.row_index);
        }
        Self {
            rows: rows.len(),
            records: records.len(),
            by_status,
        }
    }

    pub fn count(&self, status: ReconcileStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Whether every record is `OK`.
    pub fn all_ok(&self) -> bool {
        self.count(ReconcileStatus::Ok) == self.records
    }
}
