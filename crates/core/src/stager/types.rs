//! Types for the stager module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::workorder::TransferInfo;

use super::config::ChecksumAlgorithm;

/// One package to stage.
#[derive(Debug, Clone)]
pub struct StagingJob {
    /// Position of the row in the work order.
    pub row_index: usize,
    /// Component id; also the package directory name.
    pub component_id: String,
    /// Archival object the package belongs to.
    pub archival_object_uri: String,
    /// Directory containing one sub-directory per component.
    pub source_root: PathBuf,
    /// Directory packages are staged into.
    pub staging_root: PathBuf,
    pub partner_code: String,
    pub resource_code: String,
    /// Batch metadata copied into the package.
    pub transfer_info: Arc<TransferInfo>,
}

impl StagingJob {
    /// `<source_root>/<component_id>`.
    pub fn source_dir(&self) -> PathBuf {
        self.source_root.join(&self.component_id)
    }

    /// `<staging_root>/<component_id>`.
    pub fn target_dir(&self) -> PathBuf {
        self.staging_root.join(&self.component_id)
    }
}

/// A successfully staged package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagedPackage {
    pub component_id: String,
    /// Package root in the staging location.
    pub path: PathBuf,
    /// Number of payload files.
    pub files: usize,
    /// Total payload bytes.
    pub total_bytes: u64,
    pub checksum: ChecksumAlgorithm,
    pub duration_ms: u64,
}

impl StagedPackage {
    /// One-line description used in the staging report.
    pub fn summary(&self) -> String {
        format!(
            "staged {} files ({} bytes) to {}",
            self.files,
            self.total_bytes,
            self.path.display()
        )
    }
}
