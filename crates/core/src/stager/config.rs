//! Configuration for the stager module.

use serde::{Deserialize, Serialize};

/// Checksum algorithm used for bag manifests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Md5,
}

impl ChecksumAlgorithm {
    /// Name used in manifest file names (`manifest-<name>.txt`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

/// Configuration for the bag stager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagerConfig {
    /// Manifest checksum algorithm.
    #[serde(default)]
    pub checksum: ChecksumAlgorithm,

    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    1024 * 1024 // 1 MB
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            checksum: ChecksumAlgorithm::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl StagerConfig {
    /// Sets the checksum algorithm.
    pub fn with_checksum(mut self, checksum: ChecksumAlgorithm) -> Self {
        self.checksum = checksum;
        self
    }
}
