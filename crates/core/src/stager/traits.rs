//! Trait definitions for the stager module.

use async_trait::async_trait;
use std::path::Path;

use super::error::StagingError;
use super::types::{StagedPackage, StagingJob};

/// Builds a transfer package for one work order row.
#[async_trait]
pub trait Stager: Send + Sync {
    /// Returns the name of this stager implementation.
    fn name(&self) -> &str;

    /// Stages the package described by `job`.
    async fn stage(&self, job: &StagingJob) -> Result<StagedPackage, StagingError>;

    /// Checks that `staging_root` exists and is a writable directory.
    async fn validate(&self, staging_root: &Path) -> Result<(), StagingError>;
}
