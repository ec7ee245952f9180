//! Stager module for building transfer packages.
//!
//! A work order row names a component; its digitized files live in
//! `<source>/<component_id>/`. Staging turns that directory into a BagIt
//! package at `<staging>/<component_id>/` ready for the preservation
//! pipeline to pick up.
//!
//! # Features
//!
//! - Payload copied into `data/` with checksums computed while copying
//! - `bagit.txt`, `manifest-<alg>.txt`, `bag-info.txt` and
//!   `tagmanifest-<alg>.txt` written alongside
//! - Batch transfer info copied into every `bag-info.txt`
//! - Partial packages removed when staging fails
//! - Errors classified as I/O, validation or resource exhaustion
//!
//! # Example
//!
//! ```ignore
//! use adoc_core::stager::{BagStager, Stager, StagerConfig};
//!
//! let stager = BagStager::new(StagerConfig::default());
//! let package = stager.stage(&job).await?;
//! println!("{}", package.summary());
//! ```

mod bag_stager;
mod config;
mod error;
mod traits;
mod types;

pub use bag_stager::{BagStager, BAGIT_VERSION};
pub use config::{ChecksumAlgorithm, StagerConfig};
pub use error::{StagingError, StagingErrorKind};
pub use traits::Stager;
pub use types::{StagedPackage, StagingJob};
