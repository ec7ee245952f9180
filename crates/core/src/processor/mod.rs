//! Processor module for staging a whole work order.
//!
//! [`RowProcessor`] runs a fixed pool of workers over the rows of a work
//! order. Each worker stages one row at a time through a [`Stager`] and
//! records a [`StagingResult`]; the results are merged and returned in
//! row order once every worker has finished.
//!
//! [`Stager`]: crate::stager::Stager
//!
//! # Example
//!
//! ```ignore
//! use adoc_core::processor::{ProcessorConfig, RowProcessor, StagingParams};
//! use adoc_core::stager::{BagStager, StagerConfig};
//!
//! let stager = BagStager::new(StagerConfig::default());
//! let processor = RowProcessor::new(ProcessorConfig::default(), stager)
//!     .with_cancellation(token.clone());
//!
//! let results = processor.process(params).await?;
//! for result in &results {
//!     println!("{}\t{}", result.component_id, result.result);
//! }
//! ```

mod config;
mod pipeline;
mod types;

pub use config::ProcessorConfig;
pub use pipeline::{ProcessorError, RowProcessor};
pub use types::{
    PipelineProgress, PipelineSummary, PoolStatus, StagingParams, StagingResult,
    STAGING_REPORT_HEADER,
};
