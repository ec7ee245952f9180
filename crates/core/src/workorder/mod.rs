//! Work order and transfer info models.
//!
//! A batch is driven by two files in the source package's `metadata`
//! directory: the work order (`<partner>_<resource>_aspace_wo.tsv`), listing
//! the archival objects digitized in this batch, and `transfer-info.txt`,
//! carrying batch-level metadata such as the registry resource id.

mod locate;
mod transfer_info;
mod types;

pub use locate::{
    find_work_order, load_batch, BatchCodes, BatchMetadata, METADATA_DIR, TRANSFER_INFO_FILE,
    WORK_ORDER_SUFFIX,
};
pub use transfer_info::{TransferInfo, RESOURCE_ID_KEY};
pub use types::{WorkOrder, WorkOrderRow, WORK_ORDER_COLUMNS};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating or parsing batch metadata.
///
/// All of these are fatal to a run: nothing can be reconciled or staged
/// without a valid work order.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input contained no header row.
    #[error("{0} is empty")]
    Empty(&'static str),

    /// Header row lacks a required column.
    #[error("Work order header is missing column '{0}'")]
    MissingColumn(&'static str),

    /// A data row is shorter than the header.
    #[error("Work order line {line}: expected {expected} columns, found {found}")]
    ShortRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A data row has no URI.
    #[error("Work order line {line}: URI is empty")]
    EmptyUri { line: usize },

    /// A quoted field was not terminated.
    #[error("Line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    /// Transfer info is not valid YAML.
    #[error("Transfer info is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Transfer info is YAML but not a flat `key: value` mapping.
    #[error("Transfer info is not a flat mapping: {0}")]
    NotFlat(String),

    /// Transfer info has no resource id.
    #[error("Transfer info is missing '{0}'")]
    MissingField(&'static str),

    /// The metadata directory holds no work order, or more than one.
    #[error("Expected exactly one work order in {dir}, found {found}")]
    WorkOrderNotFound { dir: PathBuf, found: usize },

    /// The work order file name does not carry partner and resource codes.
    #[error("Cannot derive partner and resource codes from '{0}'")]
    BadWorkOrderName(String),

    /// Input is not valid UTF-8.
    #[error("{0} is not valid UTF-8")]
    InvalidEncoding(&'static str),

    /// Reading the file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
