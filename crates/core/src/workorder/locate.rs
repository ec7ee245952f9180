//! Locating batch metadata inside a source package.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{ParseError, TransferInfo, WorkOrder};

/// Directory under the source package holding batch metadata.
pub const METADATA_DIR: &str = "metadata";

/// File name suffix identifying a work order export.
pub const WORK_ORDER_SUFFIX: &str = "_aspace_wo.tsv";

/// Transfer info file name.
pub const TRANSFER_INFO_FILE: &str = "transfer-info.txt";

/// Partner and resource codes taken from the work order file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCodes {
    pub partner: String,
    pub resource: String,
}

impl BatchCodes {
    /// Derives codes from `<partner>_<resource>_aspace_wo.tsv`.
    pub fn from_work_order_name(name: &str) -> Result<Self, ParseError> {
        let stem = name
            .strip_suffix(WORK_ORDER_SUFFIX)
            .ok_or_else(|| ParseError::BadWorkOrderName(name.to_string()))?;
        match stem.split_once('_') {
            Some((partner, resource)) if !partner.is_empty() && !resource.is_empty() => {
                Ok(Self {
                    partner: partner.to_string(),
                    resource: resource.to_string(),
                })
            }
            _ => Err(ParseError::BadWorkOrderName(name.to_string())),
        }
    }

    /// `<partner>_<resource>`, the prefix used for report and log names.
    pub fn prefix(&self) -> String {
        format!("{}_{}", self.partner, self.resource)
    }
}

/// Everything loaded from a source package's metadata directory.
#[derive(Debug, Clone)]
pub struct BatchMetadata {
    pub work_order_path: PathBuf,
    pub codes: BatchCodes,
    pub work_order: WorkOrder,
    pub transfer_info: TransferInfo,
}

/// Finds the single work order file in a metadata directory.
pub async fn find_work_order(metadata_dir: &Path) -> Result<PathBuf, ParseError> {
    let io_err = |source: std::io::Error| ParseError::Io {
        path: metadata_dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(metadata_dir).await.map_err(io_err)?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(WORK_ORDER_SUFFIX) && entry.file_type().await.map_err(io_err)?.is_file()
        {
            candidates.push(entry.path());
        }
    }

    if candidates.len() != 1 {
        return Err(ParseError::WorkOrderNotFound {
            dir: metadata_dir.to_path_buf(),
            found: candidates.len(),
        });
    }
    Ok(candidates.remove(0))
}

async fn read(path: &Path) -> Result<Vec<u8>, ParseError> {
    tokio::fs::read(path).await.map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the work order and transfer info of a source package.
pub async fn load_batch(source: &Path) -> Result<BatchMetadata, ParseError> {
    let metadata_dir = source.join(METADATA_DIR);

    debug!(dir = %metadata_dir.display(), "Looking for work order");
    let work_order_path = find_work_order(&metadata_dir).await?;
    let file_name = work_order_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let codes = BatchCodes::from_work_order_name(&file_name)?;

    let work_order = WorkOrder::parse(&read(&work_order_path).await?)?;
    let transfer_info = TransferInfo::parse(&read(&metadata_dir.join(TRANSFER_INFO_FILE)).await?)?;

    info!(
        work_order = %work_order_path.display(),
        partner = %codes.partner,
        resource = %codes.resource,
        rows = work_order.len(),
        resource_id = %transfer_info.resource_id(),
        "Loaded batch metadata"
    );

    Ok(BatchMetadata {
        work_order_path,
        codes,
        work_order,
        transfer_info,
    })
}
