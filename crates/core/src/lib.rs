pub mod config;
pub mod processor;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod stager;
pub mod testing;
pub mod transfer;
pub mod workorder;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError, ReportConfig,
    SanitizedConfig, StagingConfig,
};
pub use processor::{
    PipelineProgress, PipelineSummary, ProcessorConfig, ProcessorError, RowProcessor,
    StagingParams, StagingResult,
};
pub use reconcile::{
    LinkBuilder, ReconcileConfig, ReconcileStatus, ReconcileSummary, ReconciliationEngine,
    ReconciliationRecord,
};
pub use registry::{ArchivesSpaceClient, RegistryClient, RegistryConfig, RegistryError};
pub use report::{reconciliation_report, staging_report, ReportError, TsvReport};
pub use stager::{BagStager, Stager, StagerConfig, StagingError, StagingErrorKind};
pub use transfer::{
    TransferConfig, TransferError, TransferOutcome, TransferRunner, TRANSFER_LOG_DIR,
};
pub use workorder::{load_batch, BatchCodes, BatchMetadata, ParseError, TransferInfo, WorkOrder};
