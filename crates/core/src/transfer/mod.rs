//! Hands staged packages to an external transfer program.
//!
//! [`TransferRunner`] picks the package directories under a staging
//! location whose names match a pattern and runs the configured program
//! (`rsync -rav` by default) once per package.

mod config;
mod runner;

pub use config::TransferConfig;
pub use runner::{TransferError, TransferOutcome, TransferRunner, TRANSFER_LOG_DIR};
