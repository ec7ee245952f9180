//! Runs the transfer program over staged packages.

use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::TransferConfig;

/// Directory under the report directory holding per-package program output.
pub const TRANSFER_LOG_DIR: &str = "transfer";

/// Errors that stop a transfer run before any package is sent.
#[derive(Debug, Error)]
pub enum TransferError {
    /// No pattern was given.
    #[error("regexp cannot be empty")]
    EmptyPattern,

    /// Pattern does not compile.
    #[error("Invalid regexp '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Staging location is missing or not a directory.
    #[error("{path} is not a location")]
    NotADirectory { path: PathBuf },

    /// Staging location could not be listed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of transferring one package.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Package directory name.
    pub bag: String,
    pub path: PathBuf,
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr of the program.
    pub output: String,
    /// Why the transfer failed; `None` on success.
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TransferOutcome {
    /// Writes the program output to `<dir>/<bag>-transfer.txt`.
    pub async fn write_log(&self, dir: &Path) -> Result<PathBuf, TransferError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| TransferError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let path = dir.join(format!("{}-transfer.txt", self.bag));
        tokio::fs::write(&path, self.output.as_bytes())
            .await
            .map_err(|source| TransferError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Sends staged packages to their destination one at a time.
pub struct TransferRunner {
    config: TransferConfig,
}

impl TransferRunner {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Lists package directories directly under `staging_location` whose
    /// names match `pattern`, sorted by name.
    pub async fn matching_packages(
        &self,
        staging_location: &Path,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, TransferError> {
        if pattern.is_empty() {
            return Err(TransferError::EmptyPattern);
        }
        let regex = Regex::new(pattern).map_err(|e| TransferError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        match tokio::fs::metadata(staging_location).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(TransferError::NotADirectory {
                    path: staging_location.to_path_buf(),
                })
            }
        }

        let io_err = |source: std::io::Error| TransferError::Io {
            path: staging_location.to_path_buf(),
            source,
        };
        let mut entries = tokio::fs::read_dir(staging_location)
            .await
            .map_err(io_err)?;

        let mut packages = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let is_dir = entry.file_type().await.map_err(io_err)?.is_dir();
            let name = entry.file_name();
            if is_dir && regex.is_match(&name.to_string_lossy()) {
                packages.push(entry.path());
            }
        }
        packages.sort();
        Ok(packages)
    }

    /// Transfers every matching package in name order.
    ///
    /// A failed package is recorded in its outcome and the run continues.
    pub async fn run(
        &self,
        staging_location: &Path,
        pattern: &str,
    ) -> Result<Vec<TransferOutcome>, TransferError> {
        let packages = self.matching_packages(staging_location, pattern).await?;
        info!(
            count = packages.len(),
            program = %self.config.program,
            "Starting transfer"
        );

        let mut outcomes = Vec::with_capacity(packages.len());
        for path in packages {
            outcomes.push(self.transfer(path).await);
        }
        Ok(outcomes)
    }

    fn command_for(&self, package: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args).arg(package);
        if let Some(ref destination) = self.config.destination {
            cmd.arg(destination);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn transfer(&self, path: PathBuf) -> TransferOutcome {
        let bag = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(bag = %bag, "Transferring");
        debug!(args = ?self.config.args, destination = ?self.config.destination, "Transfer command");

        let started = Instant::now();
        let result = self.command_for(&path).output().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                for line in combined.lines() {
                    debug!(bag = %bag, "{}", line);
                }
                let success = output.status.success();
                let error = if success {
                    None
                } else {
                    warn!(bag = %bag, code = ?output.status.code(), "Transfer failed");
                    Some(format!(
                        "{} exited with code: {:?}",
                        self.config.program,
                        output.status.code()
                    ))
                };
                TransferOutcome {
                    bag,
                    path,
                    success,
                    exit_code: output.status.code(),
                    output: combined,
                    error,
                    duration_ms,
                }
            }
            Err(e) => {
                warn!(bag = %bag, error = %e, "Could not start transfer program");
                TransferOutcome {
                    bag,
                    path,
                    success: false,
                    exit_code: None,
                    output: String::new(),
                    error: Some(format!("failed to run {}: {}", self.config.program, e)),
                    duration_ms,
                }
            }
        }
    }
}
