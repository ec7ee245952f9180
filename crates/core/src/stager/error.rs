//! Error types for the stager module.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Broad class of a staging failure, used in reports and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingErrorKind {
    /// Package missing, unreadable or malformed.
    Io,
    /// Component id absent or inconsistent.
    Validation,
    /// Staging location full or unwritable.
    ResourceExhausted,
    /// Row exceeded its time budget.
    Timeout,
    /// Run was cancelled before the row completed.
    Cancelled,
    /// The stager panicked while staging the row.
    Panicked,
}

impl StagingErrorKind {
    /// Label used in the staging report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Validation => "validation",
            Self::ResourceExhausted => "resource-exhausted",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Panicked => "panic",
        }
    }
}

/// Errors that can occur while staging a package.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Component id is empty or not usable as a directory name.
    #[error("Invalid component id '{component_id}': {reason}")]
    InvalidComponentId {
        component_id: String,
        reason: String,
    },

    /// Source package directory does not exist.
    #[error("Source package not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Source package path is not a directory.
    #[error("Source package is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    /// Source package has no files.
    #[error("Source package contains no files: {path}")]
    EmptyPackage { path: PathBuf },

    /// Source package holds an entry that cannot be bagged.
    #[error("Unsupported entry in source package: {path} ({reason})")]
    UnsupportedEntry { path: PathBuf, reason: &'static str },

    /// A package for this component already exists in the staging location.
    #[error("Package already staged: {path}")]
    AlreadyStaged { path: PathBuf },

    /// Failed to copy file.
    #[error("Failed to copy file from {source} to {destination}")]
    CopyFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Staging location ran out of space.
    #[error("Staging location is full: {path}")]
    StorageFull { path: PathBuf },

    /// Staging location is not writable.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Other I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row exceeded its time budget.
    #[error("Staging timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The stager panicked.
    #[error("Stager panicked: {message}")]
    Panicked { message: String },
}

impl StagingError {
    /// Classifies an I/O error against `path`.
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let path = path.to_path_buf();
        match error.kind() {
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => Self::StorageFull { path },
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied { path }
            }
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }

    /// Creates a copy failed error, keeping resource exhaustion distinct.
    pub fn copy_failed(source: &Path, destination: &Path, error: std::io::Error) -> Self {
        match Self::from_io(destination, error) {
            Self::Io { source: error, .. } => Self::CopyFailed {
                source: source.to_path_buf(),
                destination: destination.to_path_buf(),
                error,
            },
            other => other,
        }
    }

    /// The failure class of this error.
    pub fn kind(&self) -> StagingErrorKind {
        match self {
            Self::InvalidComponentId { .. } | Self::AlreadyStaged { .. } => {
                StagingErrorKind::Validation
            }
            Self::StorageFull { .. } | Self::PermissionDenied { .. } => {
                StagingErrorKind::ResourceExhausted
            }
            Self::Timeout { .. } => StagingErrorKind::Timeout,
            Self::Cancelled => StagingErrorKind::Cancelled,
            Self::Panicked { .. } => StagingErrorKind::Panicked,
            Self::SourceNotFound { .. }
            | Self::SourceNotDirectory { .. }
            | Self::EmptyPackage { .. }
            | Self::UnsupportedEntry { .. }
            | Self::CopyFailed { .. }
            | Self::Io { .. } => StagingErrorKind::Io,
        }
    }
}
