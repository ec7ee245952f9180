//! Archival description registry adapter.
//!
//! The reconciliation engine only needs three things from the registry:
//! splitting an object URI into its repository and local ids, and fetching
//! archival and digital object records by those ids. [`RegistryClient`]
//! captures exactly that; [`ArchivesSpaceClient`] implements it over the
//! ArchivesSpace backend API.

mod aspace;
mod types;

pub use aspace::{ArchivesSpaceClient, RegistryConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Object not found (404).
    #[error("Object not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to decode a response body.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Login was rejected or no session could be obtained.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// URI does not have the `/repositories/<repo>/<kind>/<id>` shape.
    #[error("Not able to split URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// The call did not complete within the configured timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl RegistryError {
    fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}

/// Split a registry object URI into `(repository_id, local_id)`.
///
/// Accepts `/repositories/2/archival_objects/100` and the same shape for
/// any object kind. Leading and trailing slashes are tolerated.
pub fn split_uri(uri: &str) -> Result<(u32, u32), RegistryError> {
    let segments: Vec<&str> = uri.trim().trim_matches('/').split('/').collect();

    if segments.len() != 4 {
        return Err(RegistryError::invalid_uri(
            uri,
            format!("expected 4 path segments, found {}", segments.len()),
        ));
    }
    if segments[0] != "repositories" {
        return Err(RegistryError::invalid_uri(
            uri,
            "path does not start with 'repositories'",
        ));
    }
    if segments[2].is_empty() {
        return Err(RegistryError::invalid_uri(uri, "missing object type"));
    }

    let repo_id = parse_id(uri, segments[1])?;
    let local_id = parse_id(uri, segments[3])?;
    Ok((repo_id, local_id))
}

fn parse_id(uri: &str, segment: &str) -> Result<u32, RegistryError> {
    match segment.parse::<u32>() {
        Ok(0) | Err(_) => Err(RegistryError::invalid_uri(
            uri,
            format!("'{}' is not a positive integer id", segment),
        )),
        Ok(id) => Ok(id),
    }
}

/// Returns the trailing path segment of a registry URI.
pub fn trailing_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// Trait for registry clients.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Split an object URI into `(repository_id, local_id)`.
    fn split_uri(&self, uri: &str) -> Result<(u32, u32), RegistryError> {
        split_uri(uri)
    }

    /// Fetch an archival object record.
    async fn get_archival_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<ArchivalObject, RegistryError>;

    /// Fetch a digital object record.
    async fn get_digital_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<DigitalObject, RegistryError>;
}
