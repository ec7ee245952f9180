//! ArchivesSpace backend API client.
//!
//! Authenticates once with a username/password login and sends the session
//! token on every subsequent request. Failed requests are reported as-is;
//! retrying is left to the operator re-running the batch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::reconcile::DEFAULT_PUBLIC_URL;

use super::types::{ArchivalObject, DigitalObject};
use super::{RegistryClient, RegistryError};

/// Header carrying the ArchivesSpace session token.
const SESSION_HEADER: &str = "X-ArchivesSpace-Session";

/// Registry connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Backend API root, e.g. `http://localhost:8089`.
    pub base_url: String,
    /// Public UI host used when building deep links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// API username.
    #[serde(default)]
    pub username: String,
    /// API password.
    #[serde(default)]
    pub password: String,
    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_public_url() -> String {
    DEFAULT_PUBLIC_URL.to_string()
}

fn default_timeout() -> u64 {
    20
}

/// ArchivesSpace API client.
pub struct ArchivesSpaceClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: String,
}

impl ArchivesSpaceClient {
    /// Create a new client. No request is made until the first lookup.
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .user_agent(format!("adoc/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            session: Mutex::new(None),
        })
    }

    /// Log in and cache the session token.
    pub async fn login(&self) -> Result<(), RegistryError> {
        let token = self.request_session().await?;
        *self.session.lock().await = Some(token);
        Ok(())
    }

    async fn request_session(&self) -> Result<String, RegistryError> {
        let url = format!("{}/users/{}/login", self.base_url, self.username);
        debug!(url = %url, "Logging in to ArchivesSpace");

        let response = self
            .client
            .post(&url)
            .query(&[("password", self.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::AuthFailed(format!(
                "login returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let login: LoginResponse = response.json().await.map_err(|e| {
            RegistryError::ParseError(format!("Failed to parse login response: {}", e))
        })?;

        info!(username = %self.username, "ArchivesSpace session established");
        Ok(login.session)
    }

    async fn session_token(&self) -> Result<String, RegistryError> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.as_ref() {
            return Ok(token.clone());
        }
        let token = self.request_session().await?;
        *session = Some(token.clone());
        Ok(token)
    }

    fn object_url(&self, repo_id: u32, kind: &str, local_id: u32) -> String {
        format!(
            "{}/repositories/{}/{}/{}",
            self.base_url, repo_id, kind, local_id
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RegistryError> {
        let token = self.session_token().await?;
        debug!(url = %url, "ArchivesSpace GET");

        let response = self
            .client
            .get(url)
            .header(SESSION_HEADER, token)
            .send()
            .await?;

        let response = check_status(response, url).await?;
        response
            .json()
            .await
            .map_err(|e| RegistryError::ParseError(format!("{}: {}", url, e)))
    }
}

async fn check_status(response: Response, url: &str) -> Result<Response, RegistryError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RegistryError::NotFound(url.to_string()));
    }
    if status == StatusCode::FORBIDDEN || status == StatusCode::PRECONDITION_FAILED {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistryError::AuthFailed(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistryError::ApiError {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(response)
}

#[async_trait]
impl RegistryClient for ArchivesSpaceClient {
    async fn get_archival_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<ArchivalObject, RegistryError> {
        let url = self.object_url(repo_id, "archival_objects", local_id);
        self.get_json(&url).await
    }

    async fn get_digital_object(
        &self,
        repo_id: u32,
        local_id: u32,
    ) -> Result<DigitalObject, RegistryError> {
        let url = self.object_url(repo_id, "digital_objects", local_id);
        self.get_json(&url).await
    }
}
