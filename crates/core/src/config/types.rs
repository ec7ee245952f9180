use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::processor::ProcessorConfig;
use crate::reconcile::ReconcileConfig;
use crate::registry::RegistryConfig;
use crate::stager::StagerConfig;
use crate::transfer::TransferConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Registry connection (required by `check` only)
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Staging configuration: the worker pool plus the bag builder settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StagingConfig {
    #[serde(flatten)]
    pub processor: ProcessorConfig,
    #[serde(flatten)]
    pub stager: StagerConfig,
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Directory reports and transfer output are written to
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: default_report_dir(),
        }
    }
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<SanitizedRegistryConfig>,
    pub reconcile: ReconcileConfig,
    pub staging: StagingConfig,
    pub transfer: TransferConfig,
    pub report: ReportConfig,
}

/// Sanitized registry config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRegistryConfig {
    pub base_url: String,
    pub public_url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            registry: config.registry.as_ref().map(|r| SanitizedRegistryConfig {
                base_url: r.base_url.clone(),
                public_url: r.public_url.clone(),
                username: r.username.clone(),
                password_configured: !r.password.is_empty(),
                timeout_secs: r.timeout_secs,
            }),
            reconcile: config.reconcile.clone(),
            staging: config.staging.clone(),
            transfer: config.transfer.clone(),
            report: config.report.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stager::ChecksumAlgorithm;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.registry.is_none());
        assert_eq!(config.reconcile.workers, 1);
        assert_eq!(config.staging.processor.workers, 5);
        assert_eq!(config.staging.stager.checksum, ChecksumAlgorithm::Sha256);
        assert_eq!(config.report.dir.to_str().unwrap(), "logs");
    }

    #[test]
    fn test_deserialize_registry_section() {
        let toml = r#"
[registry]
base_url = "http://localhost:8089"
username = "admin"
password = "hunter2"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let registry = config.registry.as_ref().unwrap();
        assert_eq!(registry.base_url, "http://localhost:8089");
        assert_eq!(registry.public_url, "https://archivesspace.library.nyu.edu");
        assert_eq!(registry.timeout_secs, 20); // default
    }

    #[test]
    fn test_deserialize_staging_section() {
        let toml = r#"
[staging]
workers = 8
row_timeout_secs = 600
checksum = "md5"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.staging.processor.workers, 8);
        assert_eq!(config.staging.processor.row_timeout_secs, Some(600));
        assert_eq!(config.staging.stager.checksum, ChecksumAlgorithm::Md5);
    }

    #[test]
    fn test_deserialize_registry_missing_base_url_fails() {
        let toml = r#"
[registry]
username = "admin"
password = "hunter2"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let toml = r#"
[registry]
base_url = "http://localhost:8089"
username = "admin"
password = "hunter2"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        let registry = sanitized.registry.as_ref().unwrap();
        assert!(registry.password_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
