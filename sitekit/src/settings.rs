//! Settings file management

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::deploy::environments::{default_environments, Environment};
use crate::errors::SiteKitError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Toolkit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Dev server configuration
    #[serde(default)]
    pub serve: ServeSettings,

    /// Deploy tool configuration
    #[serde(default)]
    pub deploy: DeploySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            serve: ServeSettings::default(),
            deploy: DeploySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub async fn load(file: &File) -> Result<Self, SiteKitError> {
        if file.exists().await {
            file.read_json().await
        } else {
            Ok(Self::default())
        }
    }
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeSettings {
    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory tree to serve
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Push reload notifications to connected pages
    #[serde(default = "default_true")]
    pub hot_reload: bool,

    /// Apply CORS headers to all responses
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Document served when a requested path does not exist
    #[serde(default = "default_fallback")]
    pub fallback: Option<String>,

    /// Path prefixes reserved for an API proxy (answered 501, see routes)
    #[serde(default = "default_proxy_prefixes")]
    pub proxy_prefixes: Vec<String>,

    /// Interval between filesystem scans, in milliseconds
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_root() -> PathBuf {
    PathBuf::from("src")
}

fn default_true() -> bool {
    true
}

fn default_fallback() -> Option<String> {
    Some("index.html".to_string())
}

fn default_proxy_prefixes() -> Vec<String> {
    vec!["/api".to_string()]
}

fn default_watch_interval_ms() -> u64 {
    500
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root: default_root(),
            hot_reload: true,
            cors: true,
            fallback: default_fallback(),
            proxy_prefixes: default_proxy_prefixes(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

/// Deploy tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Configured environments, keyed by name
    #[serde(default = "default_environments")]
    pub environments: BTreeMap<String, Environment>,

    /// Backup retention configuration
    #[serde(default)]
    pub backup: BackupSettings,

    /// Health check probe configuration
    #[serde(default)]
    pub health_check: HealthCheckSettings,

    /// Optional build command run before deploying (via `bash -c`)
    #[serde(default)]
    pub build_command: Option<String>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            environments: default_environments(),
            backup: BackupSettings::default(),
            health_check: HealthCheckSettings::default(),
            build_command: None,
        }
    }
}

/// Backup retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Maximum retained backups per environment
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Root directory for backups, one subdirectory per environment
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,
}

fn default_max_backups() -> usize {
    5
}

fn default_backup_root() -> PathBuf {
    PathBuf::from("backups")
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            max_backups: default_max_backups(),
            backup_root: default_backup_root(),
        }
    }
}

/// Health check probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSettings {
    /// Per-probe timeout in milliseconds
    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of probe attempts before the deploy is failed
    #[serde(default = "default_health_retries")]
    pub retries: u32,

    /// Sleep between probe attempts, in milliseconds
    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,
}

fn default_health_timeout_ms() -> u64 {
    30_000
}

fn default_health_retries() -> u32 {
    3
}

fn default_health_interval_ms() -> u64 {
    5_000
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_health_timeout_ms(),
            retries: default_health_retries(),
            interval_ms: default_health_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.serve.port, 3000);
        assert_eq!(settings.serve.fallback.as_deref(), Some("index.html"));
        assert_eq!(settings.deploy.backup.max_backups, 5);
        assert_eq!(settings.deploy.environments.len(), 3);
    }

    #[tokio::test]
    async fn test_settings_load_roundtrip() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("sitekit.json");

        let mut settings = Settings::default();
        settings.serve.port = 4000;
        File::new(&path).write_json(&settings).await.expect("write");

        let loaded = Settings::load(&File::new(&path)).await.expect("load");
        assert_eq!(loaded.serve.port, 4000);

        // Missing file falls back to defaults
        let missing = Settings::load(&File::new(tmp.path().join("missing.json")))
            .await
            .expect("load");
        assert_eq!(missing.serve.port, 3000);
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: Settings =
            serde_json::from_str(r#"{"serve": {"port": 8080}}"#).expect("valid settings");
        assert_eq!(settings.serve.port, 8080);
        // Unspecified fields fall back to defaults
        assert_eq!(settings.serve.host, "127.0.0.1");
        assert!(settings.serve.hot_reload);
        assert_eq!(settings.deploy.health_check.retries, 3);
    }
}
