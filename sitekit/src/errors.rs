//! Error types for sitekit

use thiserror::Error;

/// Main error type for sitekit
#[derive(Error, Debug)]
pub enum SiteKitError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Deploy error: {0}")]
    DeployError(String),

    #[error("Health check error: {0}")]
    HealthCheckError(String),

    #[error("Rollback error: {0}")]
    RollbackError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for SiteKitError {
    fn from(err: anyhow::Error) -> Self {
        SiteKitError::Internal(err.to_string())
    }
}
