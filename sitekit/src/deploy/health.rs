//! Deploy health checks

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::SiteKitError;
use crate::settings::HealthCheckSettings;

/// Health check options
#[derive(Debug, Clone)]
pub struct Options {
    /// Per-probe timeout
    pub timeout: Duration,

    /// Number of probe attempts
    pub retries: u32,

    /// Sleep between attempts
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            interval: Duration::from_secs(5),
        }
    }
}

impl From<&HealthCheckSettings> for Options {
    fn from(settings: &HealthCheckSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.timeout_ms),
            retries: settings.retries,
            interval: Duration::from_millis(settings.interval_ms),
        }
    }
}

/// Probe `url` until a response in the 200–399 range arrives, up to the
/// configured number of attempts.
pub async fn check<S, F>(url: &str, options: &Options, sleep_fn: S) -> Result<(), SiteKitError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()?;

    for attempt in 1..=options.retries {
        info!("Health check ({}/{}): {}", attempt, options.retries, url);

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    info!("Health check passed: {}", status);
                    return Ok(());
                }
                warn!(
                    "Health check failed ({}/{}): HTTP {}",
                    attempt, options.retries, status
                );
            }
            Err(e) => {
                warn!("Health check failed ({}/{}): {}", attempt, options.retries, e);
            }
        }

        if attempt < options.retries {
            info!("Retrying in {:?}...", options.interval);
            sleep_fn(options.interval).await;
        }
    }

    Err(SiteKitError::HealthCheckError(format!(
        "no successful response from {} after {} attempts",
        url, options.retries
    )))
}
