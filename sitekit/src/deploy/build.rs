//! Build step execution and verification

use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::SiteKitError;
use crate::filesys::dir::Dir;
use crate::utils::format_size;

/// Run the configured build command, then verify the build output exists
/// and is non-empty.
pub async fn run_build(build_command: Option<&str>, build_dir: &Dir) -> Result<(), SiteKitError> {
    match build_command {
        Some(command) => {
            info!("Running build command: {}", command);
            let status = Command::new("bash")
                .args(["-c", command])
                .status()
                .await
                .map_err(|e| {
                    SiteKitError::BuildError(format!("failed to run build command: {}", e))
                })?;

            if !status.success() {
                return Err(SiteKitError::BuildError(format!(
                    "build command exited with {}",
                    status
                )));
            }
        }
        None => {
            warn!("No build command configured, skipping build step");
        }
    }

    if !build_dir.exists().await {
        return Err(SiteKitError::BuildError(format!(
            "build output directory missing: {}",
            build_dir.path().display()
        )));
    }

    let size = build_dir.size().await?;
    if size == 0 {
        return Err(SiteKitError::BuildError(format!(
            "build output directory is empty: {}",
            build_dir.path().display()
        )));
    }

    info!("Build output ready: {}", format_size(size));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_without_command_verifies_output() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("index.html"), "<html></html>").expect("write");

        let result = run_build(None, &Dir::new(tmp.path())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_build_fails_on_empty_output() {
        let tmp = tempfile::tempdir().expect("tempdir");

        let result = run_build(None, &Dir::new(tmp.path())).await;
        assert!(matches!(result, Err(SiteKitError::BuildError(_))));
    }

    #[tokio::test]
    async fn test_build_command_failure_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("index.html"), "<html></html>").expect("write");

        let result = run_build(Some("exit 3"), &Dir::new(tmp.path())).await;
        assert!(matches!(result, Err(SiteKitError::BuildError(_))));
    }

    #[tokio::test]
    async fn test_build_command_runs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let marker = tmp.path().join("built.html");
        let command = format!("echo '<html></html>' > {}", marker.display());

        let result = run_build(Some(&command), &Dir::new(tmp.path())).await;
        assert!(result.is_ok());
        assert!(marker.exists());
    }
}
