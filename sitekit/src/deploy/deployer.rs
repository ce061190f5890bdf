//! Deploy orchestration

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deploy::backup::{
    create_backup, env_backup_root, latest_backup, list_backups, prune_backups, BackupEntry,
};
use crate::deploy::build::run_build;
use crate::deploy::environments::Environment;
use crate::deploy::fsm::{DeployEvent, DeployFsm, TOTAL_STEPS};
use crate::deploy::health;
use crate::errors::SiteKitError;
use crate::filesys::dir::Dir;
use crate::settings::{BackupSettings, DeploySettings};
use crate::utils::format_size;

/// Document that must be present in the build output
pub const MARKER_DOCUMENT: &str = "index.html";

/// Runs the deploy state machine for one environment
pub struct Deployer {
    env_key: String,
    env: Environment,
    backup_settings: BackupSettings,
    health_options: health::Options,
    build_command: Option<String>,
    deploy_id: String,
    fsm: DeployFsm,
}

impl Deployer {
    /// Create a deployer for a configured environment. Unknown environment
    /// names are a configuration error.
    pub fn new(settings: &DeploySettings, env_key: &str) -> Result<Self, SiteKitError> {
        let env = settings.environments.get(env_key).cloned().ok_or_else(|| {
            SiteKitError::ConfigError(format!("unknown deploy environment: {}", env_key))
        })?;

        Ok(Self {
            env_key: env_key.to_string(),
            env,
            backup_settings: settings.backup.clone(),
            health_options: health::Options::from(&settings.health_check),
            build_command: settings.build_command.clone(),
            deploy_id: format!("deploy-{}", Uuid::new_v4()),
            fsm: DeployFsm::new(),
        })
    }

    /// Unique id for this deploy attempt
    pub fn deploy_id(&self) -> &str {
        &self.deploy_id
    }

    /// Run the full deploy sequence. On failure at any step a rollback is
    /// attempted (its own failure is logged, never escalated) and the
    /// original error is returned.
    pub async fn deploy(&mut self) -> Result<(), SiteKitError> {
        let started = Instant::now();
        info!("Deploying to {} environment...", self.env.name);
        info!("Deploy id: {}", self.deploy_id);

        match self.run_steps().await {
            Ok(()) => {
                info!(
                    "Deploy finished in {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                info!("Live at {}", self.env.url());
                Ok(())
            }
            Err(e) => {
                error!("Deploy failed: {}", e);
                let _ = self.fsm.process(DeployEvent::Fail(e.to_string()));
                if let Err(rollback_err) = self.restore_latest_backup().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                let _ = self.fsm.process(DeployEvent::RollbackComplete);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self) -> Result<(), SiteKitError> {
        self.advance(DeployEvent::Begin)?;
        self.precheck().await?;

        self.advance(DeployEvent::Advance)?;
        run_build(self.build_command.as_deref(), &Dir::new(&self.env.build_dir)).await?;

        self.advance(DeployEvent::Advance)?;
        self.take_backup().await?;

        self.advance(DeployEvent::Advance)?;
        self.swap().await?;

        self.advance(DeployEvent::Advance)?;
        self.health_check().await?;

        self.advance(DeployEvent::Advance)?;
        self.cleanup().await?;

        self.advance(DeployEvent::Advance)?;
        Ok(())
    }

    fn advance(&mut self, event: DeployEvent) -> Result<(), SiteKitError> {
        self.fsm.process(event).map_err(SiteKitError::DeployError)?;
        if let Some((step, label)) = self.fsm.step_label() {
            info!("[{}/{}] {}", step, TOTAL_STEPS, label);
        }
        Ok(())
    }

    async fn precheck(&self) -> Result<(), SiteKitError> {
        let build_dir = Dir::new(&self.env.build_dir);
        if !build_dir.exists().await {
            return Err(SiteKitError::ConfigError(format!(
                "build directory does not exist: {}",
                build_dir.path().display()
            )));
        }

        let marker = build_dir.file(MARKER_DOCUMENT);
        if !marker.exists().await {
            return Err(SiteKitError::ConfigError(format!(
                "missing required file in build output: {}",
                MARKER_DOCUMENT
            )));
        }

        // The swap renames into the deploy path, so its parent must exist.
        // The live directory itself is never created here.
        if let Some(parent) = self.env.deploy_dir.parent() {
            if !parent.as_os_str().is_empty() {
                Dir::new(parent).create().await?;
            }
        }

        info!("Prechecks passed");
        Ok(())
    }

    async fn take_backup(&self) -> Result<(), SiteKitError> {
        if !self.env.backup {
            info!("Backups disabled for {}, skipping", self.env.name);
            return Ok(());
        }

        let live = Dir::new(&self.env.deploy_dir);
        if !live.exists().await {
            info!("No existing deployment, skipping backup");
            return Ok(());
        }

        let backup_root = Dir::new(env_backup_root(&self.backup_settings, &self.env_key));
        create_backup(&live, &backup_root).await?;

        if let Err(e) = prune_backups(&backup_root, self.backup_settings.max_backups).await {
            warn!("Failed to prune old backups: {}", e);
        }

        Ok(())
    }

    async fn swap(&self) -> Result<(), SiteKitError> {
        let tmp = Dir::new(path_with_suffix(
            &self.env.deploy_dir,
            &format!(".tmp-{}", self.deploy_id),
        ));

        let result = self.swap_into_place(&tmp).await;
        if result.is_err() {
            // Leave no partial copy behind
            let _ = tmp.delete().await;
        }
        result
    }

    async fn swap_into_place(&self, tmp: &Dir) -> Result<(), SiteKitError> {
        let build = Dir::new(&self.env.build_dir);
        let live = Dir::new(&self.env.deploy_dir);

        build.copy_to(tmp).await?;

        if live.exists().await {
            let aside = path_with_suffix(
                &self.env.deploy_dir,
                &format!(".old-{}", self.deploy_id),
            );
            live.rename(&aside).await?;
            tmp.rename(live.path()).await?;

            // The previous version stays recoverable until this point; the
            // delete itself is best-effort.
            if let Err(e) = Dir::new(&aside).delete().await {
                warn!("Failed to remove previous version {}: {}", aside.display(), e);
            }
        } else {
            tmp.rename(live.path()).await?;
        }

        let size = live.size().await?;
        info!("Deployed {} to {}", format_size(size), live.path().display());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SiteKitError> {
        if !self.env.health_check {
            info!("Health checks disabled for {}, skipping", self.env.name);
            return Ok(());
        }

        health::check(&self.env.url(), &self.health_options, tokio::time::sleep).await
    }

    async fn cleanup(&self) -> Result<(), SiteKitError> {
        let parent = match self.env.deploy_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut entries = fs::read_dir(&parent).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.contains(&self.deploy_id) {
                continue;
            }

            let path = entry.path();
            let removed = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            match removed {
                Ok(()) => info!("Removed leftover entry: {}", name),
                Err(e) => warn!("Failed to remove {}: {}", name, e),
            }
        }

        Ok(())
    }

    /// Restore the most recent backup into the live directory. Errors when
    /// no backup exists for the environment.
    pub async fn rollback(&self) -> Result<(), SiteKitError> {
        warn!("Rolling back {}...", self.env.name);
        self.restore_latest_backup().await?;
        info!("Rollback complete");
        Ok(())
    }

    async fn restore_latest_backup(&self) -> Result<(), SiteKitError> {
        let backup_root = Dir::new(env_backup_root(&self.backup_settings, &self.env_key));
        let latest = latest_backup(&backup_root).await?.ok_or_else(|| {
            SiteKitError::RollbackError(format!(
                "no backup available for environment {}",
                self.env_key
            ))
        })?;

        info!("Using backup: {}", latest.name);

        let live = Dir::new(&self.env.deploy_dir);
        live.delete().await?;
        Dir::new(&latest.path).copy_to(&live).await?;

        Ok(())
    }
}

/// Backup inventory for a configured environment, newest first
pub async fn list_environment_backups(
    settings: &DeploySettings,
    env_key: &str,
) -> Result<Vec<BackupEntry>, SiteKitError> {
    if !settings.environments.contains_key(env_key) {
        return Err(SiteKitError::ConfigError(format!(
            "unknown deploy environment: {}",
            env_key
        )));
    }

    let backup_root = Dir::new(env_backup_root(&settings.backup, env_key));
    list_backups(&backup_root).await
}

/// Append a suffix to a path's final component
fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
