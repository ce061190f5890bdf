//! Backup capture, pruning, and inventory

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::info;

use crate::errors::SiteKitError;
use crate::filesys::dir::Dir;
use crate::settings::BackupSettings;

/// Prefix of backup directory names
pub const BACKUP_PREFIX: &str = "backup-";

/// A captured backup
#[derive(Debug, Clone)]
pub struct BackupEntry {
    /// Directory name, `backup-<timestamp>`
    pub name: String,

    /// Full path of the backup directory
    pub path: PathBuf,

    /// Capture time
    pub captured_at: DateTime<Utc>,

    /// Recursive size in bytes
    pub size_bytes: u64,
}

/// Per-environment backup directory
pub fn env_backup_root(settings: &BackupSettings, env_key: &str) -> PathBuf {
    settings.backup_root.join(env_key)
}

/// Capture a full copy of `live` under `backup_root`, named by the current
/// timestamp.
pub async fn create_backup(live: &Dir, backup_root: &Dir) -> Result<String, SiteKitError> {
    backup_root.create().await?;

    // ISO-like stamp with `:` and `.` replaced so it is a valid directory name
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string();
    let name = format!("{}{}", BACKUP_PREFIX, stamp);

    let dest = backup_root.subdir(&name);
    live.copy_to(&dest).await?;

    info!("Backup created: {}", dest.path().display());
    Ok(name)
}

/// List backups under `backup_root`, newest first. Empty when the directory
/// does not exist.
pub async fn list_backups(backup_root: &Dir) -> Result<Vec<BackupEntry>, SiteKitError> {
    if !backup_root.exists().await {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for path in backup_root.list_dirs().await? {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        if !name.starts_with(BACKUP_PREFIX) {
            continue;
        }

        let meta = fs::metadata(&path).await?;
        let captured_at = DateTime::<Utc>::from(meta.modified()?);
        let size_bytes = Dir::new(&path).size().await?;

        entries.push(BackupEntry {
            name,
            path,
            captured_at,
            size_bytes,
        });
    }

    // Newest first; the name embeds the capture stamp, so it breaks mtime ties
    entries.sort_by(|a, b| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| b.name.cmp(&a.name))
    });
    Ok(entries)
}

/// The most recently captured backup, if any
pub async fn latest_backup(backup_root: &Dir) -> Result<Option<BackupEntry>, SiteKitError> {
    Ok(list_backups(backup_root).await?.into_iter().next())
}

/// Delete backups beyond the retention cap, oldest first. Returns the names
/// of the deleted entries.
pub async fn prune_backups(backup_root: &Dir, max: usize) -> Result<Vec<String>, SiteKitError> {
    let entries = list_backups(backup_root).await?;
    let mut deleted = Vec::new();

    for entry in entries.into_iter().skip(max) {
        Dir::new(&entry.path).delete().await?;
        info!("Removed old backup: {}", entry.name);
        deleted.push(entry.name);
    }

    Ok(deleted)
}
