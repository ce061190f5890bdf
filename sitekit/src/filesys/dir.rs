//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::SiteKitError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), SiteKitError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), SiteKitError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Rename the directory
    pub async fn rename(&self, to: &Path) -> Result<(), SiteKitError> {
        fs::rename(&self.path, to).await?;
        Ok(())
    }

    /// List subdirectories
    pub async fn list_dirs(&self) -> Result<Vec<PathBuf>, SiteKitError> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }

        Ok(dirs)
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> crate::filesys::file::File {
        crate::filesys::file::File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Recursively copy the directory's contents into `dest`.
    ///
    /// Regular files and directories only; other entry types are skipped.
    pub async fn copy_to(&self, dest: &Dir) -> Result<(), SiteKitError> {
        let mut queue = vec![(self.path.clone(), dest.path().to_path_buf())];

        while let Some((src, dst)) = queue.pop() {
            fs::create_dir_all(&dst).await?;
            let mut entries = fs::read_dir(&src).await?;

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let target = dst.join(entry.file_name());

                if file_type.is_dir() {
                    queue.push((entry.path(), target));
                } else if file_type.is_file() {
                    fs::copy(entry.path(), &target).await?;
                }
            }
        }

        Ok(())
    }

    /// Total size in bytes of all files under the directory
    pub async fn size(&self) -> Result<u64, SiteKitError> {
        let mut total = 0u64;
        let mut queue = vec![self.path.clone()];

        while let Some(dir) = queue.pop() {
            let mut entries = fs::read_dir(&dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    queue.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }

        Ok(total)
    }
}
