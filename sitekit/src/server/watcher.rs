//! File watching worker for hot reload

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::server::reload::{ReloadHub, ReloadMessage};

/// Watcher worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between filesystem scans
    pub interval: Duration,

    /// File extensions that trigger a reload
    pub extensions: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            extensions: vec!["html".to_string(), "css".to_string(), "js".to_string()],
        }
    }
}

/// Mtime-based scanner over a directory tree.
///
/// Tracks the modification time of every file whose extension is in the
/// watched set; `poll` reports files that are new or whose mtime changed
/// since the previous scan.
#[derive(Debug)]
pub struct TreeScanner {
    root: PathBuf,
    extensions: Vec<String>,
    mtimes: HashMap<PathBuf, SystemTime>,
}

impl TreeScanner {
    /// Create a scanner with a baseline snapshot so the first poll does not
    /// spuriously report every file.
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        let root = root.into();
        let mut scanner = Self {
            root,
            extensions,
            mtimes: HashMap::new(),
        };
        scanner.mtimes = scanner.scan();
        scanner
    }

    /// Report files changed since the previous poll
    pub fn poll(&mut self) -> Vec<PathBuf> {
        let current = self.scan();
        let mut changed = Vec::new();

        for (path, mtime) in &current {
            match self.mtimes.get(path) {
                Some(previous) if previous == mtime => {}
                _ => changed.push(path.clone()),
            }
        }

        changed.sort();
        self.mtimes = current;
        changed
    }

    fn scan(&self) -> HashMap<PathBuf, SystemTime> {
        let mut mtimes = HashMap::new();
        let mut queue = vec![self.root.clone()];

        while let Some(dir) = queue.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let Ok(meta) = entry.metadata() else {
                    continue;
                };

                if meta.is_dir() {
                    queue.push(path);
                } else if self.is_watched(&path) {
                    if let Ok(modified) = meta.modified() {
                        mtimes.insert(path, modified);
                    }
                }
            }
        }

        mtimes
    }

    fn is_watched(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .map(|ext| self.extensions.iter().any(|watched| *watched == ext))
            .unwrap_or(false)
    }
}

/// Run the watcher worker
pub async fn run<S, F>(
    options: &Options,
    root: &Path,
    hub: Arc<ReloadHub>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Watching {} for changes...", root.display());

    let mut scanner = TreeScanner::new(root, options.extensions.clone());

    loop {
        // Check for shutdown
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Watcher shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with scan
            }
        }

        let changed = scanner.poll();
        if changed.is_empty() {
            debug!("No changes detected");
            continue;
        }

        for path in changed {
            let file = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .display()
                .to_string();
            info!("File changed: {}", file);
            hub.broadcast(ReloadMessage::reload(file));
        }
    }
}
