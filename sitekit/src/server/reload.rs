//! Reload client registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// Message pushed to connected pages over the event stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    Connected,
    Reload { file: String, timestamp: i64 },
}

impl ReloadMessage {
    /// A reload notification stamped with the current time
    pub fn reload(file: impl Into<String>) -> Self {
        ReloadMessage::Reload {
            file: file.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Registry of connected reload clients.
///
/// Owned by the server state; clients are added on connect and removed on
/// disconnect or when a broadcast write to them fails.
#[derive(Debug, Default)]
pub struct ReloadHub {
    clients: Mutex<HashMap<u64, UnboundedSender<ReloadMessage>>>,
    next_id: AtomicU64,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client. The receiver's first message is the
    /// connection acknowledgement.
    pub fn subscribe(&self) -> (u64, UnboundedReceiver<ReloadMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(ReloadMessage::Connected);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, tx);
        info!("Reload client connected, active clients: {}", self.client_count());

        (id, rx)
    }

    /// Remove a client from the registry
    pub fn remove(&self, id: u64) {
        self.lock().remove(&id);
        info!(
            "Reload client disconnected, active clients: {}",
            self.client_count()
        );
    }

    /// Send a message to every registered client.
    ///
    /// A client whose channel is closed is dropped from the registry; the
    /// broadcast continues to the remaining clients. Returns the number of
    /// clients still registered afterwards.
    pub fn broadcast(&self, message: ReloadMessage) -> usize {
        let mut clients = self.lock();
        let mut dropped = Vec::new();

        for (id, tx) in clients.iter() {
            if tx.send(message.clone()).is_err() {
                dropped.push(*id);
            }
        }

        for id in dropped {
            clients.remove(&id);
        }

        clients.len()
    }

    /// Number of registered clients
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every client channel, ending the open event streams so the
    /// server can finish its graceful shutdown.
    pub fn close_all(&self) {
        self.lock().clear();
    }

    // Recover the map even if a holder panicked
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, UnboundedSender<ReloadMessage>>> {
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
