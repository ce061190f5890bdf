//! Static dev server

pub mod handlers;
pub mod reload;
pub mod routes;
pub mod serve;
pub mod state;
pub mod watcher;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::errors::SiteKitError;
use crate::server::reload::ReloadHub;
use crate::server::state::ServerState;
use crate::settings::ServeSettings;

/// Run the dev server and its watcher until the shutdown signal resolves
pub async fn run_server(
    settings: ServeSettings,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SiteKitError> {
    let hub = Arc::new(ReloadHub::new());
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);

    let watcher_handle = if settings.hot_reload {
        let options = watcher::Options {
            interval: Duration::from_millis(settings.watch_interval_ms),
            ..Default::default()
        };
        let root = settings.root.clone();
        let watcher_hub = hub.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();

        Some(tokio::spawn(async move {
            watcher::run(
                &options,
                &root,
                watcher_hub,
                tokio::time::sleep,
                Box::pin(async move {
                    let _ = shutdown_rx.recv().await;
                }),
            )
            .await;
        }))
    } else {
        None
    };

    let state = Arc::new(ServerState::new(settings.clone(), hub.clone()));
    let mut server_shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve::serve(&settings, state, async move {
        let _ = server_shutdown_rx.recv().await;
    })
    .await?;

    shutdown_signal.await;
    info!("Shutting down dev server...");

    let _ = shutdown_tx.send(());
    // Open event streams would otherwise keep their connections alive
    hub.close_all();
    if let Some(handle) = watcher_handle {
        handle
            .await
            .map_err(|e| SiteKitError::ServerError(e.to_string()))?;
    }
    server_handle
        .await
        .map_err(|e| SiteKitError::ServerError(e.to_string()))??;

    info!("Shutdown complete");
    Ok(())
}
