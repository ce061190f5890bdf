//! Dev server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::SiteKitError;
use crate::server::handlers::{reload_stream_handler, static_handler, RELOAD_ENDPOINT};
use crate::server::state::ServerState;
use crate::settings::ServeSettings;

/// Build the dev server router
pub fn router(state: Arc<ServerState>) -> Router {
    let cors = state.settings.cors;

    let app = Router::new()
        .route(RELOAD_ENDPOINT, get(reload_stream_handler))
        .fallback(get(static_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app.layer(cors_layer())
    } else {
        app
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Start the dev server
pub async fn serve(
    settings: &ServeSettings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), SiteKitError>>, SiteKitError> {
    let app = router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SiteKitError::ServerError(e.to_string()))?;

    info!("Dev server listening on http://{}", addr);
    info!("Serving {}", settings.root.display());
    info!(
        "Hot reload: {}",
        if settings.hot_reload { "enabled" } else { "disabled" }
    );

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| SiteKitError::ServerError(e.to_string()))
    });

    Ok(handle)
}
