//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use futures::Stream;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tracing::error;

use crate::filesys::file::File;
use crate::server::reload::ReloadHub;
use crate::server::routes::{content_type_for, resolve_route, RouteOutcome};
use crate::server::state::ServerState;

/// Endpoint the injected client script connects to
pub const RELOAD_ENDPOINT: &str = "/__dev_reload__";

/// Client script appended to served HTML pages when hot reload is enabled
const RELOAD_SCRIPT: &str = r#"
<script>
(function() {
  const eventSource = new EventSource('/__dev_reload__');

  eventSource.onmessage = function(event) {
    const data = JSON.parse(event.data);
    if (data.type === 'reload') {
      console.log('[sitekit] file changed, reloading page:', data.file);
      location.reload();
    }
  };

  eventSource.onerror = function() {
    console.warn('[sitekit] reload stream error, reconnecting...');
    setTimeout(() => location.reload(), 1000);
  };

  console.log('[sitekit] hot reload enabled');
})();
</script>"#;

/// Static file handler
pub async fn static_handler(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let settings = &state.settings;

    let outcome = resolve_route(
        &settings.root,
        uri.path(),
        settings.fallback.as_deref(),
        &settings.proxy_prefixes,
    )
    .await;

    match outcome {
        RouteOutcome::Serve(path) => {
            let content_type = content_type_for(&path);

            match File::new(&path).read_bytes().await {
                Ok(bytes) => {
                    if settings.hot_reload && content_type == "text/html" {
                        let page = inject_reload_script(&String::from_utf8_lossy(&bytes));
                        html_response(page)
                    } else {
                        ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
                    }
                }
                Err(e) => {
                    error!("Failed to read {}: {}", path.display(), e);
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
            }
        }
        RouteOutcome::Forbidden => {
            text_response(StatusCode::FORBIDDEN, "Directory listing not allowed")
        }
        RouteOutcome::NotFound => text_response(StatusCode::NOT_FOUND, "Not Found"),
        RouteOutcome::NotSupported => {
            text_response(StatusCode::NOT_IMPLEMENTED, "Proxy not implemented")
        }
    }
}

/// Reload event stream handler
pub async fn reload_stream_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.hub.subscribe();
    let guard = ClientGuard {
        id,
        hub: state.hub.clone(),
    };

    let stream = UnboundedReceiverStream::new(rx).map(move |message| {
        let _keep_alive = &guard;
        let data = serde_json::to_string(&message).unwrap_or_else(|_| "{}".into());
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Removes the client from the registry when its stream is dropped
struct ClientGuard {
    id: u64,
    hub: Arc<ReloadHub>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

/// Insert the reload client script before the closing body tag, or append
/// it when the page has none.
pub fn inject_reload_script(html: &str) -> String {
    if html.contains("</body>") {
        html.replacen("</body>", &format!("{}\n</body>", RELOAD_SCRIPT), 1)
    } else {
        format!("{}{}", html, RELOAD_SCRIPT)
    }
}

fn html_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/html")], body).into_response()
}

fn text_response(status: StatusCode, message: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_closing_body() {
        let page = "<html><body><h1>hi</h1></body></html>";
        let injected = inject_reload_script(page);

        assert!(injected.contains("EventSource"));
        let script_at = injected.find("<script>").expect("script present");
        let body_at = injected.find("</body>").expect("body close present");
        assert!(script_at < body_at);
    }

    #[test]
    fn test_inject_appends_without_body_tag() {
        let fragment = "<h1>hi</h1>";
        let injected = inject_reload_script(fragment);

        assert!(injected.starts_with(fragment));
        assert!(injected.contains("EventSource"));
    }

    #[test]
    fn test_inject_only_first_body_tag() {
        let page = "<body>a</body><body>b</body>";
        let injected = inject_reload_script(page);
        assert_eq!(injected.matches("<script>").count(), 1);
    }
}
