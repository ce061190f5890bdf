//! Request path resolution

use std::path::{Path, PathBuf};

use tokio::fs;

/// Document served for a bare directory request
pub const INDEX_DOCUMENT: &str = "index.html";

/// Outcome of resolving a request path against the served root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Serve the file at this path
    Serve(PathBuf),

    /// Directory without an index document
    Forbidden,

    /// Nothing at this path and no usable fallback
    NotFound,

    /// Path is reserved for the API proxy, which is not supported
    NotSupported,
}

/// Resolve a raw request path to a file under `root`.
///
/// Query string and fragment are stripped before resolution, and `..`/`.`
/// segments are dropped so the resolved path can never escape the root.
pub async fn resolve_route(
    root: &Path,
    raw_path: &str,
    fallback: Option<&str>,
    proxy_prefixes: &[String],
) -> RouteOutcome {
    let request_path = raw_path.split(['?', '#']).next().unwrap_or("");

    if proxy_prefixes
        .iter()
        .any(|prefix| request_path.starts_with(prefix.as_str()))
    {
        return RouteOutcome::NotSupported;
    }

    let relative = sanitize_path(request_path);
    let candidate = if relative.is_empty() {
        root.join(INDEX_DOCUMENT)
    } else {
        root.join(&relative)
    };

    match fs::metadata(&candidate).await {
        Ok(meta) if meta.is_dir() => {
            let index = candidate.join(INDEX_DOCUMENT);
            if fs::metadata(&index).await.map(|m| m.is_file()).unwrap_or(false) {
                RouteOutcome::Serve(index)
            } else {
                RouteOutcome::Forbidden
            }
        }
        Ok(_) => RouteOutcome::Serve(candidate),
        Err(_) => {
            if let Some(fallback) = fallback {
                let fallback_path = root.join(fallback);
                if fs::metadata(&fallback_path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false)
                {
                    return RouteOutcome::Serve(fallback_path);
                }
            }
            RouteOutcome::NotFound
        }
    }
}

/// Drop empty, `.` and `..` segments from a request path
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Content type for a file path, from a fixed extension table.
///
/// Unknown extensions get a generic binary type.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
