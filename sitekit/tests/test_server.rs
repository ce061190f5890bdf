//! Dev server integration tests

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;

use sitekit::server::reload::ReloadHub;
use sitekit::server::serve::router;
use sitekit::server::state::ServerState;
use sitekit::settings::ServeSettings;

fn write_site(root: &Path) {
    std::fs::create_dir_all(root.join("docs")).expect("mkdir");
    std::fs::create_dir_all(root.join("assets")).expect("mkdir");
    std::fs::write(
        root.join("index.html"),
        "<html><body><h1>home</h1></body></html>",
    )
    .expect("write");
    std::fs::write(
        root.join("docs/index.html"),
        "<html><body><h1>docs</h1></body></html>",
    )
    .expect("write");
    std::fs::write(root.join("app.js"), "console.log('app')").expect("write");
}

fn test_router(root: &Path, hot_reload: bool, fallback: Option<&str>) -> axum::Router {
    let settings = ServeSettings {
        root: root.to_path_buf(),
        hot_reload,
        cors: true,
        fallback: fallback.map(String::from),
        ..Default::default()
    };
    router(Arc::new(ServerState::new(settings, Arc::new(ReloadHub::new()))))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8_lossy(&bytes).to_string()
}

#[tokio::test]
async fn test_serves_static_file_with_content_type() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(Request::builder().uri("/app.js").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
    assert_eq!(body_string(response).await, "console.log('app')");
}

#[tokio::test]
async fn test_directory_with_index_serves_index() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(Request::builder().uri("/docs").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<h1>docs</h1>"));
}

#[tokio::test]
async fn test_directory_without_index_is_forbidden() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(Request::builder().uri("/assets").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_path_with_fallback() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, Some("index.html"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/courses/intro")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("<h1>home</h1>"));
}

#[tokio::test]
async fn test_missing_path_without_fallback_is_404() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/courses/intro")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_cannot_escape_root() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("root");
    std::fs::create_dir_all(&root).expect("mkdir");
    std::fs::write(tmp.path().join("secret.txt"), "top secret").expect("write");

    let app = test_router(&root, false, None);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/../secret.txt")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_proxy_prefix_is_not_implemented() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, Some("index.html"));

    let response = app
        .oneshot(Request::builder().uri("/api/users").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_hot_reload_script_injected_into_html_only() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), true, None);

    let page = app
        .clone()
        .oneshot(Request::builder().uri("/index.html").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let page_body = body_string(page).await;
    assert!(page_body.contains("/__dev_reload__"));
    // The script lands before the closing body tag
    assert!(page_body.find("EventSource").expect("script") < page_body.find("</body>").expect("tag"));

    let script = app
        .oneshot(Request::builder().uri("/app.js").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let script_body = body_string(script).await;
    assert!(!script_body.contains("EventSource"));
}

#[tokio::test]
async fn test_reload_endpoint_is_an_event_stream() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), true, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/__dev_reload__")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
}

#[tokio::test]
async fn test_cors_preflight_short_circuits() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/index.html")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_cors_headers_on_regular_responses() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_site(tmp.path());
    let app = test_router(tmp.path(), false, None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/index.html")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
