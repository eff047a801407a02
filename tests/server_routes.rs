use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use foodgram::api::AppState;
use foodgram::images::MediaStore;
use foodgram::server::create_server;
use foodgram::storage::SqliteStorage;
use std::sync::Arc;
use tower::ServiceExt;

fn state(media_root: &std::path::Path) -> AppState {
    AppState::new(
        Arc::new(SqliteStorage::open_in_memory().unwrap()),
        MediaStore::new(media_root, "/media/"),
        6,
    )
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn health_reports_service() {
    let media = tempfile::tempdir().unwrap();
    let (status, body) = get(create_server(state(media.path())), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "foodgram");
}

#[tokio::test]
async fn metrics_unavailable_without_recorder() {
    let media = tempfile::tempdir().unwrap();
    let (status, _) = get(create_server(state(media.path())), "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn serves_uploaded_media() {
    let media = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(media.path().join("recipes/images")).unwrap();
    std::fs::write(media.path().join("recipes/images/a.txt"), "hello").unwrap();

    let app = create_server(state(media.path()));
    let (status, body) = get(app.clone(), "/media/recipes/images/a.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");

    let (status, _) = get(app, "/media/recipes/images/missing.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn api_routes_are_mounted() {
    let media = tempfile::tempdir().unwrap();
    let (status, body) = get(create_server(state(media.path())), "/api/tags/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}
