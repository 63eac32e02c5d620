//! Integration tests for the HTTP API
//!
//! Builds the router against a started services manager and drives it with
//! `tower::ServiceExt::oneshot`, no socket involved.

use std::fs;
use std::sync::Arc;

use album_select::app::{AppState, build_app};
use album_select::config::Config;
use album_select::services::{AlbumPickerConfig, ServicesManager};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

async fn app_for(dir: &TempDir, start: bool) -> axum::Router {
    let config = Arc::new(Config::from_lookup(|_| None).unwrap());
    let builder = ServicesManager::builder().add_service(AlbumPickerConfig {
        root_path: dir.path().to_path_buf(),
        uri_prefix: "media-source://media_source/local".to_string(),
        media_prefix: "/media".to_string(),
    });
    let services = if start {
        builder.start().await.unwrap()
    } else {
        builder.build().await.unwrap()
    };
    build_app(AppState { config, services })
}

async fn call(app: axum::Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_get_album_after_startup() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("2023-05-trip")).unwrap();
    let app = app_for(&dir, true).await;

    let (status, body) = call(app, Method::GET, "/api/album").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Album Select");
    assert_eq!(body["unique_id"], "album_select");
    assert_eq!(body["state"], "2023-05-trip");
    assert_eq!(body["attributes"]["year"], "2023");
    assert_eq!(body["attributes"]["month"], "05");
    assert_eq!(body["attributes"]["name"], "trip");
    assert!(body["refreshed_at"].is_string());
}

#[tokio::test]
async fn test_manual_refresh_picks_up_new_folder() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&dir, true).await;

    let (_, body) = call(app.clone(), Method::GET, "/api/album").await;
    assert_eq!(body["state"], Value::Null);
    assert_eq!(body["attributes"], serde_json::json!({}));

    fs::create_dir(dir.path().join("2024_02_ski")).unwrap();
    let (status, body) = call(app, Method::POST, "/api/album/refresh").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "2024_02_ski");
    assert_eq!(body["attributes"]["name"], "ski");
}

#[tokio::test]
async fn test_refresh_error_keeps_previous_album() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("2023-05-trip")).unwrap();
    let app = app_for(&dir, true).await;

    let (_, body) = call(app.clone(), Method::GET, "/api/album").await;
    assert_eq!(body["state"], "2023-05-trip");

    // Root turns into a regular file: listing fails with an unexpected error
    fs::remove_dir(dir.path().join("2023-05-trip")).unwrap();
    let root = dir.path().to_path_buf();
    fs::remove_dir(&root).unwrap();
    fs::write(&root, b"not a directory").unwrap();

    let (status, body) = call(app.clone(), Method::POST, "/api/album/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, body) = call(app, Method::GET, "/api/album").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "2023-05-trip");

    fs::remove_file(&root).unwrap();
    fs::create_dir(&root).unwrap();
}

#[tokio::test]
async fn test_album_unavailable_before_start() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&dir, false).await;

    let (status, body) = call(app, Method::GET, "/api/album").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_health_and_readiness() {
    let dir = TempDir::new().unwrap();
    let app = app_for(&dir, true).await;

    let (status, body) = call(app.clone(), Method::GET, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["album_path"], "/media/rock2_photo/onedrive");

    let (status, body) = call(app, Method::GET, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["services"]["album_picker"]["status"], "healthy");
}
