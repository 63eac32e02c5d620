//! Health check endpoints

use std::collections::HashMap;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::app::AppState;
use crate::services::manager::{HealthStatus, ServiceHealth};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Album root being scanned
    pub album_path: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub services: HashMap<String, ServiceHealth>,
}

/// Health check - always returns OK if the server is running
async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        album_path: state.config.album_path.clone(),
    })
}

/// Readiness check - not ready while any service is unhealthy
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let services = state.services.health_all().await;
    let ready = services
        .values()
        .all(|h| h.status != HealthStatus::Unhealthy);

    Json(ReadyResponse { ready, services })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
