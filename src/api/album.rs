//! Album sensor endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use crate::app::AppState;
use crate::services::album_picker::{AlbumPicker, AlbumSensor};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn picker(state: &AppState) -> Result<Arc<AlbumPicker>, ApiError> {
    state.services.get_album_picker().await.ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "album picker is not running",
        )
    })
}

/// Current album selection
async fn get_album(State(state): State<AppState>) -> Result<Json<AlbumSensor>, ApiError> {
    let picker = picker(&state).await?;
    Ok(Json(picker.snapshot()))
}

/// Pick a new album now
async fn refresh_album(State(state): State<AppState>) -> Result<Json<AlbumSensor>, ApiError> {
    let picker = picker(&state).await?;
    if let Err(e) = picker.refresh().await {
        tracing::error!("Manual album refresh failed: {:#}", e);
        return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)));
    }
    Ok(Json(picker.snapshot()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/album", get(get_album))
        .route("/album/refresh", post(refresh_album))
}
