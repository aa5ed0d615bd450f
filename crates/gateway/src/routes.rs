use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Query, State, multipart::MultipartRejection,
        rejection::QueryRejection,
    },
    routing::{get, post},
};
use inference::{DetectionResponse, HealthReport};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// Multipart field carrying the image.
const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct DetectParams {
    pub conf: Option<f32>,
    pub iou: Option<f32>,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.context.health())
}

async fn detect(
    State(state): State<AppState>,
    params: Result<Query<DetectParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let Query(params) = params?;
    let image_bytes = read_file_field(multipart?).await?;

    let (default_conf, default_iou) = state.context.default_thresholds();
    let conf = params.conf.unwrap_or(default_conf);
    let iou = params.iou.unwrap_or(default_iou);

    tracing::debug!(bytes = image_bytes.len(), conf, iou, "Detect request");

    let context = state.context.clone();
    let boxes = tokio::task::spawn_blocking(move || context.detect(&image_bytes, conf, iou))
        .await
        .map_err(|e| ApiError::Internal(format!("inference task failed: {}", e)))??;

    Ok(Json(DetectionResponse { boxes }))
}

/// Body of the first `file` field. Other fields are skipped.
async fn read_file_field(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            return Ok(field.bytes().await?.to_vec());
        }
    }
    Err(ApiError::MissingField(FILE_FIELD))
}
