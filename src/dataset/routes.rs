//! Dataset routes
//!
//! - GET /api/dataset/default - Shape of the bundled default dataset
//! - POST /api/dataset/validate - Check an uploaded CSV before chatting with it

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{Dataset, DatasetSummary};
use crate::models::AppState;
use crate::types::{AppError, AppResult};

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct ValidateDatasetRequest {
    pub csv: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dataset/default", get(default_dataset))
        .route("/api/dataset/validate", post(validate_dataset))
}

async fn default_dataset(State(state): State<AppState>) -> Json<DatasetSummary> {
    let dataset = state.default_dataset.get().await;
    Json(dataset.summary(PREVIEW_ROWS))
}

async fn validate_dataset(body: Bytes) -> AppResult<Json<DatasetSummary>> {
    let request: ValidateDatasetRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Expected a JSON object with a \"csv\" string: {}", e)))?;
    let dataset = Dataset::from_upload(&request.csv)?;
    info!(rows = dataset.len(), columns = dataset.columns().len(), "Uploaded dataset validated");
    Ok(Json(dataset.summary(PREVIEW_ROWS)))
}
