//! Manual import triggers
//!
//! POST /import (structured) and POST /import/easy (file-name derived
//! projects). Both run to completion and answer with the import summaries.

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::models::{ImportRequest, ImportResponse};
use crate::services::{run_import_datasets, run_import_datasets_easy};
use crate::AppState;

fn check_request(request: &ImportRequest) -> ApiResult<()> {
    if request.storage_id <= 0 {
        return Err(ApiError::BadRequest(format!(
            "storage_id must be positive, got {}",
            request.storage_id
        )));
    }
    if matches!(request.public_key.as_deref(), Some(key) if key.trim().is_empty()) {
        return Err(ApiError::BadRequest("public_key must not be empty".to_string()));
    }
    Ok(())
}

/// POST /import
///
/// Structured import of every bucket under the dataset root.
pub async fn import_datasets(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    check_request(&request)?;
    info!(storage = request.storage_id, "Structured import requested");

    let response = run_import_datasets(&state.ctx, &request).await?;
    Ok(Json(response))
}

/// POST /import/easy
///
/// 409 Conflict while another import holds the shared lock.
pub async fn import_datasets_easy(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    check_request(&request)?;
    info!(storage = request.storage_id, "Easy import requested");

    let response = run_import_datasets_easy(&state.ctx, &request).await?;
    Ok(Json(response))
}

/// Build import routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/import", post(import_datasets))
        .route("/import/easy", post(import_datasets_easy))
}
