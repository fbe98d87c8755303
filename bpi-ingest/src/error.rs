//! Error types for bpi-ingest
//!
//! [`IngestError`] is the run-fatal taxonomy: it aborts a whole import
//! invocation. Item-level failures never reach it; they are recorded as failed
//! [`crate::models::ImportResult`]s inside the summary.

use crate::models::MetadataStructure;
use crate::services::catalog_client::CatalogError;
use crate::services::metadata_validator::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an import run
#[derive(Debug, Error)]
pub enum IngestError {
    /// Keys rejected, or none configured
    #[error("Authentication to the catalog failed: {0}")]
    Authentication(String),

    #[error("Storage {0} not found")]
    StorageNotFound(i64),

    /// No storage available to the service account
    #[error("No storage available for import")]
    NoStorage,

    #[error("Schema file not found for {structure}: {path}")]
    MissingSchema {
        structure: MetadataStructure,
        path: PathBuf,
    },

    #[error("Schema validation unavailable: {0}")]
    Validation(ValidationError),

    #[error(transparent)]
    Catalog(CatalogError),

    #[error("Shared store error: {0}")]
    Store(#[from] bpi_common::Error),

    /// Another import holds the shared lock
    #[error("An import is already running (lock '{0}' is held)")]
    LockHeld(String),
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingSchema { structure, path } => {
                IngestError::MissingSchema { structure, path }
            }
            other => IngestError::Validation(other),
        }
    }
}

impl From<CatalogError> for IngestError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unauthorized(msg) => IngestError::Authentication(msg),
            other => IngestError::Catalog(other),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Ingest(err) => match err {
                IngestError::Authentication(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                IngestError::StorageNotFound(_) => (StatusCode::NOT_FOUND, "STORAGE_NOT_FOUND"),
                IngestError::NoStorage => (StatusCode::NOT_FOUND, "NO_STORAGE"),
                IngestError::LockHeld(_) => (StatusCode::CONFLICT, "IMPORT_RUNNING"),
                IngestError::MissingSchema { .. } | IngestError::Validation(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "SCHEMA_ERROR")
                }
                IngestError::Catalog(_) => (StatusCode::BAD_GATEWAY, "CATALOG_ERROR"),
                IngestError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = match &self {
            ApiError::Ingest(err) => err.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
