//! bpi-ingest library interface
//!
//! Exposes the import services and the HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::context::IngestContext;
pub use crate::error::{ApiError, ApiResult, IngestError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<IngestContext>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(ctx: Arc<IngestContext>) -> Self {
        Self {
            ctx,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
