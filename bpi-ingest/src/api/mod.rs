//! HTTP API handlers for bpi-ingest
//!
//! Manual import triggers plus a health check.

pub mod health;
pub mod import;

pub use health::health_routes;
pub use import::import_routes;
