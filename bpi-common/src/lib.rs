//! # BigPicture Ingest Common Library
//!
//! Shared code for the dataset ingest service:
//! - Configuration object and its resolution (CLI → ENV → TOML → defaults)
//! - Common error type
//! - SQLite pool initialisation for the shared fingerprint/lock store

pub mod config;
pub mod db;
pub mod error;

pub use config::{ConfigSource, IngestConfig};
pub use error::{Error, Result};
