//! Errors raised while configuring the service or opening the shared store
//!
//! Import-level failures live in `bpi-ingest`; this type only covers what the
//! common crate itself can get wrong.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Shared store query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Creating the shared store directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable, malformed or out-of-range configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
