//! Shared store access for bpi-ingest
//!
//! Two concerns share one backend: the processed-files fingerprint cache and
//! the cross-process import lock. Every ingest replica pointing at the same
//! store sees the same fingerprints and contends for the same lock.

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

use async_trait::async_trait;
use bpi_common::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Persistent map of file path → change-detection token, grouped by namespace
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    async fn set(&self, namespace: &str, key: &str, token: &str) -> Result<()>;
}

/// Named mutual-exclusion locks with expiry
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Store `value` under `key` unless an unexpired entry already exists
    ///
    /// Returns `true` when this call took the key. Two concurrent calls for the
    /// same key never both return `true`.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remove `key` if `holder` still owns it
    ///
    /// Returns `false` when the entry is gone or belongs to someone else (the
    /// holder's TTL ran out and another process took the key).
    async fn delete_if_held(&self, key: &str, holder: &str) -> Result<bool>;
}

/// Handles to the fingerprint and lock stores, usually one backend behind both
#[derive(Clone)]
pub struct SharedStores {
    pub fingerprints: Arc<dyn FingerprintStore>,
    pub locks: Arc<dyn LockStore>,
}

impl SharedStores {
    /// Use one backend for both concerns
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: FingerprintStore + LockStore + 'static,
    {
        Self {
            fingerprints: backend.clone(),
            locks: backend,
        }
    }

    /// Fresh process-local stores
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}

/// Open the backend selected by `store_url`
///
/// - `sqlite://<path>` — SQLite file shared by every replica
/// - `memory://` — process-local store
pub async fn open_store(store_url: &str) -> Result<SharedStores> {
    if let Some(path) = store_url.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(Error::Config("sqlite store_url has no path".to_string()));
        }
        let store = SqliteStore::open(Path::new(path)).await?;
        return Ok(SharedStores::from_backend(Arc::new(store)));
    }

    if store_url.starts_with("memory://") {
        tracing::warn!("Using process-local store; locks are not shared across replicas");
        return Ok(SharedStores::in_memory());
    }

    Err(Error::Config(format!(
        "Unsupported store_url '{}' (expected sqlite://<path> or memory://)",
        store_url
    )))
}
