//! Processed-files fingerprint cache
//!
//! A file is skipped when its `<mtime_ns>_<size>` token equals the one stored
//! at its last successful import. Tokens are written only after success, so a
//! failed file is retried on the next run. Content is never read.

use crate::db::FingerprintStore;
use bpi_common::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Change-detection token from file size and modification time
pub fn fingerprint_token(path: &Path) -> std::io::Result<String> {
    let metadata = std::fs::metadata(path)?;
    let mtime_ns = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(format!("{}_{}", mtime_ns, metadata.len()))
}

#[derive(Clone)]
pub struct FileImportCache {
    store: Arc<dyn FingerprintStore>,
    namespace: String,
}

impl FileImportCache {
    pub fn new(store: Arc<dyn FingerprintStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn key(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    /// Whether `path` changed since its last successful import
    ///
    /// Stat or store failures answer `true`: importing again is recoverable
    /// through the "already imported" check, skipping a file silently is not.
    pub async fn should_process(&self, path: &Path) -> bool {
        let token = match fingerprint_token(path) {
            Ok(token) => token,
            Err(e) => {
                debug!(file = %path.display(), "Cannot stat file: {}", e);
                return true;
            }
        };

        match self.store.get(&self.namespace, &Self::key(path)).await {
            Ok(Some(stored)) => stored != token,
            Ok(None) => true,
            Err(e) => {
                warn!(file = %path.display(), "Fingerprint lookup failed: {}", e);
                true
            }
        }
    }

    /// Record the current fingerprint of `path` after a successful import
    pub async fn mark_processed(&self, path: &Path) -> Result<()> {
        let token = fingerprint_token(path)?;
        self.store
            .set(&self.namespace, &Self::key(path), &token)
            .await
    }
}
