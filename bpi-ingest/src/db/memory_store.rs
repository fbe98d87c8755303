//! Process-local shared store
//!
//! Same semantics as the SQLite store, scoped to one process.

use super::{FingerprintStore, LockStore};
use async_trait::async_trait;
use bpi_common::Result;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryStore {
    fingerprints: Mutex<HashMap<(String, String), String>>,
    locks: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded fingerprints across all namespaces
    pub fn fingerprint_count(&self) -> usize {
        lock(&self.fingerprints).len()
    }

    /// Current holder of `key`, if unexpired
    pub fn lock_holder(&self, key: &str) -> Option<String> {
        let locks = lock(&self.locks);
        locks
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(holder, _)| holder.clone())
    }
}

// A panic while holding the guard leaves plain maps intact; keep using them.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.fingerprints)
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(&self, namespace: &str, key: &str, token: &str) -> Result<()> {
        lock(&self.fingerprints).insert(
            (namespace.to_string(), key.to_string()),
            token.to_string(),
        );
        Ok(())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut locks = lock(&self.locks);
        let now = Instant::now();

        if let Some((_, expires_at)) = locks.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }

        locks.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }

    async fn delete_if_held(&self, key: &str, holder: &str) -> Result<bool> {
        let mut locks = lock(&self.locks);
        match locks.get(key) {
            Some((current, _)) if current == holder => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
