//! Cross-process import lock
//!
//! Set-if-absent with a TTL in the shared store. Whoever takes the key runs
//! the import; everyone else backs off. Each acquisition writes a fresh holder
//! token and release only deletes the key while that token is still stored, so
//! a holder that outlived its TTL cannot free a successor's lock. The TTL only
//! matters when a holder dies without releasing.

use crate::db::LockStore;
use bpi_common::Result;
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ImportLock {
    store: Arc<dyn LockStore>,
    key: String,
    ttl: Duration,
}

impl ImportLock {
    pub fn new(store: Arc<dyn LockStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Take the lock if no unexpired holder exists
    ///
    /// Returns the holder token to pass to [`ImportLock::release`].
    pub async fn try_acquire(&self) -> Result<Option<String>> {
        let holder = Uuid::new_v4().to_string();
        let acquired = self.store.set_if_absent(&self.key, &holder, self.ttl).await?;
        debug!(key = %self.key, acquired, "Import lock acquisition");
        Ok(acquired.then_some(holder))
    }

    /// Release the lock taken as `holder`
    ///
    /// `false` when the lock expired and now belongs to another holder.
    pub async fn release(&self, holder: &str) -> Result<bool> {
        let released = self.store.delete_if_held(&self.key, holder).await?;
        if !released {
            warn!(key = %self.key, "Import lock expired before release");
        }
        Ok(released)
    }

    /// Run `body` while holding the lock
    ///
    /// `Ok(None)` when the lock is held elsewhere and `body` did not run. The
    /// lock is released whether `body` completes, returns an error or panics.
    pub async fn with_lock<F, T>(&self, body: F) -> Result<Option<T>>
    where
        F: Future<Output = T>,
    {
        let Some(holder) = self.try_acquire().await? else {
            return Ok(None);
        };

        let outcome = AssertUnwindSafe(body).catch_unwind().await;

        if let Err(e) = self.release(&holder).await {
            warn!(
                key = %self.key,
                "Failed to release import lock, it expires in {:?}: {}",
                self.ttl,
                e
            );
        }

        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn lock_on(store: Arc<MemoryStore>) -> ImportLock {
        ImportLock::new(store, "bpi:import_lock", Duration::from_secs(1800))
    }

    #[tokio::test]
    async fn test_with_lock_runs_and_releases() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(store.clone());

        let value = lock.with_lock(async { 42 }).await.unwrap();

        assert_eq!(value, Some(42));
        assert_eq!(store.lock_holder("bpi:import_lock"), None);
    }

    #[tokio::test]
    async fn test_with_lock_backs_off_when_held() {
        let store = Arc::new(MemoryStore::new());
        let first = lock_on(store.clone());
        let second = lock_on(store.clone());

        assert!(first.try_acquire().await.unwrap().is_some());
        let mut ran = false;
        let value = second.with_lock(async { ran = true }).await.unwrap();

        assert_eq!(value, None);
        assert!(!ran);
        assert!(store.lock_holder("bpi:import_lock").is_some());
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_error_result() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(store.clone());

        let value = lock
            .with_lock(async { Err::<(), _>("cycle failed") })
            .await
            .unwrap();

        assert_eq!(value, Some(Err("cycle failed")));
        assert_eq!(store.lock_holder("bpi:import_lock"), None);
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_panic() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(store.clone());

        let task_lock = lock.clone();
        let joined = tokio::spawn(async move {
            task_lock
                .with_lock(async {
                    panic!("scan body panicked");
                })
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(store.lock_holder("bpi:import_lock"), None);
    }

    #[tokio::test]
    async fn test_release_requires_matching_holder() {
        let store = Arc::new(MemoryStore::new());
        let lock = lock_on(store.clone());

        let holder = lock.try_acquire().await.unwrap().unwrap();
        assert_eq!(store.lock_holder("bpi:import_lock"), Some(holder.clone()));

        assert!(!lock.release("someone-else").await.unwrap());
        assert_eq!(store.lock_holder("bpi:import_lock"), Some(holder.clone()));

        assert!(lock.release(&holder).await.unwrap());
        assert_eq!(store.lock_holder("bpi:import_lock"), None);
    }

    #[tokio::test]
    async fn test_expired_holder_leaves_successor_lock() {
        let store = Arc::new(MemoryStore::new());
        let short = ImportLock::new(store.clone(), "bpi:import_lock", Duration::from_millis(10));
        let successor = lock_on(store.clone());

        let value = short
            .with_lock(async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                successor.try_acquire().await.unwrap()
            })
            .await
            .unwrap();

        let successor_holder = value.flatten().unwrap();
        assert_eq!(store.lock_holder("bpi:import_lock"), Some(successor_holder));
    }
}
