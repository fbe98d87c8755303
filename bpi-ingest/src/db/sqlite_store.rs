//! SQLite-backed shared store
//!
//! Lock acquisition is a single UPSERT whose update branch only fires when the
//! existing row has expired, so SQLite's write serialization makes it atomic
//! across connections and processes.

use super::{FingerprintStore, LockStore};
use async_trait::async_trait;
use bpi_common::db::init_database;
use bpi_common::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the store file
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = init_database(db_path).await?;
        Ok(Self { pool })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl FingerprintStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT token FROM processed_files WHERE namespace = ? AND path = ?")
                .bind(namespace)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(token,)| token))
    }

    async fn set(&self, namespace: &str, key: &str, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_files (namespace, path, token, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(namespace, path) DO UPDATE SET
                token = excluded.token,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LockStore for SqliteStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = now_millis();
        let expires_at = now.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);

        let result = sqlx::query(
            r#"
            INSERT INTO import_locks (lock_key, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(lock_key) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE import_locks.expires_at <= ?
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_if_held(&self, key: &str, holder: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM import_locks WHERE lock_key = ? AND holder = ?")
            .bind(key)
            .bind(holder)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
