//! PostgreSQL adapter for dispatch storage.
//!
//! Backlogs and bindings live in a single `dispatch_kv` table. `set` is an
//! upsert so the read-modify-write cycle of the engine maps to plain
//! statements; per-destination serialization is the engine's job.

use crate::memory::validate_key;
use crate::traits::KeyValueStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

/// PostgreSQL-backed key/value adapter.
#[derive(Clone)]
pub struct PostgresKeyValueStore {
    pool: PgPool,
}

impl PostgresKeyValueStore {
    /// Connect to PostgreSQL and initialize the required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| sql_error("failed to connect postgres", e))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dispatch_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| sql_error("schema init failed", e))?;

        tracing::debug!("dispatch_kv schema ready");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for PostgresKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let row = sqlx::query("SELECT value FROM dispatch_kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| sql_error(&format!("get {key} failed"), e))?;

        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|e| sql_error(&format!("decode {key} failed"), e))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        sqlx::query(
            r#"
            INSERT INTO dispatch_kv (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| sql_error(&format!("set {key} failed"), e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        sqlx::query("DELETE FROM dispatch_kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| sql_error(&format!("delete {key} failed"), e))?;
        Ok(())
    }
}

/// Map a sqlx failure. Pool exhaustion becomes `Timeout`.
fn sql_error(context: &str, error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::PoolTimedOut => {
            StorageError::Timeout(format!("{context}: connection pool timed out"))
        }
        other => StorageError::Backend(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err = sql_error("get k failed", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Timeout(_)));

        let err = sql_error("get k failed", sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::Backend(msg) if msg.starts_with("get k failed")));
    }
}
