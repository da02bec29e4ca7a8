use anyhow::Context;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::{KeyValueStore, MIGRATION_001_KV_STORE, StoreError, WriteBatch, WriteOp};

/// SQLITE_FULL primary result code
const SQLITE_FULL: &str = "13";

/// Key-value store backed by a single SQLite table.
pub struct SqliteStore {
    pool: SqlitePool,
    quota_bytes: Option<u64>,
}

impl SqliteStore {
    /// Create a new store with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            quota_bytes: None,
        }
    }

    /// Cap the total size of stored values. Writes that would exceed it fail with
    /// [`StoreError::Full`] and leave the store untouched.
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(MIGRATION_001_KV_STORE)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Total bytes currently held in values.
    pub async fn used_bytes(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COALESCE(SUM(LENGTH(value)), 0) AS used FROM kv_store")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| backend(e, "Failed to measure store size"))?;
        let used: i64 = row.get("used");
        Ok(used.max(0) as u64)
    }
}

/// Map a driver error, surfacing SQLITE_FULL as [`StoreError::DiskFull`].
fn backend(err: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(SQLITE_FULL) {
            return StoreError::DiskFull;
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(what))
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(e, "Failed to read record"))?;

        Ok(row.map(|row| row.get::<Vec<u8>, _>("value")))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.commit(batch).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| backend(e, "Failed to remove record"))?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM kv_store
            WHERE substr(key, 1, ?) = ?
            ORDER BY key
            "#,
        )
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| backend(e, "Failed to list keys"))?;

        Ok(rows.iter().map(|row| row.get("key")).collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend(e, "Failed to begin transaction"))?;

        let now = Utc::now().to_rfc3339();
        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, value } => {
                    sqlx::query(
                        r#"
                        INSERT INTO kv_store (key, value, updated_at)
                        VALUES (?, ?, ?)
                        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(&key)
                    .bind(&value)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| backend(e, "Failed to write record"))?;
                }
                WriteOp::Remove { key } => {
                    sqlx::query("DELETE FROM kv_store WHERE key = ?")
                        .bind(&key)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| backend(e, "Failed to remove record"))?;
                }
            }
        }

        if let Some(quota) = self.quota_bytes {
            let row = sqlx::query("SELECT COALESCE(SUM(LENGTH(value)), 0) AS used FROM kv_store")
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| backend(e, "Failed to measure store size"))?;
            let needed = row.get::<i64, _>("used").max(0) as u64;
            if needed > quota {
                // Dropping the transaction rolls it back.
                return Err(StoreError::Full { needed, quota });
            }
        }

        tx.commit()
            .await
            .map_err(|e| backend(e, "Failed to commit transaction"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn temp_store(quota: Option<u64>) -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("kv.db").display());
        let store = SqliteStore::init(&url).await.unwrap().with_quota(quota);
        (store, dir)
    }

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let (store, _dir) = temp_store(None).await;

        store.set("balance/running", b"one".to_vec()).await.unwrap();
        store.set("balance/running", b"two".to_vec()).await.unwrap();

        assert_eq!(
            store.get("balance/running").await.unwrap(),
            Some(b"two".to_vec())
        );
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_listing() {
        let (store, _dir) = temp_store(None).await;
        for key in ["backup/0002", "backup/0001", "snapshot/2024-01-01"] {
            store.set(key, vec![1]).await.unwrap();
        }

        let keys = store.keys_with_prefix("backup/").await.unwrap();
        assert_eq!(keys, vec!["backup/0001", "backup/0002"]);
    }

    #[tokio::test]
    async fn test_commit_is_atomic_under_quota() {
        let (store, _dir) = temp_store(Some(10)).await;
        store.set("a", vec![0; 6]).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.remove("a").put("b", vec![0; 3]).put("c", vec![0; 9]);
        let result = store.commit(batch).await;

        assert!(matches!(result, Err(StoreError::Full { needed: 12, quota: 10 })));
        assert_eq!(store.get("a").await.unwrap(), Some(vec![0; 6]));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.used_bytes().await.unwrap(), 6);
    }
}
