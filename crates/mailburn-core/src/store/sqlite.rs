//! `SQLite`-backed store.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::KeyValueStore;
use crate::Result;

/// Store persisting entries in a single `SQLite` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) the database at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        debug!("Opened store at {database_path}");
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<Vec<u8>, _>("value")))
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.save("emailHistory_a", b"[]").await.unwrap();
        let loaded = store.load("emailHistory_a").await.unwrap();
        assert_eq!(loaded.as_deref(), Some(&b"[]"[..]));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.save("k", b"first").await.unwrap();
        store.save("k", b"second").await.unwrap();
        assert_eq!(store.load("k").await.unwrap().as_deref(), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn test_remove_deletes_key() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.save("k", b"value").await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());

        // Removing again is a no-op.
        store.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "mailburn-store-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path_str = path.to_str().unwrap();

        {
            let store = SqliteStore::open(path_str).await.unwrap();
            store.save("deviceId", b"device_1").await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::open(path_str).await.unwrap();
        assert_eq!(
            store.load("deviceId").await.unwrap().as_deref(),
            Some(&b"device_1"[..])
        );
        store.pool.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
