//! Persistent key-value store on SQLite.
//!
//! Values are sealed with AES-256-GCM before they touch disk; keys are stored
//! in the clear since they only carry org and user identifiers.

use super::{encryption, KvStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Encrypted key-value store backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE kv_entries (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL,        -- base64(nonce || ciphertext)
///     expires_at INTEGER NOT NULL -- unix milliseconds
/// );
/// ```
///
/// The connection sits behind a `Mutex`; every operation is a single
/// statement, so each key operation is atomic.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl SqliteStore {
    /// Create or open a store.
    ///
    /// # Arguments
    /// * `db_path` - Path to the database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key_bytes =
            encryption::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create kv_entries table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv_entries(expires_at)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("SQLite connection mutex poisoned"))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let sealed = encryption::seal(value, &self.encryption_key)
            .with_context(|| format!("Failed to encrypt value for {}", key))?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now_millis().saturating_add(ttl_ms);

        self.lock()?
            .execute(
                r#"
                INSERT INTO kv_entries (key, value, expires_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at = excluded.expires_at
                "#,
                params![key, sealed, expires_at],
            )
            .context("Failed to store value")?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let sealed: Option<String> = self
            .lock()?
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now_millis()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read value")?;

        sealed
            .map(|s| {
                encryption::open(&s, &self.encryption_key)
                    .with_context(|| format!("Failed to decrypt value for {}", key))
            })
            .transpose()
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let live = conn
            .execute(
                "DELETE FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now_millis()],
            )
            .context("Failed to delete value")?;
        // Drop any expired leftover under the same key as well
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
            .context("Failed to delete value")?;

        Ok(live > 0)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        // Read, compare and delete under one lock so no write can interleave
        let conn = self.lock()?;
        let sealed: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                params![key, now_millis()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read value")?;

        let Some(sealed) = sealed else {
            return Ok(false);
        };
        let current = encryption::open(&sealed, &self.encryption_key)
            .with_context(|| format!("Failed to decrypt value for {}", key))?;
        if current != expected {
            return Ok(false);
        }

        // Sealed text is unique per write, so it pins the row we compared
        let removed = conn
            .execute(
                "DELETE FROM kv_entries WHERE key = ?1 AND value = ?2",
                params![key, sealed],
            )
            .context("Failed to delete value")?;

        Ok(removed > 0)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let removed = self
            .lock()?
            .execute(
                "DELETE FROM kv_entries WHERE expires_at <= ?1",
                params![now_millis()],
            )
            .context("Failed to purge expired entries")?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn create_test_store() -> SqliteStore {
        let key = BASE64.encode([0u8; 32]);
        SqliteStore::new(":memory:", &key).expect("Failed to create test store")
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = create_test_store();
        store
            .set("credentials:org:alice", r#"{"access_token":"at"}"#, Duration::from_secs(3600))
            .await
            .unwrap();

        let value = store.get("credentials:org:alice").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"access_token":"at"}"#));
    }

    #[tokio::test]
    async fn test_values_encrypted_at_rest() {
        let store = create_test_store();
        store
            .set(
                "credentials:org:alice",
                r#"{"access_token":"plain-token"}"#,
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let raw: String = store
            .lock()
            .unwrap()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = 'credentials:org:alice'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!raw.contains("plain-token"));
    }

    #[tokio::test]
    async fn test_upsert() {
        let store = create_test_store();
        store.set("k", "one", Duration::from_secs(60)).await.unwrap();
        store.set("k", "two", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_expired_is_invisible_and_purged() {
        let store = create_test_store();
        store.set("short", "v", Duration::from_millis(10)).await.unwrap();
        store.set("long", "v", Duration::from_secs(600)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_if_eq() {
        let store = create_test_store();
        store.set("k", "old", Duration::from_secs(60)).await.unwrap();
        store.set("k", "new", Duration::from_secs(60)).await.unwrap();

        assert!(!store.delete_if_eq("k", "old").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));

        assert!(store.delete_if_eq("k", "new").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.delete_if_eq("k", "new").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_if_eq_ignores_expired() {
        let store = create_test_store();
        store.set("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!store.delete_if_eq("k", "v").await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.db");
        let key = BASE64.encode([9u8; 32]);

        {
            let store = SqliteStore::new(&path, &key).unwrap();
            store.set("k", "kept", Duration::from_secs(60)).await.unwrap();
        }

        let store = SqliteStore::new(&path, &key).unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("kept"));

        // A different master key cannot read the old values
        let other = SqliteStore::new(&path, &BASE64.encode([1u8; 32])).unwrap();
        assert!(other.get("k").await.is_err());
    }

    #[test]
    fn test_invalid_encryption_key() {
        assert!(SqliteStore::new(":memory:", "short").is_err());
        assert!(SqliteStore::new(":memory:", "not-valid-base64!@#$").is_err());
    }
}
