//! Key-value store for transient OAuth state and cached credentials.
//!
//! Every key is scoped to one `(org_id, user_id)` pair, so the store is the
//! only shared resource between requests and per-key atomicity is all the
//! synchronization the flow needs.
//!
//! Two backends:
//! - [`MemoryStore`]: process-local, lost on restart
//! - [`SqliteStore`]: persistent, values AES-256-GCM encrypted at rest

mod encryption;
mod memory;
mod sqlite;

pub use encryption::{open, seal, validate_key};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Key-value store with per-entry expiry.
///
/// Expired entries are never returned by `get`, whether or not they have been
/// purged yet.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key` for `ttl`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Fetch the live value under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`. Returns true if a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove `key` only if its live value equals `expected`, atomically.
    /// Returns true if the value was removed.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool>;

    /// Drop all expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize>;
}

/// Store key for the pending OAuth state of a user.
pub fn state_key(org_id: &str, user_id: &str) -> String {
    format!("state:{}:{}", org_id, user_id)
}

/// Store key for the cached token set of a user.
pub fn credentials_key(org_id: &str, user_id: &str) -> String {
    format!("credentials:{}:{}", org_id, user_id)
}

/// Open the configured backend.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Sqlite => {
            let key = config
                .encryption_key
                .as_deref()
                .context("HUBSPOT_ENCRYPTION_KEY is required for the sqlite store")?;
            let store = SqliteStore::new(&config.sqlite_path, key)
                .with_context(|| format!("Failed to open sqlite store at {}", config.sqlite_path))?;
            Ok(Arc::new(store))
        }
    }
}

/// Background task to periodically purge expired entries
pub async fn run_store_cleanup(store: Arc<dyn KvStore>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));

    loop {
        interval.tick().await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "Purged expired store entries"),
            Err(e) => tracing::warn!(error = %e, "Store cleanup failed"),
        }
    }
}
