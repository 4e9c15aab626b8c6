//! OAuth credentials cached in the key-value store.
//!
//! A [`TokenSet`] is written by the callback handler after a successful code
//! exchange and read back by [`CredentialAccessor`] when items are loaded.
//! The store owns the serialized bytes; callers get a fresh copy per read.

use crate::error::{LinkError, LinkResult};
use crate::store::{credentials_key, KvStore};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Token response from the provider's token endpoint.
///
/// Fields the provider adds beyond the standard ones are kept in `extra` so
/// the cached record round-trips unchanged.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    /// OAuth access token (used for API requests)
    pub access_token: String,

    /// OAuth refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: 0,
            token_type: None,
            extra: Map::new(),
        }
    }
}

// Tokens never reach the logs.
impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// What happens to cached credentials after they are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    /// Credentials stay cached until their TTL runs out.
    #[default]
    Retain,
    /// Credentials are deleted after the first successful read; any later
    /// read fails until the user authorizes again.
    ConsumeOnce,
}

/// Reads and writes cached token sets for `(org_id, user_id)` pairs.
#[derive(Clone)]
pub struct CredentialAccessor {
    store: Arc<dyn KvStore>,
    policy: CredentialPolicy,
    ttl: Duration,
}

impl CredentialAccessor {
    pub fn new(store: Arc<dyn KvStore>, policy: CredentialPolicy, ttl: Duration) -> Self {
        Self { store, policy, ttl }
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.policy
    }

    /// Cache `tokens` for the user, replacing anything stored before.
    pub async fn store(&self, org_id: &str, user_id: &str, tokens: &TokenSet) -> LinkResult<()> {
        let value = serde_json::to_string(tokens).context("Failed to serialize token set")?;
        self.store
            .set(&credentials_key(org_id, user_id), &value, self.ttl)
            .await
            .context("Failed to store credentials")?;
        Ok(())
    }

    /// Fetch the cached token set for the user.
    ///
    /// Under `ConsumeOnce` the entry is taken with a compare-and-delete, so
    /// concurrent readers of one cached set see at most one success.
    ///
    /// # Errors
    /// * `CredentialsNotFound` - nothing cached, the entry expired, or another
    ///   reader consumed it first
    /// * `InfrastructureFailure` - the store failed or holds an unreadable value
    pub async fn get(&self, org_id: &str, user_id: &str) -> LinkResult<TokenSet> {
        let key = credentials_key(org_id, user_id);
        let value = self
            .store
            .get(&key)
            .await
            .context("Failed to read credentials")?
            .ok_or(LinkError::CredentialsNotFound)?;

        let tokens: TokenSet = serde_json::from_str(&value)
            .context("Stored credentials are not a valid token set")?;

        if self.policy == CredentialPolicy::ConsumeOnce {
            debug!(org_id = %org_id, user_id = %user_id, "Consuming cached credentials");
            let taken = self
                .store
                .delete_if_eq(&key, &value)
                .await
                .context("Failed to consume credentials")?;
            if !taken {
                warn!(
                    org_id = %org_id,
                    user_id = %user_id,
                    "Cached credentials consumed by a concurrent reader"
                );
                return Err(LinkError::CredentialsNotFound);
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn accessor(
        policy: CredentialPolicy,
        ttl: Duration,
    ) -> (CredentialAccessor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CredentialAccessor::new(store.clone(), policy, ttl), store)
    }

    fn tokens() -> TokenSet {
        TokenSet {
            access_token: "CJSP5qf1KhICAQEY".to_string(),
            refresh_token: Some("6f18f21e-a743-4509".to_string()),
            expires_in: 1800,
            token_type: Some("bearer".to_string()),
            extra: Map::new(),
        }
    }

    #[test]
    fn test_token_set_keeps_provider_fields() {
        let json = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 1800,
            "token_type": "bearer",
            "hub_id": 12345
        }"#;

        let tokens: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_in, 1800);
        assert_eq!(tokens.extra["hub_id"], 12345);

        let back = serde_json::to_value(&tokens).unwrap();
        assert_eq!(back["hub_id"], 12345);
    }

    #[test]
    fn test_token_set_minimal() {
        let tokens: TokenSet = serde_json::from_str(r#"{"access_token": "at"}"#).unwrap();
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_in, 0);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", tokens());
        assert!(!debug.contains("CJSP5qf1KhICAQEY"));
        assert!(!debug.contains("6f18f21e"));
    }

    #[tokio::test]
    async fn test_absent_credentials_not_found() {
        let (accessor, _) = accessor(CredentialPolicy::Retain, Duration::from_secs(3600));
        let err = accessor.get("org", "alice").await.unwrap_err();
        assert!(matches!(err, LinkError::CredentialsNotFound));
    }

    #[tokio::test]
    async fn test_store_then_get() {
        let (accessor, _) = accessor(CredentialPolicy::Retain, Duration::from_secs(3600));
        accessor.store("org", "alice", &tokens()).await.unwrap();

        let read = accessor.get("org", "alice").await.unwrap();
        assert_eq!(read, tokens());

        // Retained for a second read
        assert!(accessor.get("org", "alice").await.is_ok());
        // Scoped per user
        assert!(matches!(
            accessor.get("org", "bob").await,
            Err(LinkError::CredentialsNotFound)
        ));
    }

    #[tokio::test]
    async fn test_consume_once() {
        let (accessor, store) =
            accessor(CredentialPolicy::ConsumeOnce, Duration::from_secs(3600));
        accessor.store("org", "alice", &tokens()).await.unwrap();

        assert!(accessor.get("org", "alice").await.is_ok());
        assert!(store.is_empty());
        assert!(matches!(
            accessor.get("org", "alice").await,
            Err(LinkError::CredentialsNotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_credentials_not_found() {
        let (accessor, _) = accessor(CredentialPolicy::Retain, Duration::from_millis(10));
        accessor.store("org", "alice", &tokens()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(
            accessor.get("org", "alice").await,
            Err(LinkError::CredentialsNotFound)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_infrastructure_failure() {
        let (accessor, store) = accessor(CredentialPolicy::Retain, Duration::from_secs(60));
        store
            .set(&credentials_key("org", "alice"), "not json", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            accessor.get("org", "alice").await,
            Err(LinkError::InfrastructureFailure(_))
        ));
    }

    /// Hands every reader the cached value, then lets another consumer take
    /// it before the reader's own delete lands.
    struct RacingStore {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl KvStore for RacingStore {
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
            self.inner.set(key, value, ttl).await
        }

        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            let value = self.inner.get(key).await?;
            self.inner.delete(key).await?;
            Ok(value)
        }

        async fn delete(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.delete(key).await
        }

        async fn delete_if_eq(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
            self.inner.delete_if_eq(key, expected).await
        }

        async fn purge_expired(&self) -> anyhow::Result<usize> {
            self.inner.purge_expired().await
        }
    }

    #[tokio::test]
    async fn test_consume_once_loses_race_to_concurrent_reader() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
        });
        let accessor = CredentialAccessor::new(
            store.clone(),
            CredentialPolicy::ConsumeOnce,
            Duration::from_secs(3600),
        );
        accessor.store("org", "alice", &tokens()).await.unwrap();

        assert!(matches!(
            accessor.get("org", "alice").await,
            Err(LinkError::CredentialsNotFound)
        ));
    }

    #[tokio::test]
    async fn test_retain_ignores_concurrent_readers() {
        let store = Arc::new(RacingStore {
            inner: MemoryStore::new(),
        });
        let accessor = CredentialAccessor::new(
            store.clone(),
            CredentialPolicy::Retain,
            Duration::from_secs(3600),
        );
        accessor.store("org", "alice", &tokens()).await.unwrap();

        assert_eq!(accessor.get("org", "alice").await.unwrap(), tokens());
    }

    #[tokio::test]
    async fn test_consume_once_concurrent_reads_succeed_once() {
        let (accessor, _) = accessor(CredentialPolicy::ConsumeOnce, Duration::from_secs(3600));
        accessor.store("org", "alice", &tokens()).await.unwrap();

        let (first, second) = tokio::join!(
            accessor.get("org", "alice"),
            accessor.get("org", "alice"),
        );
        assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    }
}
