//! OAuth 2.0 authorization code flow against HubSpot.
//!
//! 1. Caller asks for an authorization URL for `(org_id, user_id)`
//! 2. A state record with a random nonce is stored for that pair (10 min TTL)
//! 3. User consents on HubSpot, which redirects to the callback
//! 4. Callback state is checked against the stored record (CSRF defense)
//! 5. Code is exchanged for tokens while the state record is deleted
//! 6. Tokens are cached for the pair; the consent window can close

mod exchange;
mod provider;
mod state;

pub use exchange::exchange_code_for_token;
pub use provider::OAuthProvider;
pub use state::OAuthState;

use crate::credentials::{CredentialAccessor, TokenSet};
use crate::error::{LinkError, LinkResult};
use crate::store::{state_key, KvStore};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Query parameters HubSpot sends to the redirect URI
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Drives the authorization and callback steps for one provider.
#[derive(Clone)]
pub struct OAuthFlow {
    provider: OAuthProvider,
    http: reqwest::Client,
    store: Arc<dyn KvStore>,
    credentials: CredentialAccessor,
    state_ttl: Duration,
}

impl OAuthFlow {
    pub fn new(
        provider: OAuthProvider,
        http: reqwest::Client,
        store: Arc<dyn KvStore>,
        credentials: CredentialAccessor,
        state_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            http,
            store,
            credentials,
            state_ttl,
        }
    }

    pub fn credentials(&self) -> &CredentialAccessor {
        &self.credentials
    }

    /// Start an authorization for the user and return the consent URL.
    ///
    /// Replaces any pending state for the same pair, so only the most recent
    /// consent URL can complete.
    pub async fn authorize(&self, user_id: &str, org_id: &str) -> LinkResult<String> {
        let state = OAuthState::generate(user_id, org_id);
        let record = serde_json::to_string(&state).context("Failed to serialize OAuth state")?;

        self.store
            .set(&state_key(org_id, user_id), &record, self.state_ttl)
            .await
            .context("Failed to store OAuth state")?;

        let encoded = state.encode().context("Failed to encode OAuth state")?;

        info!(org_id = %org_id, user_id = %user_id, "Issued HubSpot authorization URL");
        Ok(self.provider.build_auth_url(&encoded))
    }

    /// Complete an authorization from the provider's redirect.
    ///
    /// Returns the `(org_id, user_id)` the tokens were stored for.
    ///
    /// # Security
    /// - State is validated before any token exchange
    /// - Single-use state (deleted alongside the exchange)
    /// - A state consumed by a concurrent callback invalidates this one
    pub async fn handle_callback(&self, params: CallbackParams) -> LinkResult<(String, String)> {
        if let Some(error) = params.error {
            warn!(error = %error, "HubSpot authorization was denied");
            return Err(LinkError::ProviderDenied {
                error,
                description: params.error_description,
            });
        }

        let code = non_empty(params.code)
            .ok_or_else(|| LinkError::MalformedCallback("missing 'code' parameter".to_string()))?;
        let encoded_state = non_empty(params.state)
            .ok_or_else(|| LinkError::MalformedCallback("missing 'state' parameter".to_string()))?;

        let presented = OAuthState::decode(&encoded_state).ok_or_else(|| {
            warn!("Callback state could not be decoded");
            LinkError::StateMismatch
        })?;
        let org_id = presented.org_id.clone();
        let user_id = presented.user_id.clone();
        let key = state_key(&org_id, &user_id);

        let record = self.verify_state(&key, &presented).await?;
        debug!(org_id = %org_id, user_id = %user_id, "OAuth state validated");

        // Only the record we validated is removed; a newer authorize keeps its state
        let (exchanged, deleted) = tokio::join!(
            exchange_code_for_token(&self.http, &self.provider, &code),
            self.store.delete_if_eq(&key, &record),
        );

        match deleted {
            Ok(true) => {}
            Ok(false) => {
                // Consumed by a concurrent callback or replaced by a newer authorize.
                warn!(
                    org_id = %org_id,
                    user_id = %user_id,
                    "OAuth state changed before it could be consumed"
                );
                return Err(LinkError::StateMismatch);
            }
            Err(e) => {
                warn!(
                    org_id = %org_id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to delete OAuth state"
                );
            }
        }

        let tokens: TokenSet = exchanged.inspect_err(|e| {
            warn!(org_id = %org_id, user_id = %user_id, error = %e, "Token exchange failed");
        })?;

        self.credentials.store(&org_id, &user_id, &tokens).await?;

        info!(
            org_id = %org_id,
            user_id = %user_id,
            has_refresh_token = tokens.refresh_token.is_some(),
            "HubSpot OAuth flow completed"
        );

        Ok((org_id, user_id))
    }

    /// Check the presented state against the stored one and return the
    /// stored record as read.
    async fn verify_state(&self, key: &str, presented: &OAuthState) -> LinkResult<String> {
        let stored = self
            .store
            .get(key)
            .await
            .context("Failed to read OAuth state")?;

        match stored {
            Some(record)
                if serde_json::from_str::<OAuthState>(&record)
                    .is_ok_and(|stored| stored.nonce_matches(presented)) =>
            {
                Ok(record)
            }
            _ => {
                warn!(
                    org_id = %presented.org_id,
                    user_id = %presented.user_id,
                    "Invalid or expired OAuth state (possible CSRF attack)"
                );
                Err(LinkError::StateMismatch)
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
