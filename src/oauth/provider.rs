//! OAuth client settings for the provider and authorization URL building.

use crate::config::OAuthClientConfig;

/// Everything needed to talk to the provider's OAuth endpoints.
#[derive(Clone)]
pub struct OAuthProvider {
    /// Authorization (consent) endpoint URL
    pub auth_url: String,

    /// Token exchange endpoint URL
    pub token_url: String,

    pub scopes: Vec<String>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl OAuthProvider {
    /// Build authorization URL carrying the encoded state
    pub fn build_auth_url(&self, encoded_state: &str) -> String {
        let scopes = self.scopes.join(" ");
        let separator = if self.auth_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}client_id={}&redirect_uri={}&scope={}&state={}",
            self.auth_url,
            separator,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(encoded_state)
        )
    }
}

impl From<&OAuthClientConfig> for OAuthProvider {
    fn from(config: &OAuthClientConfig) -> Self {
        Self {
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}
