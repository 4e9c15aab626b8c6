//! Authorization code to token exchange.

use super::provider::OAuthProvider;
use crate::credentials::TokenSet;
use crate::error::{LinkError, LinkResult};
use std::collections::HashMap;

/// Exchange an authorization code for a token set.
///
/// POSTs the standard form body to the provider's token endpoint. Transport
/// failures, non-2xx responses and unparsable bodies all become
/// `TokenExchangeFailed`; the provider's body is kept for diagnostics.
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    provider: &OAuthProvider,
    code: &str,
) -> LinkResult<TokenSet> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("client_id", provider.client_id.as_str());
    form_data.insert("client_secret", provider.client_secret.as_str());
    form_data.insert("redirect_uri", provider.redirect_uri.as_str());
    form_data.insert("code", code);

    tracing::debug!(token_url = %provider.token_url, "Exchanging authorization code for token");

    let response = client
        .post(&provider.token_url)
        .header("Accept", "application/json")
        .form(&form_data)
        .send()
        .await
        .map_err(|e| LinkError::TokenExchangeFailed {
            status: None,
            body: format!("request failed: {}", e),
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| LinkError::TokenExchangeFailed {
        status: Some(status.as_u16()),
        body: format!("failed to read response: {}", e),
    })?;

    if !status.is_success() {
        return Err(LinkError::TokenExchangeFailed {
            status: Some(status.as_u16()),
            body,
        });
    }

    let tokens: TokenSet =
        serde_json::from_str(&body).map_err(|e| LinkError::TokenExchangeFailed {
            status: Some(status.as_u16()),
            body: format!("unparsable token response: {}", e),
        })?;

    tracing::debug!(
        has_refresh_token = tokens.refresh_token.is_some(),
        expires_in = tokens.expires_in,
        "Token exchange successful"
    );

    Ok(tokens)
}
