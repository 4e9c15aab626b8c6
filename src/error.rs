//! Error taxonomy for the HubSpot OAuth flow and item loading.
//!
//! Every failure surfaced to a caller is one of the [`LinkError`] variants.
//! Infrastructure code (stores, encryption, config) returns `anyhow::Result`
//! and is folded into [`LinkError::InfrastructureFailure`] at the service
//! boundary. Nothing here is retried internally.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Terminal failures of the OAuth flow, credential access and item loading.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The provider redirected back with an `error` parameter.
    #[error("authorization denied by provider: {error}{}", description_suffix(.description))]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// Required callback parameters are missing.
    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    /// The state parameter does not match a live, stored state.
    ///
    /// Deliberately carries no detail: absent, expired, undecodable and
    /// mismatched states are indistinguishable to the caller.
    #[error("invalid or expired OAuth state")]
    StateMismatch,

    /// The authorization code could not be exchanged for tokens.
    #[error("token exchange failed{}: {body}", status_suffix(.status))]
    TokenExchangeFailed { status: Option<u16>, body: String },

    /// No live credentials are stored for the requested user.
    #[error("no credentials found for this user")]
    CredentialsNotFound,

    /// A listing endpoint could not be walked to completion.
    #[error("failed to fetch {endpoint}{}: {message}", status_suffix(.status))]
    FetchFailed {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The key-value store (or another internal dependency) failed.
    #[error("infrastructure failure: {0:#}")]
    InfrastructureFailure(#[from] anyhow::Error),
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with status {}", s)).unwrap_or_default()
}

impl LinkError {
    /// Create a fetch error for an endpoint.
    pub fn fetch(
        endpoint: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::FetchFailed {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::ProviderDenied { .. } => "provider_denied",
            LinkError::MalformedCallback(_) => "malformed_callback",
            LinkError::StateMismatch => "state_mismatch",
            LinkError::TokenExchangeFailed { .. } => "token_exchange_failed",
            LinkError::CredentialsNotFound => "credentials_not_found",
            LinkError::FetchFailed { .. } => "fetch_failed",
            LinkError::InfrastructureFailure(_) => "infrastructure_failure",
        }
    }

    /// HTTP status returned to the calling surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LinkError::ProviderDenied { .. }
            | LinkError::MalformedCallback(_)
            | LinkError::StateMismatch => StatusCode::BAD_REQUEST,
            LinkError::CredentialsNotFound => StatusCode::NOT_FOUND,
            LinkError::TokenExchangeFailed { .. } | LinkError::FetchFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            LinkError::InfrastructureFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = match &self {
            LinkError::InfrastructureFailure(e) => {
                tracing::error!(error = %format!("{:#}", e), "Internal failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error: self.code(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result alias for the OAuth flow and loader.
pub type LinkResult<T> = std::result::Result<T, LinkError>;
