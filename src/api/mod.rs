//! HTTP surface for the HubSpot integration.
//!
//! Routes under `/integrations/hubspot`:
//! - `POST /authorize` (form `user_id`, `org_id`) → consent URL
//! - `GET /oauth2callback` → page that closes the consent window
//! - `GET /credentials?user_id&org_id` → cached token set
//! - `POST /load?user_id&org_id` → normalized items
//!
//! `GET /health` sits at the root.

mod hubspot;

use crate::config::{LinkConfig, ServerConfig};
use crate::connectors::HubSpotLoader;
use crate::credentials::CredentialAccessor;
use crate::oauth::{OAuthFlow, OAuthProvider};
use crate::store::KvStore;
use axum::{http::HeaderValue, response::Json, routing::get, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Shared application state for the integration routes
#[derive(Clone)]
pub struct AppState {
    pub flow: OAuthFlow,
    pub loader: HubSpotLoader,
}

impl AppState {
    /// Wire the flow and loader from resolved configuration.
    pub fn from_config(
        config: &LinkConfig,
        http: reqwest::Client,
        store: Arc<dyn KvStore>,
    ) -> Self {
        let credentials = CredentialAccessor::new(
            store.clone(),
            config.flow.credential_policy,
            Duration::from_secs(config.flow.credentials_ttl_seconds),
        );
        let flow = OAuthFlow::new(
            OAuthProvider::from(&config.oauth),
            http.clone(),
            store,
            credentials,
            Duration::from_secs(config.flow.state_ttl_seconds),
        );
        let loader = HubSpotLoader::new(http, &config.fetch);

        Self { flow, loader }
    }
}

/// Create the integration router without CORS.
pub fn create_router(state: AppState) -> Router {
    let integration = Router::new()
        .route("/authorize", post(hubspot::authorize))
        .route("/oauth2callback", get(hubspot::oauth2callback))
        .route("/credentials", get(hubspot::credentials))
        .route("/load", post(hubspot::load))
        .with_state(Arc::new(state));

    Router::new()
        .route("/health", get(health))
        .nest("/integrations/hubspot", integration)
}

/// Create the router with the configured CORS origins applied.
pub fn create_app(state: AppState, server: &ServerConfig) -> Router {
    create_router(state).layer(cors_layer(&server.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
