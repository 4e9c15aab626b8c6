use super::AppState;
use crate::credentials::TokenSet;
use crate::error::LinkResult;
use crate::item::NormalizedItem;
use crate::oauth::CallbackParams;
use axum::{
    extract::{Form, Query, State},
    response::{Html, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Returned to the consent popup; closes it once the flow completes.
pub const CLOSE_WINDOW_HTML: &str = "<html><script>window.close();</script></html>";

/// Identifies the user an operation acts for
#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    pub org_id: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

/// POST /integrations/hubspot/authorize
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    Form(user): Form<UserRef>,
) -> LinkResult<Json<AuthorizeResponse>> {
    debug!(org_id = %user.org_id, user_id = %user.user_id, "Authorization requested");
    let url = state.flow.authorize(&user.user_id, &user.org_id).await?;
    Ok(Json(AuthorizeResponse { url }))
}

/// GET /integrations/hubspot/oauth2callback
///
/// Provider redirect target. Errors come back as the JSON error body so the
/// popup shows what went wrong instead of closing.
pub async fn oauth2callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> LinkResult<Html<&'static str>> {
    state.flow.handle_callback(params).await?;
    Ok(Html(CLOSE_WINDOW_HTML))
}

/// GET /integrations/hubspot/credentials
pub async fn credentials(
    State(state): State<Arc<AppState>>,
    Query(user): Query<UserRef>,
) -> LinkResult<Json<TokenSet>> {
    let tokens = state.flow.credentials().get(&user.org_id, &user.user_id).await?;
    Ok(Json(tokens))
}

/// POST /integrations/hubspot/load
pub async fn load(
    State(state): State<Arc<AppState>>,
    Query(user): Query<UserRef>,
) -> LinkResult<Json<Vec<NormalizedItem>>> {
    let tokens = state.flow.credentials().get(&user.org_id, &user.user_id).await?;
    let items = state.loader.load_items(&tokens.access_token).await?;

    info!(
        org_id = %user.org_id,
        user_id = %user.user_id,
        count = items.len(),
        "Loaded HubSpot items"
    );
    Ok(Json(items))
}
