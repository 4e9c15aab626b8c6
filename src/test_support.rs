//! In-process stand-in for the HubSpot listing endpoints.
//!
//! Serves canned pages per object type in order and records what each
//! request carried, so tests can assert on cursors and auth headers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A listing page body with ids and an optional next cursor.
pub fn listing_page(ids: &[&str], next: Option<&str>) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "properties": {"name": format!("Record {}", id)}}))
        .collect();
    listing_page_of(results, next)
}

/// A listing page body wrapping arbitrary records.
pub fn listing_page_of(results: Vec<Value>, next: Option<&str>) -> Value {
    match next {
        Some(cursor) => json!({"results": results, "paging": {"next": {"after": cursor}}}),
        None => json!({"results": results}),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: HashMap<String, String>,
    pub after: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct StubState {
    pages: HashMap<String, Vec<(u16, Value)>>,
    requests: Mutex<HashMap<String, Vec<RecordedRequest>>>,
}

#[derive(Default)]
pub struct ListingStub {
    pages: HashMap<String, Vec<(u16, Value)>>,
}

impl ListingStub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next page served for `tag`.
    pub fn page(mut self, tag: &str, status: u16, body: Value) -> Self {
        self.pages.entry(tag.to_string()).or_default().push((status, body));
        self
    }

    pub async fn spawn(self) -> RunningStub {
        let state = Arc::new(StubState {
            pages: self.pages,
            requests: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/crm/v3/objects/:tag", get(serve_page))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        RunningStub {
            url: format!("http://{}", addr),
            state,
        }
    }
}

pub struct RunningStub {
    url: String,
    state: Arc<StubState>,
}

impl RunningStub {
    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn requests(&self, tag: &str) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }
}

async fn serve_page(
    State(state): State<Arc<StubState>>,
    Path(tag): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let served = {
        let mut requests = state.requests.lock().unwrap();
        let seen = requests.entry(tag.clone()).or_default();
        seen.push(RecordedRequest {
            after: query.get("after").cloned(),
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            query,
        });
        seen.len() - 1
    };

    match state.pages.get(&tag).and_then(|pages| pages.get(served)) {
        Some((status, body)) => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body.clone()),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": format!("no page queued for {}", tag)})),
        ),
    }
}
