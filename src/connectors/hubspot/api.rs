use crate::error::{LinkError, LinkResult};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One page of a v3 objects listing.
#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    #[serde(default)]
    after: Option<Value>,
}

impl ListingPage {
    /// Cursor for the following page, if the provider sent one.
    fn next_cursor(&self) -> Option<String> {
        let after = self.paging.as_ref()?.next.as_ref()?.after.as_ref()?;
        match after {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// HTTP client for the HubSpot CRM listing endpoints.
///
/// Authenticates every request with a Bearer token. Request timeouts come
/// from the shared `reqwest::Client`.
pub struct HubSpotClient {
    access_token: String,
    http_client: Client,
    base_url: String,
    max_pages: usize,
}

impl HubSpotClient {
    pub fn new(
        http_client: Client,
        access_token: String,
        base_url: String,
        max_pages: usize,
    ) -> Self {
        Self {
            access_token,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_pages,
        }
    }

    /// Walk a cursor-paginated listing to the end and return every raw record
    /// in page order.
    ///
    /// Pages are requested one at a time, since each cursor comes from the
    /// previous response. Any failed page aborts the whole walk and the
    /// records gathered so far are dropped. Reaching `max_pages` while the
    /// provider still returns a cursor is also a failure.
    pub async fn fetch_all(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> LinkResult<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut records = Vec::new();
        let mut after: Option<String> = None;

        for page in 1..=self.max_pages {
            let mut query: Vec<(&str, &str)> = params
                .iter()
                .filter(|(k, _)| k != "after")
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            if let Some(cursor) = after.as_deref() {
                query.push(("after", cursor));
            }

            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| LinkError::fetch(path, None, format!("request failed: {}", e)))?;

            let response = check_response_status(path, response).await?;
            let listing: ListingPage = response.json().await.map_err(|e| {
                LinkError::fetch(path, None, format!("failed to parse page {}: {}", page, e))
            })?;

            let cursor = listing.next_cursor();
            debug!(
                endpoint = %path,
                page,
                count = listing.results.len(),
                has_next = cursor.is_some(),
                "Fetched listing page"
            );
            records.extend(listing.results);

            match cursor {
                Some(next) => after = Some(next),
                None => return Ok(records),
            }
        }

        Err(LinkError::fetch(
            path,
            None,
            format!("page limit of {} exceeded", self.max_pages),
        ))
    }
}

/// Map a non-2xx response to `FetchFailed`.
///
/// - 401 → token expired or invalid
/// - 429 → rate limited (reports `Retry-After`)
/// - Other non-2xx → provider body kept for diagnostics
async fn check_response_status(path: &str, response: Response) -> LinkResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match status {
        StatusCode::UNAUTHORIZED => "HubSpot auth error: token expired or invalid".to_string(),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            format!("HubSpot rate limit exceeded (Retry-After: {})", retry_after)
        }
        _ => response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string()),
    };

    Err(LinkError::fetch(path, Some(status.as_u16()), message))
}
