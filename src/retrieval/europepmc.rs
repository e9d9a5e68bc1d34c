use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::SearchResponse;
use crate::model::Hit;

pub const API_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

/// Largest page the search service returns.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Cursor that starts a new result set.
pub const FIRST_CURSOR: &str = "*";

/// Outcome of a single literature search request.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Europe PMC rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Europe PMC server error ({code}): {message}")]
    Server { code: u16, message: String },

    #[error("Europe PMC rejected the query ({code}): {message}")]
    Client { code: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::Decode(e.to_string())
        } else {
            SearchError::Network(e)
        }
    }
}

impl SearchError {
    /// Rate limits, server errors, timeouts and connection failures are worth
    /// another attempt; a rejected or unreadable query is not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SearchError::RateLimited { .. }
                | SearchError::Server { .. }
                | SearchError::Timeout
                | SearchError::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SearchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// One page of a cursor-paginated result set.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub hit_count: u64,
    pub next_cursor: Option<String>,
    pub hits: Vec<Hit>,
}

/// Abstraction for the paginated literature search.
/// Implemented by `EuropePmcClient` for production; mock implementations used in tests.
pub trait LiteratureSearch {
    async fn search_page(
        &self,
        query: &str,
        cursor: &str,
        page_size: u32,
    ) -> Result<Page, SearchError>;
}

#[derive(Clone)]
pub struct EuropePmcClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl EuropePmcClient {
    pub fn new(http: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

impl LiteratureSearch for EuropePmcClient {
    async fn search_page(
        &self,
        query: &str,
        cursor: &str,
        page_size: u32,
    ) -> Result<Page, SearchError> {
        // POST keeps long synonym queries clear of URI length limits
        let url = format!("{}/searchPOST", self.base_url);
        let page_size = page_size.min(MAX_PAGE_SIZE).to_string();

        let response = self
            .http
            .post(&url)
            .header("User-Agent", crate::USER_AGENT)
            .form(&[
                ("query", query),
                ("resultType", "core"),
                ("format", "json"),
                ("pageSize", page_size.as_str()),
                ("cursorMark", cursor),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::SERVICE_UNAVAILABLE && retry_after.is_some())
        {
            warn!(status = %status, ?retry_after, "Europe PMC rate limited");
            return Err(SearchError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            let message = format!("HTTP {status}: {}", text.chars().take(200).collect::<String>());
            return Err(if status.is_server_error() {
                SearchError::Server { code, message }
            } else {
                SearchError::Client { code, message }
            });
        }

        let body: SearchResponse = response.json().await?;
        let hits: Vec<Hit> = body
            .result_list
            .result
            .into_iter()
            .filter_map(|record| record.into_hit())
            .collect();
        debug!(
            cursor,
            hit_count = body.hit_count,
            page = hits.len(),
            "europe pmc page fetched"
        );

        Ok(Page {
            hit_count: body.hit_count,
            next_cursor: body.next_cursor_mark,
            hits,
        })
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
