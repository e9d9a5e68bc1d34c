pub mod europepmc;
mod types;

pub use europepmc::{EuropePmcClient, LiteratureSearch, Page, SearchError};

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::model::{Hit, SearchExpression};
use europepmc::FIRST_CURSOR;

const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: SearchError },

    #[error("query rejected: {source}")]
    Rejected { source: SearchError },

    #[error("cancelled before completion")]
    Cancelled,
}

/// Bounded exponential backoff for transient search failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Equal jitter backoff: base/2 + rand(0, base/2), capped at `max_backoff`.
    /// A server-supplied `retry_after` is a floor.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff);
        let half = base.as_millis() as u64 / 2;
        let jittered = Duration::from_millis(half + fastrand::u64(..half.max(1)));
        retry_after.map_or(jittered, |floor| jittered.max(floor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalSettings {
    /// Expressions retrieved concurrently.
    pub workers: usize,
    pub page_size: u32,
    /// Page cap per expression.
    pub max_pages: u32,
    pub retry: RetryPolicy,
}

/// Raw hits of one expression, in service order.
#[derive(Debug, Clone, Default)]
pub struct Retrieved {
    pub declared_total: u64,
    pub hits: Vec<Hit>,
    pub pages: u32,
    pub truncated: bool,
}

/// Runs search expressions against a `LiteratureSearch` with bounded
/// concurrency, sequential pagination and retry.
pub struct Dispatcher<'a, S> {
    search: &'a S,
    settings: RetrievalSettings,
    cancel: watch::Receiver<bool>,
}

impl<'a, S: LiteratureSearch> Dispatcher<'a, S> {
    /// `cancel` flips to `true` to abandon outstanding work.
    pub fn new(search: &'a S, settings: RetrievalSettings, cancel: watch::Receiver<bool>) -> Self {
        Self {
            search,
            settings,
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.settings.workers.max(1)
    }

    /// Retrieve every expression, at most `workers` at a time. Results come back
    /// in input order; one failure never affects its siblings.
    pub async fn execute_all(
        &self,
        expressions: &[SearchExpression],
    ) -> Vec<Result<Retrieved, RetrievalError>> {
        let mut outcomes: Vec<(usize, Result<Retrieved, RetrievalError>)> =
            stream::iter(expressions.iter().enumerate())
                .map(|(i, expr)| async move { (i, self.execute(expr).await) })
                .buffer_unordered(self.workers())
                .collect()
                .await;
        outcomes.sort_by_key(|(i, _)| *i);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Page through one expression until the declared total is reached, the
    /// cursor stops advancing, a page comes back empty or the page cap is hit.
    pub async fn execute(&self, expression: &SearchExpression) -> Result<Retrieved, RetrievalError> {
        let mut cursor = FIRST_CURSOR.to_string();
        let mut retrieved = Retrieved::default();

        while retrieved.pages < self.settings.max_pages.max(1) {
            let page = self.fetch_with_retry(&expression.query, &cursor).await?;
            retrieved.pages += 1;
            retrieved.declared_total = page.hit_count;

            let empty = page.hits.is_empty();
            retrieved.hits.extend(page.hits);
            if empty || retrieved.hits.len() as u64 >= retrieved.declared_total {
                break;
            }
            match page.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }

        retrieved.truncated = (retrieved.hits.len() as u64) < retrieved.declared_total;
        if retrieved.truncated {
            debug!(
                query = %expression.query,
                retrieved = retrieved.hits.len(),
                total = retrieved.declared_total,
                pages = retrieved.pages,
                "retrieval stopped before declared total"
            );
        }
        Ok(retrieved)
    }

    async fn fetch_with_retry(&self, query: &str, cursor: &str) -> Result<Page, RetrievalError> {
        let retry = self.settings.retry;
        let mut attempt = 0;
        loop {
            let outcome = self
                .cancellable(self.search.search_page(query, cursor, self.settings.page_size))
                .await?;
            match outcome {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retriable() && attempt < retry.max_retries => {
                    let delay = retry.delay(attempt, e.retry_after());
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    self.cancellable(tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
                Err(e) if e.is_retriable() => {
                    return Err(RetrievalError::Exhausted {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                Err(e) => return Err(RetrievalError::Rejected { source: e }),
            }
        }
    }

    /// Runs `fut` unless cancellation is requested first.
    pub(crate) async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, RetrievalError> {
        if *self.cancel.borrow() {
            return Err(RetrievalError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancelled(self.cancel.clone()) => Err(RetrievalError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// Resolves once cancellation is requested; never, if the sender is gone.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
