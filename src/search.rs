//! # Location Search
//!
//! Typeahead over the backend's targeting-location index. Keystrokes
//! arrive faster than we want to query, so scheduling goes through an
//! explicit [`Debouncer`]: each new schedule cancels the one before it,
//! and only a call that survives the full delay reaches the network.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ApiClient;
use crate::config::SearchConfig;
use crate::error::ApiError;
use crate::models::LocationHit;

/// Queries shorter than this never reach the network.
pub const MIN_QUERY_CHARS: usize = 2;

/// Cancel-and-reschedule primitive: at most one pending call at a time.
///
/// Clones share the same pending slot, so any clone can supersede a call
/// scheduled through another.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedule `call` to run after the delay. The previously scheduled
    /// call, if it has not fired yet, resolves to `None` instead of
    /// running; a call that has already started is left to finish.
    pub fn schedule<F>(&self, call: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.swap_pending(Some(token.clone())) {
            previous.cancel();
        }

        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => None,
                _ = tokio::time::sleep(delay) => Some(call.await),
            }
        })
    }

    /// Cancel the pending call without scheduling a replacement.
    pub fn cancel_pending(&self) {
        if let Some(previous) = self.swap_pending(None) {
            previous.cancel();
        }
    }

    fn swap_pending(&self, next: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut slot = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, next)
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer").field("delay", &self.delay).finish()
    }
}

/// Debounced front end for `GET /meta/location-search`.
#[derive(Clone)]
pub struct LocationSearcher {
    api: ApiClient,
    debouncer: Debouncer,
}

impl LocationSearcher {
    pub fn new(api: ApiClient, config: SearchConfig) -> Self {
        Self {
            api,
            debouncer: Debouncer::new(Duration::from_millis(config.debounce_ms)),
        }
    }

    /// One-shot search with no debounce. Short queries resolve to an
    /// empty list without a request.
    pub async fn search(&self, query: &str) -> Result<Vec<LocationHit>, ApiError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS {
            return Ok(Vec::new());
        }
        counter!("adlaunch_location_searches_total").increment(1);
        let response = self.api.search_locations(query).await?;
        Ok(response.cities)
    }

    /// Debounced search for interactive input. Resolves to `None` when a
    /// newer query superseded this one before its delay elapsed. A short
    /// query cancels whatever is pending and resolves to an empty list
    /// immediately.
    pub fn search_debounced(
        &self,
        query: &str,
    ) -> JoinHandle<Option<Result<Vec<LocationHit>, ApiError>>> {
        let query = query.trim().to_string();
        if query.chars().count() < MIN_QUERY_CHARS {
            debug!(query = %query, "query below minimum length; clearing pending search");
            self.debouncer.cancel_pending();
            return tokio::spawn(async { Some(Ok(Vec::new())) });
        }

        let searcher = self.clone();
        self.debouncer.schedule(async move { searcher.search(&query).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn a_scheduled_call_runs_after_the_delay() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let handle = debouncer.schedule(async { 7 });
        assert_eq!(handle.await.unwrap(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn a_newer_schedule_supersedes_the_pending_one() {
        let ran = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        let first_ran = ran.clone();
        let first = debouncer.schedule(async move {
            first_ran.fetch_add(1, Ordering::SeqCst);
            1
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second_ran = ran.clone();
        let second = debouncer.schedule(async move {
            second_ran.fetch_add(1, Ordering::SeqCst);
            2
        });

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some(2));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn a_call_past_its_delay_is_not_cancelled() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let first = debouncer.schedule(async {
            // Runs only after the delay already elapsed.
            tokio::time::sleep(Duration::from_millis(500)).await;
            1
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = debouncer.schedule(async { 2 });

        assert_eq!(first.await.unwrap(), Some(1));
        assert_eq!(second.await.unwrap(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_drops_the_scheduled_call() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let handle = debouncer.schedule(async { 1 });
        debouncer.cancel_pending();
        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn short_queries_resolve_empty_and_cancel_pending() {
        let api = ApiClient::new(url::Url::parse("http://localhost:8000").unwrap()).unwrap();
        let searcher = LocationSearcher::new(api, SearchConfig { debounce_ms: 300 });
        let pending = searcher.search_debounced("berlin");
        let short = searcher.search_debounced("b");

        assert!(pending.await.unwrap().is_none());
        let hits = short.await.unwrap().unwrap().unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn short_one_shot_query_skips_the_network() {
        // Unroutable base URL; reaching the network would error.
        let api = ApiClient::new(url::Url::parse("http://localhost:1").unwrap()).unwrap();
        let searcher = LocationSearcher::new(api, SearchConfig { debounce_ms: 300 });
        let hits = searcher.search("  a ").await.unwrap();
        assert!(hits.is_empty());
    }
}
