//! External source connectors for evidence retrieval
//!
//! Each connector wraps one public lookup API behind the same trait so the
//! gatherer can fan a query out without caring which backends are
//! configured. Connectors stay pure retrieval: relevance scoring, caching,
//! and rate limiting belong to the gatherer.

pub mod google;
pub mod mock;
pub mod newsapi;
pub mod wikipedia;

pub use google::GoogleSearchConnector;
pub use newsapi::NewsApiConnector;
pub use wikipedia::WikipediaConnector;

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::models::{Source, SourceKind};

/// Search layer errors
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("No search connectors are configured")]
    NoConnectors,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SearchError {
    /// Whether retrying the same source can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout(_) | SearchError::RequestFailed(_) => true,
            SearchError::Upstream { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// Map transport failures onto the timeout/request split
pub(crate) fn request_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout(e.to_string())
    } else {
        SearchError::RequestFailed(e.to_string())
    }
}

/// A sub-claim query prepared by the gatherer
///
/// `text` is the full sub-claim sentence; `terms` are the derived search
/// terms in priority order. Keyword APIs use the text, the encyclopedia
/// lookup uses the terms.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub terms: Vec<String>,
}

/// One external information source
#[async_trait]
pub trait SearchConnector: Send + Sync {
    /// Stable identifier, used for cache keys and rate-limit buckets
    fn id(&self) -> &'static str;

    fn kind(&self) -> SourceKind;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Source>, SearchError>;
}

/// Minimum-delay rate limiter, tracked per source
pub struct RateLimiter {
    last_request: DashMap<&'static str, Instant>,
    min_delay: Duration,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            last_request: DashMap::new(),
            min_delay,
        }
    }

    /// Sleep until `source` is allowed to issue its next request
    pub async fn acquire(&self, source: &'static str) {
        let now = Instant::now();
        let wait = self.last_request.get(source).and_then(|last| {
            let elapsed = now.duration_since(*last);
            self.min_delay.checked_sub(elapsed)
        });

        if let Some(wait) = wait {
            debug!("Rate limiting {} for {:?}", source, wait);
            tokio::time::sleep(wait).await;
        }
        self.last_request.insert(source, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SearchError::Timeout("t".into()).is_retryable());
        assert!(SearchError::Upstream { status: 429, message: String::new() }.is_retryable());
        assert!(SearchError::Upstream { status: 500, message: String::new() }.is_retryable());
        assert!(!SearchError::Upstream { status: 404, message: String::new() }.is_retryable());
        assert!(!SearchError::InvalidResponse("bad".into()).is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();
        limiter.acquire("wikipedia").await;
        limiter.acquire("wikipedia").await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_buckets_are_independent() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();
        limiter.acquire("wikipedia").await;
        limiter.acquire("newsapi").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
