//! Wikipedia REST page-summary connector

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{request_error, SearchConnector, SearchError, SearchQuery};
use crate::models::{Source, SourceKind};

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org";
const WIKIPEDIA_CREDIBILITY: f32 = 0.9;
/// Summary lookups per query; one request per derived term
const MAX_TERMS: usize = 3;

/// Looks up page summaries for the top derived search terms
pub struct WikipediaConnector {
    client: Client,
    base_url: String,
}

impl WikipediaConnector {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint; used by tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_summary(&self, term: &str) -> Result<Option<Source>, SearchError> {
        let title = term.replace(' ', "_");
        let url = format!("{}/api/rest_v1/page/summary/{}", self.base_url, title);

        debug!(term = %term, "Fetching Wikipedia summary");

        let response = self.client.get(&url).send().await.map_err(request_error)?;
        let status = response.status();

        // Unknown pages are a normal outcome, not a source failure
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream { status: status.as_u16(), message });
        }

        let summary: PageSummary = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        if summary.title.is_empty() || summary.extract.is_empty() {
            return Ok(None);
        }

        let page_url = summary
            .content_urls
            .and_then(|u| u.desktop)
            .map(|d| d.page)
            .unwrap_or_else(|| format!("{}/wiki/{}", self.base_url, title));

        Ok(Some(Source::new(
            page_url,
            summary.title,
            summary.extract,
            SourceKind::Encyclopedia,
            WIKIPEDIA_CREDIBILITY,
        )))
    }
}

#[async_trait]
impl SearchConnector for WikipediaConnector {
    fn id(&self) -> &'static str {
        "wikipedia"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Encyclopedia
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Source>, SearchError> {
        let mut sources = Vec::new();
        for term in query.terms.iter().take(MAX_TERMS) {
            if let Some(source) = self.fetch_summary(term).await? {
                sources.push(source);
            }
        }
        Ok(sources)
    }
}

// Wire types
#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<DesktopUrls>,
}

#[derive(Debug, Deserialize)]
struct DesktopUrls {
    page: String,
}
