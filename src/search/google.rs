//! Google Custom Search connector

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{request_error, SearchConnector, SearchError, SearchQuery};
use crate::models::{Source, SourceKind};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
const RESULT_COUNT: usize = 5;

/// General web search, credibility weighted by result domain
pub struct GoogleSearchConnector {
    client: Client,
    api_key: SecretString,
    engine_id: String,
    base_url: String,
}

impl GoogleSearchConnector {
    pub fn new(
        api_key: SecretString,
        engine_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            engine_id: engine_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint; used by tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Credibility weight for a web result by its host
pub fn domain_credibility(link: &str) -> f32 {
    let Some(host) = Url::parse(link).ok().and_then(|u| u.host_str().map(str::to_lowercase)) else {
        return 0.5;
    };

    if host.contains("wikipedia.org")
        || host.contains("britannica.com")
        || host.ends_with(".gov")
        || host.ends_with(".edu")
    {
        0.9
    } else if host.contains("bbc.com") || host.contains("reuters.com") || host.contains("ap.org") {
        0.8
    } else {
        0.5
    }
}

#[async_trait]
impl SearchConnector for GoogleSearchConnector {
    fn id(&self) -> &'static str {
        "google"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Source>, SearchError> {
        let url = format!("{}/customsearch/v1", self.base_url);

        debug!(query = %query.text, "Searching Google Custom Search");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.expose_secret()),
                ("cx", &self.engine_id),
                ("q", &query.text),
                ("num", &RESULT_COUNT.to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream { status: status.as_u16(), message });
        }

        let body: CustomSearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let sources = body
            .items
            .into_iter()
            .filter(|item| !item.link.is_empty() && !item.title.is_empty())
            .map(|item| {
                let credibility = domain_credibility(&item.link);
                Source::new(item.link, item.title, item.snippet, SourceKind::Web, credibility)
            })
            .collect();

        Ok(sources)
    }
}

// Wire types
#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}
