//! NewsAPI `/v2/everything` connector

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{request_error, SearchConnector, SearchError, SearchQuery};
use crate::models::{Source, SourceKind};

const DEFAULT_BASE_URL: &str = "https://newsapi.org";
const PAGE_SIZE: usize = 5;

/// Keyword search over news articles, credibility weighted by outlet tier
pub struct NewsApiConnector {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl NewsApiConnector {
    pub fn new(api_key: SecretString, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint; used by tests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Credibility weight for a news outlet by name
pub fn outlet_credibility(outlet: &str) -> f32 {
    const HIGH: [&str; 5] = ["reuters", "associated press", "bbc", "npr", "pbs"];
    const MEDIUM: [&str; 5] = ["cnn", "fox news", "msnbc", "wall street journal", "new york times"];

    let outlet = outlet.to_lowercase();
    if HIGH.iter().any(|name| outlet.contains(name)) {
        0.9
    } else if MEDIUM.iter().any(|name| outlet.contains(name)) {
        0.7
    } else {
        0.5
    }
}

#[async_trait]
impl SearchConnector for NewsApiConnector {
    fn id(&self) -> &'static str {
        "newsapi"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Source>, SearchError> {
        let url = format!("{}/v2/everything", self.base_url);

        debug!(query = %query.text, "Searching NewsAPI");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query.text.as_str()),
                ("apiKey", self.api_key.expose_secret()),
                ("sortBy", "relevancy"),
                ("pageSize", &PAGE_SIZE.to_string()),
                ("language", "en"),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Upstream { status: status.as_u16(), message });
        }

        let body: EverythingResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let sources = body
            .articles
            .into_iter()
            .filter(|article| !article.url.is_empty() && !article.title.is_empty())
            .map(|article| {
                let outlet = article.source.map(|s| s.name).unwrap_or_default();
                let content = match (&article.description, &article.content) {
                    (Some(d), Some(c)) => format!("{} {}", d, c),
                    (Some(d), None) => d.clone(),
                    (None, Some(c)) => c.clone(),
                    (None, None) => String::new(),
                };
                Source::new(
                    article.url,
                    article.title,
                    content,
                    SourceKind::News,
                    outlet_credibility(&outlet),
                )
                .with_published_at(article.published_at)
            })
            .collect();

        Ok(sources)
    }
}

// Wire types
#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: String,
}
