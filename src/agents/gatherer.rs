//! Evidence gathering: cache-first source research per sub-claim

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::metrics::METRICS;
use crate::models::{Source, SubClaim};
use crate::search::{RateLimiter, SearchConnector, SearchError, SearchQuery};

static MULTIWORD_CAPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap());
static SINGLE_CAPS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]{2,}\b").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19\d{2}|20\d{2})\b").unwrap());

const TERM_STOPWORDS: [&str; 12] = [
    "The", "This", "That", "There", "Then", "They", "Their", "When", "Where", "What", "Who", "How",
];

const ACTION_WORDS: [&str; 9] =
    ["fell", "founded", "born", "died", "became", "was", "were", "is", "are"];

const MAX_TERMS: usize = 5;

/// Sources gathered for one sub-claim
#[derive(Debug, Clone)]
pub struct GatheredSubClaim {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Researches sub-claims against the configured external sources
///
/// Applies a cache-first policy per (connector, query) pair, rate-limits
/// live requests per connector, and skips failed sources so one broken
/// backend never takes a claim down.
pub struct EvidenceGatherer {
    connectors: Vec<Arc<dyn SearchConnector>>,
    cache: Arc<ResponseCache>,
    rate_limiter: RateLimiter,
    max_sources: usize,
    max_retries: usize,
}

impl EvidenceGatherer {
    pub fn new(
        connectors: Vec<Arc<dyn SearchConnector>>,
        cache: Arc<ResponseCache>,
        rate_limit_delay: Duration,
        max_sources: usize,
        max_retries: usize,
    ) -> Self {
        Self {
            connectors,
            cache,
            rate_limiter: RateLimiter::new(rate_limit_delay),
            max_sources,
            max_retries,
        }
    }

    /// Research every verifiable sub-claim
    ///
    /// Returns per-sub-claim source lists, deduplicated by URL across the
    /// whole claim, ranked by combined relevance and credibility, and
    /// truncated to the configured maximum.
    pub async fn research(&self, sub_claims: &[SubClaim]) -> Result<Vec<GatheredSubClaim>, SearchError> {
        if self.connectors.is_empty() {
            return Err(SearchError::NoConnectors);
        }

        let mut gathered = Vec::with_capacity(sub_claims.len());
        for sub_claim in sub_claims {
            if !sub_claim.verifiable {
                debug!(sub_claim = %sub_claim.text, "Skipping unverifiable sub-claim");
                gathered.push(GatheredSubClaim { text: sub_claim.text.clone(), sources: Vec::new() });
                continue;
            }

            let sources = self.research_sub_claim(&sub_claim.text).await;
            info!(sub_claim = %sub_claim.text, sources = sources.len(), "Researched sub-claim");
            gathered.push(GatheredSubClaim { text: sub_claim.text.clone(), sources });
        }

        self.dedup_rank_truncate(&mut gathered);
        Ok(gathered)
    }

    async fn research_sub_claim(&self, text: &str) -> Vec<Source> {
        let query = SearchQuery {
            text: text.to_string(),
            terms: derive_search_terms(text),
        };

        let mut sources = Vec::new();
        for connector in &self.connectors {
            let id = connector.id();

            if let Some(cached) = self.cache.get(id, &query.text).await {
                debug!(source = id, "Serving sources from cache");
                METRICS.cache_hits.inc();
                sources.extend(cached);
                continue;
            }
            METRICS.cache_misses.inc();

            self.rate_limiter.acquire(id).await;
            match self.search_with_retry(connector.as_ref(), &query).await {
                Ok(mut fetched) => {
                    for source in &mut fetched {
                        source.relevance = relevance_score(
                            &query.text,
                            &format!("{} {}", source.title, source.content),
                        );
                    }
                    METRICS.search_requests.with_label_values(&[id, "success"]).inc();
                    self.cache.put(id, &query.text, &fetched).await;
                    sources.extend(fetched);
                }
                Err(e) => {
                    // Graceful degradation: a failed source contributes
                    // nothing rather than failing the claim
                    warn!(source = id, "Source query failed, skipping: {}", e);
                    METRICS.search_requests.with_label_values(&[id, "error"]).inc();
                }
            }
        }
        sources
    }

    async fn search_with_retry(
        &self,
        connector: &dyn SearchConnector,
        query: &SearchQuery,
    ) -> Result<Vec<Source>, SearchError> {
        let mut last_error = None;
        for attempt in 0..self.max_retries.max(1) {
            if attempt > 0 {
                debug!("Retry attempt {} for source {}", attempt, connector.id());
                tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
            }

            match connector.search(query).await {
                Ok(sources) => return Ok(sources),
                Err(e) => {
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SearchError::RequestFailed("no attempts made".to_string())))
    }

    fn dedup_rank_truncate(&self, gathered: &mut [GatheredSubClaim]) {
        let mut seen = HashSet::new();
        let mut ranked: Vec<Source> = Vec::new();
        for sub_claim in gathered.iter() {
            for source in &sub_claim.sources {
                if !source.url.is_empty() && seen.insert(source.url.clone()) {
                    ranked.push(source.clone());
                }
            }
        }

        ranked.sort_by(|a, b| {
            b.ranking_score()
                .partial_cmp(&a.ranking_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.max_sources);

        let kept: HashSet<&str> = ranked.iter().map(|s| s.url.as_str()).collect();
        for sub_claim in gathered.iter_mut() {
            let mut kept_here = HashSet::new();
            sub_claim
                .sources
                .retain(|s| kept.contains(s.url.as_str()) && kept_here.insert(s.url.clone()));
        }
    }
}

/// Query-word overlap ratio of `query` against `text`
pub fn relevance_score(query: &str, text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let query_words: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let text_words: HashSet<String> = text.split_whitespace().map(str::to_lowercase).collect();

    let overlap = query_words.intersection(&text_words).count();
    overlap as f32 / query_words.len() as f32
}

/// Derive prioritized search terms from a sub-claim sentence
pub fn derive_search_terms(text: &str) -> Vec<String> {
    let multiword: Vec<String> = MULTIWORD_CAPS_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    let singles: Vec<String> = SINGLE_CAPS_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|word| !TERM_STOPWORDS.contains(&word.as_str()))
        .collect();

    let years: Vec<String> = YEAR_RE.find_iter(text).map(|m| m.as_str().to_string()).collect();

    let mut candidates = multiword;
    candidates.extend(singles.iter().take(3).cloned());
    candidates.extend(years);
    if singles.len() >= 2 {
        candidates.push(format!("{}_{}", singles[0], singles[1]));
    }

    let mut seen = HashSet::new();
    let mut terms: Vec<String> = candidates
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| t.len() > 1 && seen.insert(t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        terms = text
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|word| word.len() > 3 && !ACTION_WORDS.contains(&word.to_lowercase().as_str()))
            .take(3)
            .collect();
    }

    terms.truncate(MAX_TERMS);
    terms
}
