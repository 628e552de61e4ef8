//! Pipeline orchestrator
//!
//! Sequences the agents in a fixed order and guarantees a terminal verdict
//! for every claim that passes input validation: an unrecoverable stage
//! error is downgraded to an InsufficientEvidence report instead of
//! aborting the run.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::agents::{
    ClaimDecomposer, ClaimNormalizer, ContextClassifier, EvidenceGatherer, EvidenceSynthesizer,
};
use crate::cache::{CacheStats, ResponseCache};
use crate::config::Settings;
use crate::error::Result;
use crate::llm::{tokens, LlmRouter, ProviderStatus, RunUsage};
use crate::metrics::METRICS;
use crate::models::{SourceRef, VerificationReport};
use crate::search::{
    GoogleSearchConnector, NewsApiConnector, SearchConnector, WikipediaConnector,
};

/// Runs claims through the verification stages in order
pub struct VerificationPipeline {
    normalizer: ClaimNormalizer,
    classifier: ContextClassifier,
    decomposer: ClaimDecomposer,
    gatherer: EvidenceGatherer,
    synthesizer: EvidenceSynthesizer,
    router: Arc<LlmRouter>,
    cache: Arc<ResponseCache>,
}

impl VerificationPipeline {
    /// Build the pipeline from settings: providers in fallback order,
    /// connectors for every configured source, persistent cache on disk
    pub fn new(settings: &Settings) -> Result<Self> {
        let router = Arc::new(LlmRouter::from_settings(settings));
        let cache = Arc::new(ResponseCache::open(
            Path::new(&settings.processing.cache_path),
            settings.processing.cache_expiry(),
        )?);
        let connectors = Self::build_connectors(settings)?;
        Ok(Self::assemble(settings, router, cache, connectors))
    }

    /// Assembly with externally built parts; used by tests
    pub fn with_components(
        settings: &Settings,
        router: Arc<LlmRouter>,
        cache: Arc<ResponseCache>,
        connectors: Vec<Arc<dyn SearchConnector>>,
    ) -> Self {
        Self::assemble(settings, router, cache, connectors)
    }

    fn assemble(
        settings: &Settings,
        router: Arc<LlmRouter>,
        cache: Arc<ResponseCache>,
        connectors: Vec<Arc<dyn SearchConnector>>,
    ) -> Self {
        let estimator = tokens::shared_estimator();
        Self {
            normalizer: ClaimNormalizer::new(),
            classifier: ContextClassifier::new(),
            decomposer: ClaimDecomposer::new(
                Arc::clone(&router),
                settings.processing.max_sub_claims,
            ),
            gatherer: EvidenceGatherer::new(
                connectors,
                Arc::clone(&cache),
                settings.api_settings.rate_limit_delay(),
                settings.processing.max_sources_per_claim,
                settings.api_settings.max_retries,
            ),
            synthesizer: EvidenceSynthesizer::new(Arc::clone(&router), estimator),
            router,
            cache,
        }
    }

    fn build_connectors(settings: &Settings) -> Result<Vec<Arc<dyn SearchConnector>>> {
        let timeout = settings.api_settings.request_timeout();
        let keys = &settings.api_keys;

        let mut connectors: Vec<Arc<dyn SearchConnector>> =
            vec![Arc::new(WikipediaConnector::new(timeout)?)];

        if let Some(key) = keys.news_api_key.clone() {
            connectors.push(Arc::new(NewsApiConnector::new(key, timeout)?));
        } else {
            info!("NewsAPI key not configured, news source disabled");
        }

        match (keys.google_search_api_key.clone(), keys.google_search_engine_id.clone()) {
            (Some(key), Some(engine_id)) => {
                connectors.push(Arc::new(GoogleSearchConnector::new(key, engine_id, timeout)?));
            }
            _ => info!("Google Custom Search not configured, web source disabled"),
        }

        Ok(connectors)
    }

    /// Verify one claim end to end
    ///
    /// Errors only on input validation; any later stage failure is
    /// downgraded to an InsufficientEvidence report with the cause in the
    /// degradation note.
    #[instrument(skip(self, raw_text))]
    pub async fn verify(&self, raw_text: &str) -> Result<VerificationReport> {
        let started = Instant::now();

        let claim = self.normalizer.normalize(raw_text)?;
        METRICS.claims_processed.inc();

        let report = match self.run_stages(claim, started).await {
            Ok(report) => report,
            Err((stage, e)) => {
                error!(stage = stage, "Stage failed, downgrading claim: {}", e);
                METRICS.stage_failures.with_label_values(&[stage]).inc();
                VerificationReport::degraded(
                    raw_text.trim(),
                    format!("{stage}: {e}"),
                    started.elapsed().as_millis() as u64,
                )
            }
        };

        METRICS.verdicts.with_label_values(&[report.verdict.as_str()]).inc();
        info!(
            verdict = report.verdict.as_str(),
            confidence = report.confidence,
            elapsed_ms = report.processing_time_ms,
            "Claim verified"
        );
        Ok(report)
    }

    async fn run_stages(
        &self,
        mut claim: crate::models::Claim,
        started: Instant,
    ) -> std::result::Result<VerificationReport, (&'static str, crate::error::VerificationError)> {
        let stage_start = Instant::now();
        self.classifier.classify(&mut claim);
        observe_stage("classifier", stage_start);

        let stage_start = Instant::now();
        let sub_claims = self.decomposer.decompose(&claim).await;
        observe_stage("decomposer", stage_start);

        let stage_start = Instant::now();
        let gathered = self
            .gatherer
            .research(&sub_claims)
            .await
            .map_err(|e| ("gatherer", e.into()))?;
        observe_stage("gatherer", stage_start);

        let stage_start = Instant::now();
        let synthesis = self.synthesizer.synthesize(&claim, &gathered).await;
        observe_stage("synthesizer", stage_start);

        // A source backing several sub-claims is listed once in the report
        let mut seen = std::collections::HashSet::new();
        let sources: Vec<SourceRef> = gathered
            .iter()
            .flat_map(|s| s.sources.iter())
            .filter(|s| seen.insert(s.url.clone()))
            .map(SourceRef::from)
            .collect();

        Ok(VerificationReport {
            claim: claim.text,
            verdict: synthesis.verdict.label,
            confidence: synthesis.verdict.confidence,
            evidence_summary: synthesis.verdict.rationale,
            sources,
            sub_claims: synthesis.sub_claims,
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            degraded: None,
        })
    }

    /// Probe every registered LLM provider
    pub async fn probe_providers(&self) -> Vec<ProviderStatus> {
        self.router.probe_availability().await
    }

    /// Token and cost accounting for this run
    pub fn usage(&self) -> RunUsage {
        self.router.usage()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn observe_stage(stage: &str, started: Instant) {
    METRICS
        .stage_duration
        .with_label_values(&[stage])
        .observe(started.elapsed().as_secs_f64());
}
