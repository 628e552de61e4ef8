//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Pipeline metrics
    pub claims_processed: Counter,
    pub verdicts: CounterVec,
    pub stage_failures: CounterVec,
    pub stage_duration: HistogramVec,

    // LLM metrics
    pub llm_requests: CounterVec,
    pub llm_fallbacks: Counter,
    pub llm_tokens: Counter,

    // Evidence gathering metrics
    pub search_requests: CounterVec,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let claims_processed = register_counter_with_registry!(
            Opts::new("claims_processed_total", "Total claims run through the pipeline"),
            registry
        )?;

        let verdicts = register_counter_vec_with_registry!(
            Opts::new("verdicts_total", "Verdicts produced, by label"),
            &["label"],
            registry
        )?;

        let stage_failures = register_counter_vec_with_registry!(
            Opts::new(
                "pipeline_stage_failures_total",
                "Stage errors downgraded to insufficient evidence"
            ),
            &["stage"],
            registry
        )?;

        let stage_duration = register_histogram_vec_with_registry!(
            "pipeline_stage_duration_seconds",
            "Stage duration in seconds",
            &["stage"],
            registry
        )?;

        let llm_requests = register_counter_vec_with_registry!(
            Opts::new("llm_requests_total", "LLM request attempts by provider and status"),
            &["provider", "status"],
            registry
        )?;

        let llm_fallbacks = register_counter_with_registry!(
            Opts::new("llm_provider_fallbacks_total", "Times a non-primary provider answered"),
            registry
        )?;

        let llm_tokens = register_counter_with_registry!(
            Opts::new("llm_tokens_total", "Tokens consumed across providers"),
            registry
        )?;

        let search_requests = register_counter_vec_with_registry!(
            Opts::new("search_requests_total", "External source queries by source and status"),
            &["source", "status"],
            registry
        )?;

        let cache_hits = register_counter_with_registry!(
            Opts::new("evidence_cache_hits_total", "Evidence cache hits"),
            registry
        )?;

        let cache_misses = register_counter_with_registry!(
            Opts::new("evidence_cache_misses_total", "Evidence cache misses"),
            registry
        )?;

        Ok(Self {
            registry,
            claims_processed,
            verdicts,
            stage_failures,
            stage_duration,
            llm_requests,
            llm_fallbacks,
            llm_tokens,
            search_requests,
            cache_hits,
            cache_misses,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
