//! End-to-end pipeline tests with mock providers and connectors

use std::sync::Arc;
use std::time::Duration;

use veracity::cache::ResponseCache;
use veracity::config::Settings;
use veracity::llm::mock::MockChatProvider;
use veracity::llm::{LlmRouter, ProviderKind};
use veracity::models::{Source, SourceKind, VerdictLabel};
use veracity::search::mock::MockSearchConnector;
use veracity::search::SearchConnector;
use veracity::{VerificationError, VerificationPipeline};

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.llm_models.ollama_enabled = false;
    settings.api_settings.rate_limit_delay_ms = 0;
    settings.api_settings.max_retries = 1;
    settings
}

fn cache() -> Arc<ResponseCache> {
    Arc::new(ResponseCache::in_memory(Duration::from_secs(60)).unwrap())
}

fn wall_source(url: &str) -> Source {
    Source::new(
        url,
        "Berlin Wall",
        "The fall of the Berlin Wall in 1989 marked the end of a divided Berlin. \
         The wall fell on 9 November 1989 after weeks of civil unrest.",
        SourceKind::Encyclopedia,
        0.9,
    )
}

fn supporting_analysis() -> &'static str {
    "ASSESSMENT: SUPPORTS\nCONFIDENCE: 0.9\n\
     RELEVANT_TEXT: The wall fell on 9 November 1989.\nREASONING: Direct match."
}

fn pipeline_with(
    settings: &Settings,
    router: LlmRouter,
    connectors: Vec<Arc<dyn SearchConnector>>,
) -> VerificationPipeline {
    VerificationPipeline::with_components(settings, Arc::new(router), cache(), connectors)
}

#[tokio::test]
async fn supported_claim_produces_one_supported_verdict() {
    let settings = settings();
    let provider = Arc::new(
        MockChatProvider::new(ProviderKind::Openai).with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(report.verdict, VerdictLabel::Supported);
    assert!((0.0..=1.0).contains(&report.confidence));
    assert_eq!(report.sources.len(), 1);
    assert!(!report.sub_claims.is_empty());
    assert!(report.degraded.is_none());
}

#[tokio::test]
async fn zero_evidence_always_yields_insufficient() {
    let settings = settings();
    let router = LlmRouter::from_settings(&settings).with_max_retries(1);
    let connector = Arc::new(MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia));

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let report = pipeline
        .verify("The Berlin Wall fell in 1989")
        .await
        .unwrap();

    assert_eq!(report.verdict, VerdictLabel::InsufficientEvidence);
    assert_eq!(report.confidence, 0.0);
    assert!(report.sources.is_empty());
}

#[tokio::test]
async fn primary_provider_down_still_produces_verdict() {
    let settings = settings();
    let primary = Arc::new(MockChatProvider::new(ProviderKind::Ollama).failing());
    let secondary = Arc::new(
        MockChatProvider::new(ProviderKind::Anthropic)
            .with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(primary)
        .with_provider(secondary);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(report.verdict, VerdictLabel::Supported);
    assert!(pipeline.usage().fallbacks > 0);
}

#[tokio::test]
async fn all_providers_down_degrades_to_lexical_analysis() {
    let settings = settings();
    let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai).failing());
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    // Lexical fallback still reads the overlapping summary as support
    assert_eq!(report.verdict, VerdictLabel::Supported);
    assert!((0.0..=1.0).contains(&report.confidence));
}

#[tokio::test]
async fn failed_source_never_fails_the_claim() {
    let settings = settings();
    let provider = Arc::new(
        MockChatProvider::new(ProviderKind::Openai).with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let good = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );
    let bad = Arc::new(MockSearchConnector::new("newsapi", SourceKind::News).failing());

    let pipeline = pipeline_with(&settings, router, vec![good, bad]);
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(report.verdict, VerdictLabel::Supported);
    assert_eq!(report.sources.len(), 1);
}

#[tokio::test]
async fn no_connectors_yields_degraded_insufficient_report() {
    let settings = settings();
    let router = LlmRouter::from_settings(&settings).with_max_retries(1);

    let pipeline = pipeline_with(&settings, router, Vec::new());
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(report.verdict, VerdictLabel::InsufficientEvidence);
    assert_eq!(report.confidence, 0.0);
    assert!(report.degraded.is_some());
}

#[tokio::test]
async fn invalid_claim_is_rejected_before_the_pipeline() {
    let settings = settings();
    let router = LlmRouter::from_settings(&settings).with_max_retries(1);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );
    let connector_probe = Arc::clone(&connector);

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let result = pipeline.verify("short").await;

    assert!(matches!(result, Err(VerificationError::InvalidClaim(_))));
    assert_eq!(connector_probe.call_count(), 0);
}

#[tokio::test]
async fn repeated_claims_are_served_from_cache() {
    let settings = settings();
    let provider = Arc::new(
        MockChatProvider::new(ProviderKind::Openai).with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );
    let connector_probe = Arc::clone(&connector);

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();
    pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(connector_probe.call_count(), 1);
    assert!(pipeline.cache_stats().hits > 0);
}

#[tokio::test]
async fn source_shared_by_sub_claims_is_listed_once() {
    let settings = settings();
    let provider = Arc::new(
        MockChatProvider::new(ProviderKind::Openai)
            .with_response(
                "SUB-CLAIM 1: The Berlin Wall existed.\n\
                 SUB-CLAIM 2: The Berlin Wall fell in 1989.",
            )
            .with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let report = pipeline.verify("The Berlin Wall fell in 1989").await.unwrap();

    assert_eq!(report.sub_claims.len(), 2);
    assert_eq!(report.sources.len(), 1);
}

#[tokio::test]
async fn every_claim_in_a_batch_gets_exactly_one_verdict() {
    let settings = settings();
    let provider = Arc::new(
        MockChatProvider::new(ProviderKind::Openai).with_repeating_response(supporting_analysis()),
    );
    let router = LlmRouter::from_settings(&settings)
        .with_max_retries(1)
        .with_provider(provider);
    let connector = Arc::new(
        MockSearchConnector::new("wikipedia", SourceKind::Encyclopedia)
            .with_sources(vec![wall_source("https://en.wikipedia.org/wiki/Berlin_Wall")]),
    );

    let pipeline = pipeline_with(&settings, router, vec![connector]);
    let claims = [
        "The Berlin Wall fell in 1989",
        "Apple Inc was founded in 1976",
        "Albert Einstein was born in 1879",
    ];

    for claim in claims {
        let report = pipeline.verify(claim).await.unwrap();
        assert!((0.0..=1.0).contains(&report.confidence));
        assert!(report.processing_time_ms < 60_000);
    }
}
