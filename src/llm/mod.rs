//! LLM provider registry with per-stage routing and ordered fallback
//!
//! Providers register in the configured fallback order. A request targets
//! the stage-mapped provider first; transient failures are retried with
//! exponential backoff before the next provider in order is tried, so one
//! unreachable vendor never takes a claim down with it.

pub mod anthropic;
pub mod gemini;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod tokens;

pub use provider::{
    ChatMessage, ChatProvider, ChatRequest, ChatResponse, LlmError, ProviderKind, TokenUsage,
};

use futures::future::join_all;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Settings, StageLlm};
use crate::metrics::METRICS;

/// Pipeline stages, used as keys of the agent-to-provider mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalizer,
    Classifier,
    Decomposer,
    Gatherer,
    Synthesizer,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Normalizer,
        Stage::Classifier,
        Stage::Decomposer,
        Stage::Gatherer,
        Stage::Synthesizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalizer => "normalizer",
            Stage::Classifier => "classifier",
            Stage::Decomposer => "decomposer",
            Stage::Gatherer => "gatherer",
            Stage::Synthesizer => "synthesizer",
        }
    }
}

/// Aggregate token and cost accounting for one process run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunUsage {
    /// Successful chat exchanges
    pub requests: u64,
    /// Times a non-primary provider ended up answering
    pub fallbacks: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Availability of one registered provider
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub model: String,
    pub available: bool,
}

/// Ordered provider registry with stage overrides
pub struct LlmRouter {
    providers: IndexMap<ProviderKind, Arc<dyn ChatProvider>>,
    stage_overrides: HashMap<Stage, StageLlm>,
    max_retries: usize,
    usage: Mutex<RunUsage>,
}

impl LlmRouter {
    /// Build the registry from settings, in configured fallback order
    ///
    /// Providers without credentials are skipped; an empty registry is
    /// allowed and leaves the model-backed stages on their fallbacks.
    pub fn from_settings(settings: &Settings) -> Self {
        let timeout = settings.api_settings.request_timeout();
        let mut providers: IndexMap<ProviderKind, Arc<dyn ChatProvider>> = IndexMap::new();

        for name in settings.fallback_order() {
            let Some(kind) = ProviderKind::parse(&name) else {
                warn!("Unknown provider '{}' in fallback order, skipping", name);
                continue;
            };
            if providers.contains_key(&kind) {
                continue;
            }
            match Self::build_provider(kind, settings, timeout) {
                Ok(Some(provider)) => {
                    info!("Registered LLM provider {} ({})", kind, provider.model());
                    providers.insert(kind, provider);
                }
                Ok(None) => debug!("Provider {} not configured, skipping", kind),
                Err(e) => warn!("Failed to initialize provider {}: {}", kind, e),
            }
        }

        if providers.is_empty() {
            warn!("No LLM providers configured; model-backed stages will use rule-based fallbacks");
        }

        let stage_overrides = Stage::ALL
            .iter()
            .map(|stage| (*stage, settings.stage_llm(stage.as_str())))
            .collect();

        Self {
            providers,
            stage_overrides,
            max_retries: settings.api_settings.max_retries,
            usage: Mutex::new(RunUsage::default()),
        }
    }

    fn build_provider(
        kind: ProviderKind,
        settings: &Settings,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn ChatProvider>>, LlmError> {
        let keys = &settings.api_keys;
        let models = &settings.llm_models;

        let provider: Arc<dyn ChatProvider> = match kind {
            ProviderKind::Openai => {
                let Some(key) = keys.openai_api_key.clone() else { return Ok(None) };
                Arc::new(openai::OpenAiProvider::new(key, models.openai_model.clone(), timeout)?)
            }
            ProviderKind::Anthropic => {
                let Some(key) = keys.anthropic_api_key.clone() else { return Ok(None) };
                Arc::new(anthropic::AnthropicProvider::new(key, models.anthropic_model.clone(), timeout)?)
            }
            ProviderKind::Gemini => {
                let Some(key) = keys.gemini_api_key.clone() else { return Ok(None) };
                Arc::new(gemini::GeminiProvider::new(key, models.gemini_model.clone(), timeout)?)
            }
            ProviderKind::Ollama => {
                if !models.ollama_enabled {
                    return Ok(None);
                }
                Arc::new(ollama::OllamaProvider::new(
                    models.ollama_base_url.clone(),
                    models.ollama_model.clone(),
                    timeout,
                )?)
            }
        };
        Ok(Some(provider))
    }

    /// Register or replace a provider; appended at the end of the order
    pub fn with_provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    /// Probe every registered provider concurrently
    pub async fn probe_availability(&self) -> Vec<ProviderStatus> {
        let probes = self.providers.values().map(|provider| async {
            ProviderStatus {
                kind: provider.kind(),
                model: provider.model().to_string(),
                available: provider.health_check().await,
            }
        });
        join_all(probes).await
    }

    /// Send a chat request on behalf of a pipeline stage
    pub async fn chat(&self, stage: Stage, mut request: ChatRequest) -> Result<ChatResponse, LlmError> {
        if self.providers.is_empty() {
            return Err(LlmError::NoAvailableProvider("none configured".to_string()));
        }

        let overrides = self.stage_overrides.get(&stage);
        if let Some(o) = overrides {
            if let Some(temperature) = o.temperature {
                request.temperature = temperature;
            }
            if let Some(max_tokens) = o.max_tokens {
                request.max_tokens = max_tokens;
            }
            if request.model.is_none() {
                request.model = o.model.clone();
            }
        }

        let preferred = overrides
            .and_then(|o| o.provider.as_deref())
            .and_then(ProviderKind::parse);

        let mut order: Vec<ProviderKind> = Vec::with_capacity(self.providers.len());
        if let Some(kind) = preferred {
            if self.providers.contains_key(&kind) {
                order.push(kind);
            } else {
                warn!(
                    "Stage {} maps to unregistered provider {}, using fallback order",
                    stage.as_str(),
                    kind
                );
            }
        }
        for kind in self.providers.keys() {
            if !order.contains(kind) {
                order.push(*kind);
            }
        }

        let mut tried: Vec<String> = Vec::new();
        for (index, kind) in order.iter().enumerate() {
            let Some(candidate) = self.providers.get(kind) else { continue };

            // A stage's model override only makes sense on its mapped provider
            let mut attempt = request.clone();
            if Some(*kind) != preferred {
                attempt.model = None;
            }

            match self.chat_with_retry(candidate.as_ref(), &attempt).await {
                Ok(response) => {
                    if index > 0 {
                        METRICS.llm_fallbacks.inc();
                        self.usage.lock().unwrap().fallbacks += 1;
                        warn!(
                            "Provider fallback engaged: {} answered for stage {}",
                            kind,
                            stage.as_str()
                        );
                    }
                    self.record_usage(&response);
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Provider {} failed for stage {}: {}", kind, stage.as_str(), e);
                    tried.push(kind.to_string());
                }
            }
        }

        Err(LlmError::NoAvailableProvider(tried.join(", ")))
    }

    async fn chat_with_retry(
        &self,
        provider: &dyn ChatProvider,
        request: &ChatRequest,
    ) -> Result<ChatResponse, LlmError> {
        let mut last_error = None;
        for attempt in 0..self.max_retries.max(1) {
            if attempt > 0 {
                debug!("Retry attempt {} for provider {}", attempt, provider.kind());
                tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
            }

            match provider.chat(request).await {
                Ok(response) => {
                    METRICS
                        .llm_requests
                        .with_label_values(&[provider.kind().as_str(), "success"])
                        .inc();
                    return Ok(response);
                }
                Err(e) => {
                    METRICS
                        .llm_requests
                        .with_label_values(&[provider.kind().as_str(), "error"])
                        .inc();
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::RequestFailed("no attempts made".to_string())))
    }

    fn record_usage(&self, response: &ChatResponse) {
        let mut usage = self.usage.lock().unwrap();
        usage.requests += 1;
        usage.total_tokens += response.usage.total();
        usage.estimated_cost += response.estimated_cost();
        METRICS.llm_tokens.inc_by(response.usage.total() as f64);
    }

    pub fn usage(&self) -> RunUsage {
        *self.usage.lock().unwrap()
    }
}
