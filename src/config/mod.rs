//! Layered configuration: INI file, environment overrides, defaults
//!
//! Sections map one-to-one to the INI file: `[api_keys]`, `[api_settings]`,
//! `[processing]`, `[llm_models]`, and `[agent_llm]` for the per-stage
//! provider mapping. Well-known environment variables (OPENAI_API_KEY and
//! friends) override file values so keys never need to live on disk.

use config::{ConfigError as SourceError, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] SourceError),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// API credentials; absent keys disable the matching provider or source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub openai_api_key: Option<SecretString>,
    #[serde(default)]
    pub anthropic_api_key: Option<SecretString>,
    #[serde(default)]
    pub gemini_api_key: Option<SecretString>,
    #[serde(default)]
    pub news_api_key: Option<SecretString>,
    #[serde(default)]
    pub google_search_api_key: Option<SecretString>,
    #[serde(default)]
    pub google_search_engine_id: Option<String>,
}

/// Request behavior shared by all outbound HTTP clients
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Minimum delay between requests to the same source, in milliseconds
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Deserialize)]
pub struct Processing {
    /// Ranked sources kept per sub-claim
    #[serde(default = "default_max_sources_per_claim")]
    pub max_sources_per_claim: usize,

    /// Upper bound on sub-claims produced by decomposition
    #[serde(default = "default_max_sub_claims")]
    pub max_sub_claims: usize,

    #[serde(default = "default_cache_expiry_hours")]
    pub cache_expiry_hours: u64,

    /// SQLite file backing the persistent response cache
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

/// Per-provider model settings and the fallback order
#[derive(Debug, Clone, Deserialize)]
pub struct LlmModels {
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    #[serde(default = "default_ollama_enabled")]
    pub ollama_enabled: bool,

    /// Comma-separated provider names, tried in order
    #[serde(default = "default_fallback_order")]
    pub fallback_order: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

// Default value functions
fn default_request_timeout_secs() -> u64 { 30 }
fn default_max_retries() -> usize { 3 }
fn default_rate_limit_delay_ms() -> u64 { 1000 }
fn default_max_sources_per_claim() -> usize { 5 }
fn default_max_sub_claims() -> usize { 5 }
fn default_cache_expiry_hours() -> u64 { 24 }
fn default_cache_path() -> String { "cache/api_cache.db".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_anthropic_model() -> String { "claude-3-5-sonnet-20241022".to_string() }
fn default_gemini_model() -> String { "gemini-1.5-flash".to_string() }
fn default_ollama_model() -> String { "llama2".to_string() }
fn default_ollama_base_url() -> String { "http://localhost:11434".to_string() }
fn default_ollama_enabled() -> bool { true }
fn default_fallback_order() -> String { "ollama, anthropic, gemini, openai".to_string() }
fn default_temperature() -> f32 { 0.1 }
fn default_max_tokens() -> u32 { 1000 }

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
        }
    }
}

impl Default for Processing {
    fn default() -> Self {
        Self {
            max_sources_per_claim: default_max_sources_per_claim(),
            max_sub_claims: default_max_sub_claims(),
            cache_expiry_hours: default_cache_expiry_hours(),
            cache_path: default_cache_path(),
        }
    }
}

impl Default for LlmModels {
    fn default() -> Self {
        Self {
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            gemini_model: default_gemini_model(),
            ollama_model: default_ollama_model(),
            ollama_base_url: default_ollama_base_url(),
            ollama_enabled: default_ollama_enabled(),
            fallback_order: default_fallback_order(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

impl Processing {
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_hours * 3600)
    }
}

/// Per-stage LLM overrides resolved from the `[agent_llm]` section
#[derive(Debug, Clone, Default)]
pub struct StageLlm {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Fully resolved application settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub api_settings: ApiSettings,
    #[serde(default)]
    pub processing: Processing,
    #[serde(default)]
    pub llm_models: LlmModels,
    /// Raw `{stage}_{field}` keys, e.g. `synthesizer_provider = openai`
    #[serde(default)]
    pub agent_llm: HashMap<String, String>,
}

impl Settings {
    /// Load settings from an optional INI file plus the environment
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply, so the tool runs with zero configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                File::new(&path.display().to_string(), FileFormat::Ini).required(false),
            );
        }

        builder = builder.add_source(Environment::with_prefix("VERACITY").separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Honor the well-known key variables regardless of prefix conventions
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            self.api_keys.openai_api_key = Some(SecretString::new(val));
        }
        if let Ok(val) = std::env::var("ANTHROPIC_API_KEY") {
            self.api_keys.anthropic_api_key = Some(SecretString::new(val));
        }
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            self.api_keys.gemini_api_key = Some(SecretString::new(val));
        }
        if let Ok(val) = std::env::var("NEWS_API_KEY") {
            self.api_keys.news_api_key = Some(SecretString::new(val));
        }
        if let Ok(val) = std::env::var("GOOGLE_SEARCH_API_KEY") {
            self.api_keys.google_search_api_key = Some(SecretString::new(val));
        }
        if let Ok(val) = std::env::var("GOOGLE_SEARCH_ENGINE_ID") {
            self.api_keys.google_search_engine_id = Some(val);
        }
        if let Ok(val) = std::env::var("OLLAMA_BASE_URL") {
            self.llm_models.ollama_base_url = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_sources_per_claim == 0 {
            return Err(ConfigError::Invalid(
                "processing.max_sources_per_claim must be at least 1".to_string(),
            ));
        }
        if self.processing.max_sub_claims == 0 {
            return Err(ConfigError::Invalid(
                "processing.max_sub_claims must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm_models.temperature) {
            return Err(ConfigError::Invalid(
                "llm_models.temperature must be within [0, 2]".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the LLM overrides for a pipeline stage by name
    pub fn stage_llm(&self, stage: &str) -> StageLlm {
        let get = |suffix: &str| self.agent_llm.get(&format!("{stage}_{suffix}")).cloned();
        StageLlm {
            provider: get("provider"),
            model: get("model"),
            temperature: get("temperature").and_then(|v| v.parse().ok()),
            max_tokens: get("max_tokens").and_then(|v| v.parse().ok()),
        }
    }

    /// Provider names from `llm_models.fallback_order`, in configured order
    pub fn fallback_order(&self) -> Vec<String> {
        self.llm_models
            .fallback_order
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_settings.request_timeout_secs, 30);
        assert_eq!(settings.api_settings.max_retries, 3);
        assert_eq!(settings.processing.max_sources_per_claim, 5);
        assert_eq!(settings.processing.cache_expiry_hours, 24);
        assert_eq!(settings.llm_models.openai_model, "gpt-4o-mini");
        assert!(settings.llm_models.ollama_enabled);
    }

    #[test]
    fn test_duration_accessors() {
        let settings = Settings::default();
        assert_eq!(settings.api_settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.api_settings.rate_limit_delay(), Duration::from_millis(1000));
        assert_eq!(settings.processing.cache_expiry(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_fallback_order_parsing() {
        let settings = Settings::default();
        assert_eq!(settings.fallback_order(), vec!["ollama", "anthropic", "gemini", "openai"]);

        let mut settings = Settings::default();
        settings.llm_models.fallback_order = "OpenAI,, gemini ".to_string();
        assert_eq!(settings.fallback_order(), vec!["openai", "gemini"]);
    }

    #[test]
    fn test_stage_llm_resolution() {
        let mut settings = Settings::default();
        settings.agent_llm.insert("synthesizer_provider".to_string(), "anthropic".to_string());
        settings.agent_llm.insert("synthesizer_temperature".to_string(), "0.2".to_string());
        settings.agent_llm.insert("synthesizer_max_tokens".to_string(), "400".to_string());

        let stage = settings.stage_llm("synthesizer");
        assert_eq!(stage.provider.as_deref(), Some("anthropic"));
        assert_eq!(stage.temperature, Some(0.2));
        assert_eq!(stage.max_tokens, Some(400));
        assert!(stage.model.is_none());

        let other = settings.stage_llm("decomposer");
        assert!(other.provider.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_sources() {
        let mut settings = Settings::default();
        settings.processing.max_sources_per_claim = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("OLLAMA_BASE_URL", "http://envhost:11434");

        let mut settings = Settings::default();
        settings.apply_env_overrides();
        assert_eq!(settings.llm_models.ollama_base_url, "http://envhost:11434");

        std::env::remove_var("OLLAMA_BASE_URL");
    }
}
