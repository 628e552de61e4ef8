//! Scripted chat provider for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::provider::{ChatProvider, ChatRequest, ChatResponse, LlmError, ProviderKind, TokenUsage};

/// Chat provider returning queued responses, with switchable failure mode
pub struct MockChatProvider {
    kind: ProviderKind,
    model: String,
    responses: Mutex<VecDeque<String>>,
    repeating: Mutex<Option<String>>,
    errors: Mutex<VecDeque<LlmError>>,
    failing: AtomicBool,
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl MockChatProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: "mock".to_string(),
            responses: Mutex::new(VecDeque::new()),
            repeating: Mutex::new(None),
            errors: Mutex::new(VecDeque::new()),
            failing: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue one response; queued responses are consumed in order
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(content.into());
        self
    }

    /// Response returned whenever the queue is empty
    pub fn with_repeating_response(self, content: impl Into<String>) -> Self {
        *self.repeating.lock().unwrap() = Some(content.into());
        self
    }

    /// Queue one error; queued errors are returned before any response
    pub fn with_error(self, error: LlmError) -> Self {
        self.errors.lock().unwrap().push_back(error);
        self
    }

    /// Start in failing mode; every chat call errors until cleared
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::RequestFailed("mock provider failure".to_string()));
        }

        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeating.lock().unwrap().clone())
            .ok_or_else(|| LlmError::InvalidResponse("mock response queue empty".to_string()))?;

        let prompt_tokens: u64 = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count() as u64)
            .sum();
        let completion_tokens = content.split_whitespace().count() as u64;

        Ok(ChatResponse {
            content,
            provider: self.kind,
            model: self.model.clone(),
            usage: TokenUsage { prompt_tokens, completion_tokens },
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatMessage;

    #[tokio::test]
    async fn test_queued_responses_in_order() {
        let provider = MockChatProvider::new(ProviderKind::Openai)
            .with_response("first")
            .with_response("second");

        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(provider.chat(&request).await.unwrap().content, "first");
        assert_eq!(provider.chat(&request).await.unwrap().content, "second");
        assert!(provider.chat(&request).await.is_err());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_mode_toggles() {
        let provider = MockChatProvider::new(ProviderKind::Ollama)
            .with_repeating_response("ok")
            .failing();

        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert!(provider.chat(&request).await.is_err());

        provider.set_failing(false);
        assert_eq!(provider.chat(&request).await.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn test_queued_errors_precede_responses() {
        let provider = MockChatProvider::new(ProviderKind::Openai)
            .with_error(LlmError::Upstream { status: 503, message: "busy".to_string() })
            .with_repeating_response("ok");

        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert!(matches!(
            provider.chat(&request).await,
            Err(LlmError::Upstream { status: 503, .. })
        ));
        assert_eq!(provider.chat(&request).await.unwrap().content, "ok");
    }
}
