//! Claim decomposition into independently verifiable sub-claims

use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::{ChatMessage, ChatRequest, LlmRouter, Stage};
use crate::models::{Claim, ClaimCategory, Entity, EntityKind, SubClaim};

const SYSTEM_PROMPT: &str =
    "You are an expert at breaking down factual claims into verifiable sub-components.";

/// Splits a compound claim into sub-claims, model-first with a rule-based
/// fallback
///
/// Decomposition never fails: the worst case is a single sub-claim equal to
/// the normalized claim.
pub struct ClaimDecomposer {
    router: Arc<LlmRouter>,
    max_sub_claims: usize,
}

impl ClaimDecomposer {
    pub fn new(router: Arc<LlmRouter>, max_sub_claims: usize) -> Self {
        Self { router, max_sub_claims }
    }

    pub async fn decompose(&self, claim: &Claim) -> Vec<SubClaim> {
        let mut sub_claims = match self.llm_decompose(claim).await {
            Ok(parsed) if !parsed.is_empty() => parsed,
            Ok(_) => {
                warn!("Model returned no parseable sub-claims, using rule-based decomposition");
                self.rule_based_decompose(claim)
            }
            Err(e) => {
                warn!("Model decomposition unavailable ({}), using rule-based decomposition", e);
                self.rule_based_decompose(claim)
            }
        };

        sub_claims.truncate(self.max_sub_claims);
        debug!(count = sub_claims.len(), "Decomposed claim");
        sub_claims
    }

    async fn llm_decompose(&self, claim: &Claim) -> Result<Vec<SubClaim>, crate::llm::LlmError> {
        let prompt = format!(
            "Break down the following claim into its verifiable sub-components:\n\n\
             Claim: \"{}\"\n\n\
             Please identify:\n\
             1. Key factual assertions that can be independently verified\n\
             2. Entities involved (people, organizations, dates, locations)\n\n\
             Format your response as:\n\
             SUB-CLAIM 1: [specific verifiable fact]\n\
             ENTITIES: [entity1], [entity2], ...\n\n\
             SUB-CLAIM 2: [another specific verifiable fact]\n\
             ENTITIES: [entity1], [entity2], ...\n\n\
             Focus on claims that can be verified through reliable sources.",
            claim.text
        );

        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.1)
        .with_max_tokens(500);

        let response = self.router.chat(Stage::Decomposer, request).await?;
        Ok(parse_decomposition(&response.content, claim.category))
    }

    fn rule_based_decompose(&self, claim: &Claim) -> Vec<SubClaim> {
        if claim.category == ClaimCategory::HistoricalDate {
            let date_entities: Vec<&Entity> = claim
                .entities
                .iter()
                .filter(|e| e.kind == EntityKind::Date)
                .collect();

            if !date_entities.is_empty() {
                return date_entities
                    .into_iter()
                    .map(|date| {
                        let text = format!(
                            "The event described in '{}' occurred in {}.",
                            claim.text, date.text
                        );
                        SubClaim::new(text, claim.category).with_entities(vec![date.clone()])
                    })
                    .collect();
            }
        }

        vec![SubClaim::new(&claim.text, claim.category).with_entities(claim.entities.clone())]
    }
}

/// Parse a `SUB-CLAIM n:` / `ENTITIES:` listing
fn parse_decomposition(response: &str, category: ClaimCategory) -> Vec<SubClaim> {
    let mut sub_claims: Vec<SubClaim> = Vec::new();

    for line in response.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("SUB-CLAIM") {
            if let Some((_, text)) = rest.split_once(':') {
                let text = text.trim();
                if !text.is_empty() {
                    sub_claims.push(SubClaim::new(text, category));
                }
            }
        } else if let Some(rest) = line.strip_prefix("ENTITIES:") {
            if let Some(current) = sub_claims.last_mut() {
                current.entities = rest
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(|e| Entity::new(e, EntityKind::Other, (0, 0), 0.8))
                    .collect();
            }
        }
    }

    sub_claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::mock::MockChatProvider;
    use crate::llm::ProviderKind;

    fn bare_router() -> LlmRouter {
        let mut settings = Settings::default();
        settings.llm_models.ollama_enabled = false;
        LlmRouter::from_settings(&settings).with_max_retries(1)
    }

    fn historical_claim() -> Claim {
        let mut claim = Claim::new(
            "The Berlin Wall fell in 1989.",
            "The Berlin Wall fell in 1989.",
        );
        claim.category = ClaimCategory::HistoricalDate;
        claim.entities = vec![Entity::new("1989", EntityKind::Date, (24, 28), 0.7)];
        claim
    }

    #[test]
    fn test_parse_numbered_listing() {
        let response = "SUB-CLAIM 1: The Berlin Wall existed.\n\
                        ENTITIES: Berlin Wall\n\n\
                        SUB-CLAIM 2: The Berlin Wall fell in 1989.\n\
                        ENTITIES: Berlin Wall, 1989";

        let parsed = parse_decomposition(response, ClaimCategory::HistoricalDate);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "The Berlin Wall existed.");
        assert_eq!(parsed[0].entities.len(), 1);
        assert_eq!(parsed[1].entities.len(), 2);
        assert_eq!(parsed[1].entities[1].text, "1989");
        assert_eq!(parsed[1].entities[1].confidence, 0.8);
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        assert!(parse_decomposition("I cannot help with that.", ClaimCategory::Unknown).is_empty());
    }

    #[tokio::test]
    async fn test_llm_path() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai).with_repeating_response(
            "SUB-CLAIM 1: The wall fell.\nENTITIES: Berlin Wall, 1989",
        ));
        let router = Arc::new(bare_router().with_provider(provider));
        let decomposer = ClaimDecomposer::new(router, 5);

        let sub_claims = decomposer.decompose(&historical_claim()).await;
        assert_eq!(sub_claims.len(), 1);
        assert_eq!(sub_claims[0].text, "The wall fell.");
    }

    #[tokio::test]
    async fn test_fallback_when_no_provider() {
        let decomposer = ClaimDecomposer::new(Arc::new(bare_router()), 5);

        let sub_claims = decomposer.decompose(&historical_claim()).await;
        assert_eq!(sub_claims.len(), 1);
        assert!(sub_claims[0].text.contains("occurred in 1989"));
    }

    #[tokio::test]
    async fn test_fallback_when_model_output_unparseable() {
        let provider = Arc::new(
            MockChatProvider::new(ProviderKind::Openai).with_repeating_response("no structure here"),
        );
        let router = Arc::new(bare_router().with_provider(provider));
        let decomposer = ClaimDecomposer::new(router, 5);

        let mut claim = Claim::new("Water is wet, honestly.", "Water is wet, honestly.");
        claim.category = ClaimCategory::Unknown;

        let sub_claims = decomposer.decompose(&claim).await;
        assert_eq!(sub_claims.len(), 1);
        assert_eq!(sub_claims[0].text, claim.text);
    }

    #[tokio::test]
    async fn test_sub_claim_cap_is_enforced() {
        let response = (1..=8)
            .map(|i| format!("SUB-CLAIM {i}: fact number {i}."))
            .collect::<Vec<_>>()
            .join("\n");
        let provider =
            Arc::new(MockChatProvider::new(ProviderKind::Openai).with_repeating_response(response));
        let router = Arc::new(bare_router().with_provider(provider));
        let decomposer = ClaimDecomposer::new(router, 3);

        let sub_claims = decomposer.decompose(&historical_claim()).await;
        assert_eq!(sub_claims.len(), 3);
    }
}
