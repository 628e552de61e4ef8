//! Evidence labeling and verdict synthesis

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agents::gatherer::GatheredSubClaim;
use crate::llm::tokens::{truncate_to_budget, TokenEstimator};
use crate::llm::{ChatMessage, ChatRequest, LlmRouter, Stage};
use crate::models::{
    AnalysisMethod, Claim, Evidence, Source, Stance, SubClaimReport, Verdict, VerdictLabel,
};
use crate::scoring::ConfidenceScorer;

const ANALYSIS_SYSTEM_PROMPT: &str = "You are an expert fact-checker analyzing evidence. Your task is to determine if a source supports, contradicts, or is neutral regarding a claim.

Analyze carefully:
1. Does the source content directly support the claim?
2. Does it contradict the claim?
3. Is it neutral/irrelevant?
4. Extract the most relevant text that supports your assessment.

Respond in this exact format:
ASSESSMENT: [SUPPORTS/CONTRADICTS/NEUTRAL]
CONFIDENCE: [0.0-1.0]
RELEVANT_TEXT: [exact quote from source that supports your assessment]
REASONING: [brief explanation of your assessment]";

/// Token budget for source content inside the analysis prompt
const CONTENT_TOKEN_BUDGET: usize = 400;
/// Word-overlap ratio above which the lexical fallback reads support
const LEXICAL_SUPPORT_THRESHOLD: f32 = 0.4;
/// Verdict thresholds on the supporting-score ratio
const SUPPORT_RATIO_THRESHOLD: f32 = 0.7;
const CONTRADICT_RATIO_THRESHOLD: f32 = 0.3;
const CONFIDENCE_CAP: f32 = 0.95;
const QUOTE_PREVIEW_CHARS: usize = 200;

static ASSESSMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ASSESSMENT:\s*\[?\s*(SUPPORTS|CONTRADICTS|NEUTRAL)").unwrap());

/// Everything the synthesizer produces for one claim
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub verdict: Verdict,
    pub sub_claims: Vec<SubClaimReport>,
}

/// Labels each gathered source against the claim and aggregates the
/// labeled evidence into a verdict with a refined confidence
pub struct EvidenceSynthesizer {
    router: Arc<LlmRouter>,
    estimator: Arc<dyn TokenEstimator>,
    scorer: ConfidenceScorer,
}

impl EvidenceSynthesizer {
    pub fn new(router: Arc<LlmRouter>, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            router,
            estimator,
            scorer: ConfidenceScorer::new(),
        }
    }

    pub async fn synthesize(&self, claim: &Claim, gathered: &[GatheredSubClaim]) -> Synthesis {
        let mut sub_claims = Vec::with_capacity(gathered.len());
        for sub_claim in gathered {
            let mut evidence = Vec::with_capacity(sub_claim.sources.len());
            for source in &sub_claim.sources {
                evidence.push(self.analyze_source(&claim.text, source).await);
            }
            sub_claims.push(SubClaimReport { text: sub_claim.text.clone(), evidence });
        }

        let all_evidence: Vec<Evidence> = sub_claims
            .iter()
            .flat_map(|s| s.evidence.iter().cloned())
            .collect();

        let verdict = self.aggregate(&all_evidence);
        info!(
            verdict = verdict.label.as_str(),
            confidence = verdict.confidence,
            evidence = all_evidence.len(),
            "Synthesized verdict"
        );

        Synthesis { verdict, sub_claims }
    }

    /// Label one source against the claim, degrading to lexical analysis
    /// when no model responds or the response is unparseable
    async fn analyze_source(&self, claim_text: &str, source: &Source) -> Evidence {
        match self.llm_analyze(claim_text, source).await {
            Ok(Some(evidence)) => evidence,
            Ok(None) => {
                debug!(source = %source.title, "Unparseable analysis, using lexical fallback");
                lexical_analyze(claim_text, source)
            }
            Err(e) => {
                warn!(source = %source.title, "Model analysis unavailable ({}), using lexical fallback", e);
                lexical_analyze(claim_text, source)
            }
        }
    }

    async fn llm_analyze(
        &self,
        claim_text: &str,
        source: &Source,
    ) -> Result<Option<Evidence>, crate::llm::LlmError> {
        let content = truncate_to_budget(&source.content, CONTENT_TOKEN_BUDGET, self.estimator.as_ref());
        let prompt = format!(
            "Claim: \"{}\"\n\nSource Title: {}\nSource Content: {}\n\n\
             Analyze if this source supports, contradicts, or is neutral regarding the claim.",
            claim_text, source.title, content
        );

        let request = ChatRequest::new(vec![
            ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ])
        .with_temperature(0.1)
        .with_max_tokens(400);

        let response = self.router.chat(Stage::Synthesizer, request).await?;
        Ok(parse_analysis(&response.content, source))
    }

    /// Credibility- and confidence-weighted vote over the labeled evidence
    fn aggregate(&self, evidence: &[Evidence]) -> Verdict {
        if evidence.is_empty() {
            return Verdict::insufficient("No sources found to evaluate this claim.");
        }

        let score_for = |stance: Stance| -> f32 {
            evidence
                .iter()
                .filter(|e| e.stance == stance)
                .map(|e| e.confidence * e.source.credibility)
                .sum()
        };

        let supporting = score_for(Stance::Supports);
        let contradicting = score_for(Stance::Contradicts);
        let total = supporting + contradicting;

        // All-neutral evidence carries no vote weight; the confidence is
        // fixed at zero rather than refined off the neutral set
        if total == 0.0 {
            return Verdict::new(
                VerdictLabel::InsufficientEvidence,
                0.0,
                summarize(evidence, VerdictLabel::InsufficientEvidence),
            );
        }

        let ratio = supporting / total;
        let (label, base) = if ratio >= SUPPORT_RATIO_THRESHOLD && supporting > 0.0 {
            (VerdictLabel::Supported, (ratio * 0.9).min(CONFIDENCE_CAP))
        } else if ratio <= CONTRADICT_RATIO_THRESHOLD && contradicting > 0.0 {
            (VerdictLabel::Contradicted, ((1.0 - ratio) * 0.9).min(CONFIDENCE_CAP))
        } else {
            (VerdictLabel::InsufficientEvidence, 0.5)
        };

        let confidence = self.scorer.refine(base, evidence);
        Verdict::new(label, confidence, summarize(evidence, label))
    }
}

/// Word-overlap fallback analysis when no model is reachable
fn lexical_analyze(claim_text: &str, source: &Source) -> Evidence {
    let overlap = overlap_ratio(claim_text, &source.content);
    let negated = has_contextual_negation(claim_text, &source.content);

    let stance = if overlap > LEXICAL_SUPPORT_THRESHOLD {
        if negated {
            Stance::Contradicts
        } else {
            Stance::Supports
        }
    } else {
        Stance::Neutral
    };

    let length_factor = (source.content.len() as f32 / 500.0).min(1.0);
    let confidence = overlap * 0.5 + source.credibility * 0.3 + length_factor * 0.2;
    let quote = extract_overlapping_sentences(claim_text, &source.content);

    Evidence::new(source.clone(), quote, stance, confidence, AnalysisMethod::Lexical)
}

/// Parse the `ASSESSMENT:` / `CONFIDENCE:` / `RELEVANT_TEXT:` layout
fn parse_analysis(response: &str, source: &Source) -> Option<Evidence> {
    let mut stance = None;
    let mut confidence = 0.5;
    let mut quote = String::new();

    for line in response.lines() {
        let line = line.trim();
        if let Some(captures) = ASSESSMENT_RE.captures(line) {
            stance = Some(match captures[1].to_uppercase().as_str() {
                "SUPPORTS" => Stance::Supports,
                "CONTRADICTS" => Stance::Contradicts,
                _ => Stance::Neutral,
            });
        } else if let Some(rest) = line.strip_prefix("CONFIDENCE:") {
            if let Ok(value) = rest.trim().trim_matches(|c| c == '[' || c == ']').parse::<f32>() {
                confidence = value.clamp(0.0, 1.0);
            }
        } else if let Some(rest) = line.strip_prefix("RELEVANT_TEXT:") {
            quote = rest.trim().to_string();
        }
    }

    stance.map(|stance| {
        Evidence::new(source.clone(), quote, stance, confidence, AnalysisMethod::Model)
    })
}

/// Verdict sentence, stance counts, and the strongest quotes
fn summarize(evidence: &[Evidence], label: VerdictLabel) -> String {
    let count_of = |stance: Stance| evidence.iter().filter(|e| e.stance == stance).count();
    let supporting = count_of(Stance::Supports);
    let contradicting = count_of(Stance::Contradicts);
    let neutral = count_of(Stance::Neutral);

    let mut parts = vec![match label {
        VerdictLabel::Supported => "This claim is SUPPORTED by the available evidence.".to_string(),
        VerdictLabel::Contradicted => {
            "This claim is CONTRADICTED by the available evidence.".to_string()
        }
        VerdictLabel::InsufficientEvidence => {
            "There is INSUFFICIENT EVIDENCE to verify this claim.".to_string()
        }
    }];

    parts.push(format!(
        "Found {} sources: {} supporting, {} contradicting, {} neutral.",
        evidence.len(),
        supporting,
        contradicting,
        neutral
    ));

    if let Some(best) = strongest_quote(evidence, Stance::Supports) {
        parts.push(format!("Key supporting evidence: {}", best));
    }
    if let Some(best) = strongest_quote(evidence, Stance::Contradicts) {
        parts.push(format!("Key contradicting evidence: {}", best));
    }

    parts.join(" ")
}

fn strongest_quote(evidence: &[Evidence], stance: Stance) -> Option<String> {
    evidence
        .iter()
        .filter(|e| e.stance == stance && !e.quote.is_empty())
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
        .map(|e| {
            let mut end = e.quote.len().min(QUOTE_PREVIEW_CHARS);
            while end < e.quote.len() && !e.quote.is_char_boundary(end) {
                end += 1;
            }
            e.quote[..end].to_string()
        })
}

fn overlap_ratio(claim_text: &str, content: &str) -> f32 {
    if content.is_empty() {
        return 0.0;
    }
    let claim_words: HashSet<String> = normalized_words(claim_text).collect();
    if claim_words.is_empty() {
        return 0.0;
    }
    let content_words: HashSet<String> = normalized_words(content).collect();
    claim_words.intersection(&content_words).count() as f32 / claim_words.len() as f32
}

/// Any claim word preceded by a negation marker in the source text
fn has_contextual_negation(claim_text: &str, content: &str) -> bool {
    let words: Vec<String> = normalized_words(claim_text).map(|w| regex::escape(&w)).collect();
    if words.is_empty() {
        return false;
    }

    let pattern = format!(r"\b(?:not|no|never|false)\s+(?:{})", words.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(&content.to_lowercase()),
        Err(_) => false,
    }
}

/// First sentences of the source sharing significant words with the claim
fn extract_overlapping_sentences(claim_text: &str, content: &str) -> String {
    let claim_words: HashSet<String> = normalized_words(claim_text).collect();
    let required = 2.min((claim_words.len() as f32 * 0.3).ceil() as usize).max(1);

    content
        .split('.')
        .map(str::trim)
        .filter(|sentence| {
            let sentence_words: HashSet<String> = normalized_words(sentence).collect();
            claim_words.intersection(&sentence_words).count() >= required
        })
        .take(2)
        .collect::<Vec<_>>()
        .join(". ")
}

fn normalized_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::mock::MockChatProvider;
    use crate::llm::tokens::WordBasedEstimator;
    use crate::llm::ProviderKind;
    use crate::models::{ClaimCategory, SourceKind};

    fn bare_router() -> LlmRouter {
        let mut settings = Settings::default();
        settings.llm_models.ollama_enabled = false;
        LlmRouter::from_settings(&settings).with_max_retries(1)
    }

    fn synthesizer(router: LlmRouter) -> EvidenceSynthesizer {
        EvidenceSynthesizer::new(Arc::new(router), Arc::new(WordBasedEstimator::default()))
    }

    fn claim() -> Claim {
        let mut claim = Claim::new(
            "The Berlin Wall fell in 1989.",
            "The Berlin Wall fell in 1989.",
        );
        claim.category = ClaimCategory::HistoricalDate;
        claim
    }

    fn wall_source() -> Source {
        Source::new(
            "https://en.wikipedia.org/wiki/Berlin_Wall",
            "Berlin Wall",
            "The fall of the Berlin Wall in 1989 marked the end of a divided Berlin. \
             The wall fell on 9 November 1989 after weeks of civil unrest.",
            SourceKind::Encyclopedia,
            0.9,
        )
    }

    fn gathered(sources: Vec<Source>) -> Vec<GatheredSubClaim> {
        vec![GatheredSubClaim { text: "The Berlin Wall fell in 1989.".to_string(), sources }]
    }

    #[test]
    fn test_parse_well_formed_analysis() {
        let response = "ASSESSMENT: SUPPORTS\nCONFIDENCE: 0.85\n\
                        RELEVANT_TEXT: The wall fell on 9 November 1989.\nREASONING: Direct match.";
        let evidence = parse_analysis(response, &wall_source()).unwrap();
        assert_eq!(evidence.stance, Stance::Supports);
        assert_eq!(evidence.confidence, 0.85);
        assert_eq!(evidence.quote, "The wall fell on 9 November 1989.");
        assert_eq!(evidence.method, AnalysisMethod::Model);
    }

    #[test]
    fn test_parse_bracketed_assessment() {
        let response = "ASSESSMENT: [CONTRADICTS]\nCONFIDENCE: [0.6]";
        let evidence = parse_analysis(response, &wall_source()).unwrap();
        assert_eq!(evidence.stance, Stance::Contradicts);
        assert_eq!(evidence.confidence, 0.6);
    }

    #[test]
    fn test_parse_missing_assessment_is_none() {
        assert!(parse_analysis("The source looks fine to me.", &wall_source()).is_none());
    }

    #[test]
    fn test_lexical_fallback_reads_support() {
        let evidence = lexical_analyze("The Berlin Wall fell in 1989.", &wall_source());
        assert_eq!(evidence.stance, Stance::Supports);
        assert_eq!(evidence.method, AnalysisMethod::Lexical);
        assert!(evidence.confidence > 0.0);
        assert!(evidence.quote.contains("1989"));
    }

    #[test]
    fn test_lexical_fallback_detects_negation() {
        let source = Source::new(
            "https://example.com",
            "Wall history",
            "The Berlin Wall never fell in 1989 according to this account of the wall.",
            SourceKind::Web,
            0.5,
        );
        let evidence = lexical_analyze("The Berlin Wall fell in 1989.", &source);
        assert_eq!(evidence.stance, Stance::Contradicts);
    }

    #[test]
    fn test_lexical_fallback_neutral_on_low_overlap() {
        let source = Source::new(
            "https://example.com",
            "Gardening",
            "Tomatoes grow best in full sunlight with regular watering.",
            SourceKind::Web,
            0.5,
        );
        let evidence = lexical_analyze("The Berlin Wall fell in 1989.", &source);
        assert_eq!(evidence.stance, Stance::Neutral);
    }

    #[tokio::test]
    async fn test_zero_sources_yields_insufficient_evidence() {
        let synthesizer = synthesizer(bare_router());
        let synthesis = synthesizer.synthesize(&claim(), &gathered(Vec::new())).await;

        assert_eq!(synthesis.verdict.label, VerdictLabel::InsufficientEvidence);
        assert_eq!(synthesis.verdict.confidence, 0.0);
        assert!(synthesis.verdict.rationale.contains("No sources found"));
    }

    #[tokio::test]
    async fn test_supporting_evidence_yields_supported() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai).with_repeating_response(
            "ASSESSMENT: SUPPORTS\nCONFIDENCE: 0.9\nRELEVANT_TEXT: The wall fell on 9 November 1989.",
        ));
        let synthesizer = synthesizer(bare_router().with_provider(provider));

        let synthesis = synthesizer
            .synthesize(&claim(), &gathered(vec![wall_source(), wall_source()]))
            .await;

        assert_eq!(synthesis.verdict.label, VerdictLabel::Supported);
        assert!((0.0..=1.0).contains(&synthesis.verdict.confidence));
        assert!(synthesis.verdict.rationale.contains("2 supporting"));
        assert_eq!(synthesis.sub_claims[0].evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_contradicting_evidence_yields_contradicted() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai).with_repeating_response(
            "ASSESSMENT: CONTRADICTS\nCONFIDENCE: 0.9\nRELEVANT_TEXT: The wall never fell that year.",
        ));
        let synthesizer = synthesizer(bare_router().with_provider(provider));

        let synthesis = synthesizer.synthesize(&claim(), &gathered(vec![wall_source()])).await;

        assert_eq!(synthesis.verdict.label, VerdictLabel::Contradicted);
        assert!(synthesis.verdict.rationale.contains("Key contradicting evidence"));
    }

    #[tokio::test]
    async fn test_all_neutral_yields_insufficient_evidence() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai)
            .with_repeating_response("ASSESSMENT: NEUTRAL\nCONFIDENCE: 0.4"));
        let synthesizer = synthesizer(bare_router().with_provider(provider));

        let synthesis = synthesizer.synthesize(&claim(), &gathered(vec![wall_source()])).await;
        assert_eq!(synthesis.verdict.label, VerdictLabel::InsufficientEvidence);
        assert_eq!(synthesis.verdict.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_multiple_neutral_sources_keep_zero_confidence() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai)
            .with_repeating_response("ASSESSMENT: NEUTRAL\nCONFIDENCE: 0.8"));
        let synthesizer = synthesizer(bare_router().with_provider(provider));

        let synthesis = synthesizer
            .synthesize(&claim(), &gathered(vec![wall_source(), wall_source(), wall_source()]))
            .await;

        assert_eq!(synthesis.verdict.label, VerdictLabel::InsufficientEvidence);
        assert_eq!(synthesis.verdict.confidence, 0.0);
        assert!(synthesis.verdict.rationale.contains("3 neutral"));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_lexical() {
        let provider = Arc::new(MockChatProvider::new(ProviderKind::Openai).failing());
        let synthesizer = synthesizer(bare_router().with_provider(provider));

        let synthesis = synthesizer.synthesize(&claim(), &gathered(vec![wall_source()])).await;

        assert_eq!(synthesis.verdict.label, VerdictLabel::Supported);
        assert_eq!(
            synthesis.sub_claims[0].evidence[0].method,
            AnalysisMethod::Lexical
        );
    }
}
