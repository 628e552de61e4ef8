//! Confidence refinement for synthesized verdicts
//!
//! The raw vote-ratio confidence from aggregation is blended with a
//! weighted component score (credibility, strength, consensus, analysis
//! reliability, coherence) and pulled toward a per-evidence ensemble vote.

use crate::models::{AnalysisMethod, Evidence, Stance};

const WEIGHT_SOURCE_CREDIBILITY: f32 = 0.25;
const WEIGHT_EVIDENCE_STRENGTH: f32 = 0.25;
const WEIGHT_CONSENSUS: f32 = 0.20;
const WEIGHT_PROVIDER_RELIABILITY: f32 = 0.15;
const WEIGHT_RESPONSE_COHERENCE: f32 = 0.15;

/// How strongly the ensemble vote pulls the blended confidence
const ENSEMBLE_PULL: f32 = 0.3;

/// Component scores feeding the weighted blend, each in [0,1]
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceComponents {
    pub source_credibility: f32,
    pub evidence_strength: f32,
    pub consensus: f32,
    pub provider_reliability: f32,
    pub response_coherence: f32,
}

impl ConfidenceComponents {
    /// Derive all components from a labeled evidence set
    pub fn from_evidence(evidence: &[Evidence]) -> Self {
        Self {
            source_credibility: source_credibility(evidence),
            evidence_strength: evidence_strength(evidence),
            consensus: consensus(evidence),
            provider_reliability: provider_reliability(evidence),
            response_coherence: response_coherence(evidence),
        }
    }
}

/// One evidence item's vote in the ensemble adjustment
#[derive(Debug, Clone, Copy)]
pub struct EnsembleVote {
    pub stance: Stance,
    pub confidence: f32,
    /// Source credibility of the voting evidence
    pub quality: f32,
}

impl From<&Evidence> for EnsembleVote {
    fn from(evidence: &Evidence) -> Self {
        Self {
            stance: evidence.stance,
            confidence: evidence.confidence,
            quality: evidence.source.credibility,
        }
    }
}

/// Weighted component blend plus ensemble adjustment
#[derive(Debug, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Refine the aggregation confidence for a non-trivial evidence set
    ///
    /// The vote-ratio base is averaged with the component blend, then
    /// pulled toward the ensemble confidence. Result is clamped to [0,1].
    pub fn refine(&self, base: f32, evidence: &[Evidence]) -> f32 {
        if evidence.is_empty() {
            return base.clamp(0.0, 1.0);
        }

        let components = ConfidenceComponents::from_evidence(evidence);
        let blended = (base + self.component_blend(&components)) / 2.0;

        let votes: Vec<EnsembleVote> = evidence.iter().map(EnsembleVote::from).collect();
        let adjusted = match self.ensemble_confidence(&votes) {
            Some(ensemble) => blended + (ensemble - blended) * ENSEMBLE_PULL,
            None => blended,
        };

        adjusted.clamp(0.0, 1.0)
    }

    pub fn component_blend(&self, components: &ConfidenceComponents) -> f32 {
        let weighted = components.source_credibility * WEIGHT_SOURCE_CREDIBILITY
            + components.evidence_strength * WEIGHT_EVIDENCE_STRENGTH
            + components.consensus * WEIGHT_CONSENSUS
            + components.provider_reliability * WEIGHT_PROVIDER_RELIABILITY
            + components.response_coherence * WEIGHT_RESPONSE_COHERENCE;
        weighted.clamp(0.0, 1.0)
    }

    /// Margin-and-quality confidence of the winning stance, if any vote
    /// carries weight
    pub fn ensemble_confidence(&self, votes: &[EnsembleVote]) -> Option<f32> {
        if votes.is_empty() {
            return None;
        }

        let score_for = |stance: Stance| -> f32 {
            votes
                .iter()
                .filter(|v| v.stance == stance)
                .map(|v| v.confidence * v.quality)
                .sum()
        };

        let supports = score_for(Stance::Supports);
        let contradicts = score_for(Stance::Contradicts);
        let neutral = score_for(Stance::Neutral);
        let total = supports + contradicts + neutral;
        if total == 0.0 {
            return None;
        }

        let winning = supports.max(contradicts).max(neutral);
        let margin = winning / total;

        let mean_quality = votes.iter().map(|v| v.quality).sum::<f32>() / votes.len() as f32;
        Some((margin * 0.7 + mean_quality * 0.3).clamp(0.0, 1.0))
    }
}

fn source_credibility(evidence: &[Evidence]) -> f32 {
    mean(evidence.iter().map(|e| e.source.credibility))
}

fn evidence_strength(evidence: &[Evidence]) -> f32 {
    mean(evidence.iter().map(|e| {
        let mut strength = 0.5;
        if e.quote.len() > 100 {
            strength += 0.2;
        } else if e.quote.len() > 50 {
            strength += 0.1;
        }
        strength += e.confidence * 0.3;
        strength.min(1.0)
    }))
}

fn consensus(evidence: &[Evidence]) -> f32 {
    if evidence.is_empty() {
        return 0.0;
    }

    let count_of = |stance: Stance| evidence.iter().filter(|e| e.stance == stance).count();
    let supporting = count_of(Stance::Supports);
    let contradicting = count_of(Stance::Contradicts);
    let neutral = count_of(Stance::Neutral);

    let max_agreement = supporting.max(contradicting).max(neutral);
    let mut ratio = max_agreement as f32 / evidence.len() as f32;

    if supporting >= 2 && contradicting == 0 {
        ratio = (ratio + 0.2).min(1.0);
    }
    ratio
}

fn provider_reliability(evidence: &[Evidence]) -> f32 {
    mean(evidence.iter().map(|e| match e.method {
        AnalysisMethod::Model => 0.9,
        AnalysisMethod::Lexical => 0.5,
    }))
}

fn response_coherence(evidence: &[Evidence]) -> f32 {
    mean(evidence.iter().map(|e| e.confidence))
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let collected: Vec<f32> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f32>() / collected.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Source, SourceKind};

    fn evidence(stance: Stance, confidence: f32, credibility: f32) -> Evidence {
        let source = Source::new("https://a", "A", "text", SourceKind::Web, credibility);
        Evidence::new(source, "a supporting quote", stance, confidence, AnalysisMethod::Model)
    }

    #[test]
    fn test_refined_confidence_stays_in_range() {
        let scorer = ConfidenceScorer::new();
        let set = vec![
            evidence(Stance::Supports, 1.0, 1.0),
            evidence(Stance::Supports, 1.0, 1.0),
        ];
        let refined = scorer.refine(0.95, &set);
        assert!((0.0..=1.0).contains(&refined));

        let weak = vec![evidence(Stance::Neutral, 0.0, 0.0)];
        let refined = scorer.refine(0.0, &weak);
        assert!((0.0..=1.0).contains(&refined));
    }

    #[test]
    fn test_unanimous_support_beats_split_evidence() {
        let scorer = ConfidenceScorer::new();
        let unanimous = vec![
            evidence(Stance::Supports, 0.8, 0.9),
            evidence(Stance::Supports, 0.8, 0.9),
        ];
        let split = vec![
            evidence(Stance::Supports, 0.8, 0.9),
            evidence(Stance::Contradicts, 0.8, 0.9),
        ];
        assert!(scorer.refine(0.7, &unanimous) > scorer.refine(0.7, &split));
    }

    #[test]
    fn test_empty_evidence_passes_base_through() {
        let scorer = ConfidenceScorer::new();
        assert_eq!(scorer.refine(0.5, &[]), 0.5);
        assert_eq!(scorer.refine(1.7, &[]), 1.0);
    }

    #[test]
    fn test_ensemble_confidence_none_without_weight() {
        let scorer = ConfidenceScorer::new();
        assert!(scorer.ensemble_confidence(&[]).is_none());

        let weightless = vec![EnsembleVote { stance: Stance::Neutral, confidence: 0.0, quality: 0.0 }];
        assert!(scorer.ensemble_confidence(&weightless).is_none());
    }

    #[test]
    fn test_consensus_bonus_for_multiple_supporting() {
        let two_supporting = vec![
            evidence(Stance::Supports, 0.8, 0.9),
            evidence(Stance::Supports, 0.8, 0.9),
        ];
        assert_eq!(consensus(&two_supporting), 1.0);

        let one_each = vec![
            evidence(Stance::Supports, 0.8, 0.9),
            evidence(Stance::Contradicts, 0.8, 0.9),
        ];
        assert_eq!(consensus(&one_each), 0.5);
    }

    #[test]
    fn test_lexical_analysis_lowers_reliability() {
        let source = Source::new("https://a", "A", "text", SourceKind::Web, 0.5);
        let lexical = vec![Evidence::new(
            source,
            "quote",
            Stance::Supports,
            0.5,
            AnalysisMethod::Lexical,
        )];
        let model = vec![evidence(Stance::Supports, 0.5, 0.5)];
        assert!(provider_reliability(&lexical) < provider_reliability(&model));
    }
}
