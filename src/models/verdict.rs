//! Verdict and report models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evidence::{Evidence, Source};

/// Terminal label for a verified claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictLabel {
    Supported,
    Contradicted,
    InsufficientEvidence,
}

impl VerdictLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLabel::Supported => "SUPPORTED",
            VerdictLabel::Contradicted => "CONTRADICTED",
            VerdictLabel::InsufficientEvidence => "INSUFFICIENT_EVIDENCE",
        }
    }
}

/// Final outcome for a claim: label, confidence, and rationale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub confidence: f32,
    /// Human-readable explanation referencing the evidence set
    pub rationale: String,
}

impl Verdict {
    pub fn new(label: VerdictLabel, confidence: f32, rationale: impl Into<String>) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }

    /// Zero-evidence outcome; records the reason in the rationale
    pub fn insufficient(rationale: impl Into<String>) -> Self {
        Self::new(VerdictLabel::InsufficientEvidence, 0.0, rationale)
    }
}

/// Evidence collected for a single sub-claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubClaimReport {
    pub text: String,
    pub evidence: Vec<Evidence>,
}

/// Compact source listing included in the output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub credibility: f32,
}

impl From<&Source> for SourceRef {
    fn from(source: &Source) -> Self {
        Self {
            url: source.url.clone(),
            title: source.title.clone(),
            credibility: source.credibility,
        }
    }
}

/// One entry of the JSON result file, produced per input claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub claim: String,
    pub verdict: VerdictLabel,
    pub confidence: f32,
    pub evidence_summary: String,
    pub sources: Vec<SourceRef>,
    pub sub_claims: Vec<SubClaimReport>,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Set when a stage failed and the claim was downgraded instead of
    /// aborting the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl VerificationReport {
    /// Report for a claim that could not be processed past some stage
    pub fn degraded(claim: impl Into<String>, reason: impl Into<String>, processing_time_ms: u64) -> Self {
        let reason = reason.into();
        Self {
            claim: claim.into(),
            verdict: VerdictLabel::InsufficientEvidence,
            confidence: 0.0,
            evidence_summary: "Verification could not be completed.".to_string(),
            sources: Vec::new(),
            sub_claims: Vec::new(),
            processing_time_ms,
            timestamp: Utc::now(),
            degraded: Some(reason),
        }
    }
}
