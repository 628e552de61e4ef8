//! Evidence and source models

use serde::{Deserialize, Serialize};

/// Kind of external source an excerpt came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Encyclopedia,
    News,
    Web,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Encyclopedia => "encyclopedia",
            SourceKind::News => "news",
            SourceKind::Web => "web",
        }
    }
}

/// A retrieved document excerpt with scoring metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub content: String,
    pub kind: SourceKind,
    /// Credibility weight in [0,1], assigned per outlet or domain
    pub credibility: f32,
    /// Query-overlap relevance in [0,1], assigned by the gatherer
    pub relevance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl Source {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: SourceKind,
        credibility: f32,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            kind,
            credibility: credibility.clamp(0.0, 1.0),
            relevance: 0.0,
            published_at: None,
        }
    }

    pub fn with_published_at(mut self, published_at: Option<String>) -> Self {
        self.published_at = published_at;
        self
    }

    /// Combined score used to rank sources before truncation
    pub fn ranking_score(&self) -> f32 {
        (self.relevance + self.credibility) / 2.0
    }
}

/// Stance of a source towards the claim under verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Supports,
    Contradicts,
    Neutral,
}

/// How a stance was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMethod {
    /// Assessed by a language model
    Model,
    /// Lexical-overlap fallback when no model responded
    Lexical,
}

/// A labeled piece of evidence consumed by the synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub source: Source,
    /// Quoted text the stance is based on
    pub quote: String,
    pub stance: Stance,
    pub confidence: f32,
    pub method: AnalysisMethod,
}

impl Evidence {
    pub fn new(
        source: Source,
        quote: impl Into<String>,
        stance: Stance,
        confidence: f32,
        method: AnalysisMethod,
    ) -> Self {
        Self {
            source,
            quote: quote.into(),
            stance,
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranking_score() {
        let mut source = Source::new("https://a", "A", "text", SourceKind::Web, 0.8);
        source.relevance = 0.4;
        assert!((source.ranking_score() - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn test_credibility_clamping() {
        let source = Source::new("https://a", "A", "text", SourceKind::News, 1.4);
        assert_eq!(source.credibility, 1.0);
    }

    #[test]
    fn test_evidence_confidence_clamping() {
        let source = Source::new("https://a", "A", "text", SourceKind::Web, 0.5);
        let evidence = Evidence::new(source, "quote", Stance::Supports, 1.2, AnalysisMethod::Model);
        assert_eq!(evidence.confidence, 1.0);
    }
}
