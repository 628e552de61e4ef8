//! Claim, sub-claim, and entity models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Broad category assigned by the context classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    HistoricalDate,
    Biographical,
    Corporate,
    News,
    Unknown,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimCategory::HistoricalDate => "historical_date",
            ClaimCategory::Biographical => "biographical",
            ClaimCategory::Corporate => "corporate",
            ClaimCategory::News => "news",
            ClaimCategory::Unknown => "unknown",
        }
    }
}

/// Kind of extracted named entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Date,
    Other,
}

/// A named entity found in the normalized claim text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
    /// Byte span in the normalized claim text; (0, 0) when the entity was
    /// reported by a model rather than located in the text
    pub span: (usize, usize),
    pub confidence: f32,
}

impl Entity {
    pub fn new(text: impl Into<String>, kind: EntityKind, span: (usize, usize), confidence: f32) -> Self {
        Self {
            text: text.into(),
            kind,
            span,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// An input claim after normalization
///
/// The classifier fills in `category` and `entities`; after decomposition
/// starts the claim is treated as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    /// Text exactly as received
    pub raw_text: String,
    /// Cleaned text the rest of the pipeline operates on
    pub text: String,
    pub category: ClaimCategory,
    pub entities: Vec<Entity>,
    pub ingested_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(raw_text: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_text: raw_text.into(),
            text: text.into(),
            category: ClaimCategory::Unknown,
            entities: Vec::new(),
            ingested_at: Utc::now(),
        }
    }
}

/// An independently checkable assertion derived from a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubClaim {
    pub text: String,
    pub entities: Vec<Entity>,
    pub category: ClaimCategory,
    /// Sub-claims flagged unverifiable are skipped by the gatherer
    pub verifiable: bool,
}

impl SubClaim {
    pub fn new(text: impl Into<String>, category: ClaimCategory) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
            category,
            verifiable: true,
        }
    }

    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }
}
