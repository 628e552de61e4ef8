//! Topic classification and pattern-based entity extraction

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{Claim, ClaimCategory, Entity, EntityKind};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}\b").unwrap());
static MONTH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}\b",
    )
    .unwrap()
});
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/\-]\d{1,2}[/\-]\d{4}\b").unwrap());
static ORGANIZATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]*(?:\s+[A-Z][a-z]*)*\s+(?:Inc|Corp|Company|Corporation|Ltd|LLC)\b")
        .unwrap()
});
static MULTIWORD_CAPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap());

const BIOGRAPHICAL_KEYWORDS: [&str; 14] = [
    "born", "birth", "died", "death", "lived", "age", "married", "graduated", "studied", "worked",
    "served", "became", "appointed", "elected",
];

const CORPORATE_KEYWORDS: [&str; 12] = [
    "founded", "established", "company", "corporation", "business", "startup", "ipo", "acquired",
    "merger", "revenue", "profit", "headquarters",
];

const NEWS_KEYWORDS: [&str; 10] = [
    "announced", "reported", "happened", "occurred", "event", "incident", "today", "yesterday",
    "recently", "breaking",
];

/// Assigns a claim category and extracts coarse entities
///
/// Classification is purely pattern-based: date patterns plus keyword
/// groups decide the category, and entities come from year, organization
/// suffix, and capitalized-phrase patterns.
#[derive(Debug, Default)]
pub struct ContextClassifier;

impl ContextClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, claim: &mut Claim) {
        claim.category = self.categorize(&claim.text);
        claim.entities = self.extract_entities(&claim.text);

        debug!(
            category = claim.category.as_str(),
            entities = claim.entities.len(),
            "Classified claim"
        );
    }

    fn categorize(&self, text: &str) -> ClaimCategory {
        let lower = text.to_lowercase();
        let has_biographical = BIOGRAPHICAL_KEYWORDS.iter().any(|k| lower.contains(k));
        let has_corporate = CORPORATE_KEYWORDS.iter().any(|k| lower.contains(k));

        if self.contains_date(text) {
            if has_biographical {
                return ClaimCategory::Biographical;
            }
            if has_corporate {
                return ClaimCategory::Corporate;
            }
            return ClaimCategory::HistoricalDate;
        }

        if has_biographical {
            return ClaimCategory::Biographical;
        }
        if has_corporate {
            return ClaimCategory::Corporate;
        }
        if NEWS_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return ClaimCategory::News;
        }
        ClaimCategory::Unknown
    }

    fn contains_date(&self, text: &str) -> bool {
        YEAR_RE
            .find_iter(text)
            .any(|m| is_plausible_year(m.as_str()))
            || MONTH_DATE_RE.is_match(text)
            || NUMERIC_DATE_RE.is_match(text)
    }

    fn extract_entities(&self, text: &str) -> Vec<Entity> {
        let mut entities = Vec::new();

        for m in YEAR_RE.find_iter(text) {
            if is_plausible_year(m.as_str()) {
                entities.push(Entity::new(m.as_str(), EntityKind::Date, (m.start(), m.end()), 0.7));
            }
        }

        for m in ORGANIZATION_RE.find_iter(text) {
            entities.push(Entity::new(
                m.as_str(),
                EntityKind::Organization,
                (m.start(), m.end()),
                0.6,
            ));
        }

        // Capitalized phrases not already claimed by an organization match
        for m in MULTIWORD_CAPS_RE.find_iter(text) {
            let overlaps = entities
                .iter()
                .any(|e| m.start() < e.span.1 && e.span.0 < m.end());
            if !overlaps {
                entities.push(Entity::new(m.as_str(), EntityKind::Other, (m.start(), m.end()), 0.5));
            }
        }

        entities
    }
}

fn is_plausible_year(text: &str) -> bool {
    text.parse::<i32>()
        .map(|year| (1000..=Utc::now().year() + 10).contains(&year))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Claim;

    fn classify(text: &str) -> Claim {
        let mut claim = Claim::new(text, text);
        ContextClassifier::new().classify(&mut claim);
        claim
    }

    #[test]
    fn test_historical_date_category() {
        let claim = classify("The Berlin Wall fell in 1989.");
        assert_eq!(claim.category, ClaimCategory::HistoricalDate);
    }

    #[test]
    fn test_biographical_beats_plain_date() {
        let claim = classify("Albert Einstein was born in 1879.");
        assert_eq!(claim.category, ClaimCategory::Biographical);
    }

    #[test]
    fn test_corporate_with_date() {
        let claim = classify("Apple Inc was founded in 1976.");
        assert_eq!(claim.category, ClaimCategory::Corporate);
    }

    #[test]
    fn test_news_without_date() {
        let claim = classify("The agency announced a breaking development.");
        assert_eq!(claim.category, ClaimCategory::News);
    }

    #[test]
    fn test_unknown_category() {
        let claim = classify("Water is a liquid at room temperature.");
        assert_eq!(claim.category, ClaimCategory::Unknown);
    }

    #[test]
    fn test_year_entities_extracted_with_span() {
        let claim = classify("The Berlin Wall fell in 1989.");
        let year = claim
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Date)
            .unwrap();
        assert_eq!(year.text, "1989");
        assert_eq!(&claim.text[year.span.0..year.span.1], "1989");
        assert_eq!(year.confidence, 0.7);
    }

    #[test]
    fn test_implausible_year_is_skipped() {
        let claim = classify("Serial number 9999 was printed on the device casing.");
        assert!(claim.entities.iter().all(|e| e.kind != EntityKind::Date));
    }

    #[test]
    fn test_organization_entities() {
        let claim = classify("Apple Inc was founded in 1976.");
        let org = claim
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Organization)
            .unwrap();
        assert_eq!(org.text, "Apple Inc");
        assert_eq!(org.confidence, 0.6);
    }

    #[test]
    fn test_capitalized_phrase_entities() {
        let claim = classify("The Berlin Wall fell in 1989.");
        assert!(claim
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Other && e.text.contains("Berlin Wall")));
    }
}
