//! Token estimation for prompt budgeting

use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;
}

/// Tiktoken-based estimator using the cl100k_base encoding
pub struct TiktokenEstimator {
    bpe: CoreBPE,
}

impl TiktokenEstimator {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self { bpe: cl100k_base()? })
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Word-count estimator (~1.3 tokens per word), used when the BPE tables
/// cannot be loaded
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}

/// Best available estimator: tiktoken, with the word-count fallback
pub fn shared_estimator() -> Arc<dyn TokenEstimator> {
    match TiktokenEstimator::new() {
        Ok(estimator) => Arc::new(estimator),
        Err(e) => {
            warn!("Tiktoken unavailable ({}), using word-based estimation", e);
            Arc::new(WordBasedEstimator::default())
        }
    }
}

/// Trim `text` so its estimate fits within `max_tokens`
///
/// Cuts proportionally and re-estimates until the budget holds; always cuts
/// on a char boundary.
pub fn truncate_to_budget(text: &str, max_tokens: usize, estimator: &dyn TokenEstimator) -> String {
    if max_tokens == 0 || text.is_empty() {
        return String::new();
    }

    let tokens = estimator.estimate(text);
    if tokens <= max_tokens {
        return text.to_string();
    }

    let mut keep = text.len() * max_tokens / tokens;
    loop {
        while keep > 0 && !text.is_char_boundary(keep) {
            keep -= 1;
        }
        if keep == 0 {
            return String::new();
        }
        let candidate = &text[..keep];
        if estimator.estimate(candidate) <= max_tokens {
            return candidate.to_string();
        }
        keep = keep * 9 / 10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiktoken_estimator() {
        let estimator = TiktokenEstimator::new().unwrap();
        let tokens = estimator.estimate("Hello, world! This is a test.");
        assert!(tokens > 0);
        assert!(tokens < 20);
    }

    #[test]
    fn test_word_based_estimator() {
        let estimator = WordBasedEstimator::default();
        assert_eq!(estimator.estimate("Hello world test"), 4); // 3 * 1.3 -> 4
        assert_eq!(estimator.estimate(""), 0);
    }

    #[test]
    fn test_truncate_within_budget_is_identity() {
        let estimator = WordBasedEstimator::default();
        let text = "short text";
        assert_eq!(truncate_to_budget(text, 100, &estimator), text);
    }

    #[test]
    fn test_truncate_shrinks_to_budget() {
        let estimator = WordBasedEstimator::default();
        let text = "word ".repeat(200);
        let truncated = truncate_to_budget(&text, 20, &estimator);
        assert!(estimator.estimate(&truncated) <= 20);
        assert!(!truncated.is_empty());
    }

    #[test]
    fn test_truncate_zero_budget() {
        let estimator = WordBasedEstimator::default();
        assert_eq!(truncate_to_budget("anything", 0, &estimator), "");
    }
}
