//! Input validation and text cleaning

use tracing::debug;

use crate::error::{Result, VerificationError};
use crate::models::Claim;

const MIN_LENGTH: usize = 10;
const MAX_LENGTH: usize = 1000;
const MIN_ALPHABETIC: usize = 3;

/// Validates raw input and produces the cleaned claim text
///
/// A rejected claim never enters the pipeline; the caller reports the
/// validation error and moves on.
#[derive(Debug, Default)]
pub struct ClaimNormalizer;

impl ClaimNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw_text: &str) -> Result<Claim> {
        self.validate(raw_text)?;
        let cleaned = self.clean(raw_text);

        debug!(claim = %cleaned, "Normalized claim");
        Ok(Claim::new(raw_text, cleaned))
    }

    fn validate(&self, text: &str) -> Result<()> {
        let trimmed_chars = text.trim().chars().count();

        if trimmed_chars < MIN_LENGTH {
            return Err(VerificationError::InvalidClaim(format!(
                "input too short: {} characters (minimum {})",
                trimmed_chars, MIN_LENGTH
            )));
        }

        let total_chars = text.chars().count();
        if total_chars > MAX_LENGTH {
            return Err(VerificationError::InvalidClaim(format!(
                "input too long: {} characters (maximum {})",
                total_chars, MAX_LENGTH
            )));
        }

        let alphabetic = text.chars().filter(|c| c.is_alphabetic()).count();
        if alphabetic < MIN_ALPHABETIC {
            return Err(VerificationError::InvalidClaim(
                "input contains no meaningful words".to_string(),
            ));
        }

        Ok(())
    }

    fn clean(&self, text: &str) -> String {
        let mut cleaned: String = text
            .chars()
            .map(|c| match c {
                '\u{201c}' | '\u{201d}' | '\u{201e}' => '"',
                '\u{2018}' | '\u{2019}' | '\u{201a}' => '\'',
                '\u{2013}' | '\u{2014}' => '-',
                c if c.is_whitespace() => ' ',
                c => c,
            })
            .filter(|c| !c.is_control())
            .collect();

        cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

        if !cleaned.ends_with(['.', '!', '?']) {
            cleaned.push('.');
        }
        cleaned
    }
}
