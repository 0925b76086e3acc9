//! Voice processing boundary: transcription and transaction extraction.
//!
//! The rest of the crate only ever sees the narrow typed contracts defined
//! here - [`Transcriber`], [`IntentExtractor`], [`Extraction`] - never the
//! native response shapes of the external services. The OpenAI-backed
//! implementations live in [`openai`]; tests substitute programmable fakes.

pub mod openai;

use crate::entities::Direction;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Expense categories the extractor is allowed to choose from.
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "Food",
    "Transport",
    "Housing",
    "Utilities",
    "Communication",
    "Health",
    "Clothing",
    "Entertainment",
    "Gifts",
    "Other",
];

/// Income categories the extractor is allowed to choose from.
pub const INCOME_CATEGORIES: &[&str] = &[
    "Salary",
    "Freelance",
    "Gifts",
    "Sales",
    "Interest",
    "Cashback",
    "Investments",
    "Bonus",
    "Benefits",
    "Other",
];

/// Returns the allowed category list for a direction.
#[must_use]
pub const fn categories_for(direction: Direction) -> &'static [&'static str] {
    match direction {
        Direction::Income => INCOME_CATEGORIES,
        Direction::Expense => EXPENSE_CATEGORIES,
    }
}

/// Audio formats the transcription boundary accepts. Anything else is
/// rejected up front; the core never attempts transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Ogg container (Telegram voice notes arrive as .oga/.ogg)
    Ogg,
    /// Raw Opus
    Opus,
    /// MPEG layer 3
    Mp3,
    /// RIFF wave
    Wav,
    /// MPEG-4 audio
    M4a,
}

impl AudioFormat {
    /// Resolves a transport-provided format hint (a file extension or bare
    /// format name, with or without a leading dot) into a supported format.
    pub fn from_hint(hint: &str) -> Result<Self> {
        match hint.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ogg" | "oga" => Ok(Self::Ogg),
            "opus" => Ok(Self::Opus),
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "m4a" => Ok(Self::M4a),
            _ => Err(Error::UnsupportedAudio {
                hint: hint.to_string(),
            }),
        }
    }

    /// Canonical file extension for upload file names.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }

    /// MIME type sent with multipart uploads.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Opus => "audio/opus",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::M4a => "audio/mp4",
        }
    }
}

/// A structured transaction proposal produced by the intent extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTransaction {
    /// Income or expense
    pub direction: Direction,
    /// Proposed amount (scale 2)
    pub amount: Decimal,
    /// Proposed category
    pub category: String,
    /// Optional free-text description
    pub description: Option<String>,
}

impl CandidateTransaction {
    /// Checks the same constraints the ledger enforces at insert time.
    /// An extractor output failing these must never reach the confirmation
    /// session manager.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount {
                amount: self.amount,
            });
        }
        if self.category.trim().is_empty() {
            return Err(Error::EmptyCategory);
        }
        Ok(())
    }
}

/// Outcome of intent extraction over an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The utterance described a transaction
    Candidate(CandidateTransaction),
    /// The utterance carried no financial intent
    NoTransaction,
}

/// Speech-to-text adapter: audio bytes in, plain-text utterance out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes an audio payload of a known, supported format.
    async fn transcribe(&self, audio: &[u8], format: AudioFormat) -> Result<String>;
}

/// Language-understanding adapter: utterance in, structured candidate out.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Extracts a transaction candidate from an utterance, or reports that
    /// no transaction was described.
    async fn extract(&self, utterance: &str) -> Result<Extraction>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hints_resolve_case_insensitively() {
        assert_eq!(AudioFormat::from_hint(".OGA").unwrap(), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_hint("mp3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_hint(" wav ").unwrap(), AudioFormat::Wav);
    }

    #[test]
    fn unsupported_hint_is_rejected() {
        let err = AudioFormat::from_hint("flac").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAudio { hint } if hint == "flac"));
    }

    #[test]
    fn candidate_validation_matches_ledger_rules() {
        let mut candidate = CandidateTransaction {
            direction: Direction::Expense,
            amount: "12.50".parse().unwrap(),
            category: "Food".to_string(),
            description: None,
        };
        assert!(candidate.validate().is_ok());

        candidate.amount = Decimal::ZERO;
        assert!(matches!(
            candidate.validate(),
            Err(Error::InvalidAmount { .. })
        ));

        candidate.amount = "5.00".parse().unwrap();
        candidate.category = "   ".to_string();
        assert!(matches!(candidate.validate(), Err(Error::EmptyCategory)));
    }

    #[test]
    fn category_lists_cover_both_directions() {
        assert!(categories_for(Direction::Expense).contains(&"Food"));
        assert!(categories_for(Direction::Income).contains(&"Salary"));
    }
}
