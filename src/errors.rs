//! Unified error types for voxledger.
//!
//! Variants fall into three groups: caller mistakes (`InvalidAmount`,
//! `EmptyCategory`, `InvalidCommand`), reported non-fatal conditions
//! (`NoTransactions`, `NoPendingConfirmation`), and external/infrastructure
//! failures. The orchestrator recovers all of them into structured
//! [`Outcome`](crate::core::pipeline::Outcome) values; nothing here should
//! ever take down a per-user handler.

use rust_decimal::Decimal;
use thiserror::Error;

/// All error conditions the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction amount is zero or negative.
    #[error("invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount {
        /// The rejected amount.
        amount: Decimal,
    },

    /// Transaction category is empty or whitespace.
    #[error("category must not be empty")]
    EmptyCategory,

    /// A typed command could not be parsed from its tokens.
    #[error("invalid command: {message}")]
    InvalidCommand {
        /// Human-readable parse failure.
        message: String,
    },

    /// The user has no transactions to delete.
    #[error("no transactions to delete")]
    NoTransactions,

    /// Confirm/reject arrived with no live pending candidate.
    #[error("nothing is awaiting confirmation")]
    NoPendingConfirmation,

    /// Speech-to-text failed: adapter error, timeout, or unintelligible audio.
    #[error("transcription failed: {message}")]
    TranscriptionFailed {
        /// Operator-facing detail.
        message: String,
    },

    /// The audio format hint names a format the transcriber does not accept.
    #[error("unsupported audio format: {hint}")]
    UnsupportedAudio {
        /// The offending format hint.
        hint: String,
    },

    /// The intent extractor failed outright (service error or timeout).
    #[error("extraction failed: {message}")]
    ExtractionFailed {
        /// Operator-facing detail.
        message: String,
    },

    /// The extractor returned a candidate that violates its contract
    /// (unparseable amount, bad direction, category outside the allowed set).
    #[error("extractor returned invalid candidate: {message}")]
    ExtractionInvalid {
        /// Operator-facing detail.
        message: String,
    },

    /// Configuration error (missing/unparseable settings).
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// Database error from sea-orm.
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// HTTP error talking to an external service.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
