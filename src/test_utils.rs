//! Shared test utilities for voxledger.
//!
//! This module provides common helper functions for setting up in-memory
//! test databases, creating test entities, and substituting programmable
//! fakes for the external voice services.

#![allow(clippy::unwrap_used)]

use crate::{
    config::{self, AppConfig},
    core::pipeline::Orchestrator,
    entities::{Direction, transaction, user},
    errors::{Error, Result},
    voice::{AudioFormat, CandidateTransaction, Extraction, IntentExtractor, Transcriber},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database plus one user (chat id 1) for single-user tests.
pub async fn setup_with_user() -> Result<(DatabaseConnection, user::Model)> {
    let db = setup_test_db().await?;
    let user = crate::core::ledger::ensure_user(&db, 1).await?;
    Ok((db, user))
}

/// Parses a decimal literal; panics on bad test input.
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// An expense candidate with the given amount and category.
pub fn expense_candidate(amount: &str, category: &str) -> CandidateTransaction {
    CandidateTransaction {
        direction: Direction::Expense,
        amount: dec(amount),
        category: category.to_string(),
        description: None,
    }
}

/// Inserts a transaction row with an explicit `created_at`, bypassing the
/// server-assigned timestamp. Lets tests place rows on either side of a
/// window boundary.
pub async fn insert_backdated(
    db: &DatabaseConnection,
    user_id: i64,
    direction: Direction,
    amount: &str,
    category: &str,
    created_at: DateTime<Utc>,
) -> Result<transaction::Model> {
    transaction::ActiveModel {
        user_id: Set(user_id),
        direction: Set(direction),
        amount: Set(dec(amount)),
        category: Set(category.to_string()),
        description: Set(None),
        created_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// A transcriber that always returns the same transcript or error.
pub struct FakeTranscriber(std::result::Result<String, String>);

impl FakeTranscriber {
    /// Always transcribes to `text`.
    pub fn ok(text: &str) -> Self {
        Self(Ok(text.to_string()))
    }

    /// Always fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self(Err(message.to_string()))
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8], _format: AudioFormat) -> Result<String> {
        self.0
            .clone()
            .map_err(|message| Error::TranscriptionFailed { message })
    }
}

/// A transcriber that sleeps before answering, for tests that need one
/// user's voice handler held in flight while other events arrive.
pub struct SlowTranscriber {
    delay: std::time::Duration,
    text: String,
}

impl SlowTranscriber {
    /// Transcribes to `text` after `delay_ms` milliseconds.
    pub fn new(delay_ms: u64, text: &str) -> Self {
        Self {
            delay: std::time::Duration::from_millis(delay_ms),
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for SlowTranscriber {
    async fn transcribe(&self, _audio: &[u8], _format: AudioFormat) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }
}

enum FakeExtraction {
    Candidate(CandidateTransaction),
    NoTransaction,
    Invalid(String),
    Failing(String),
}

/// An intent extractor with a fixed, programmable response.
pub struct FakeExtractor(FakeExtraction);

impl FakeExtractor {
    /// Always extracts the given candidate.
    pub fn candidate(candidate: CandidateTransaction) -> Self {
        Self(FakeExtraction::Candidate(candidate))
    }

    /// Always reports "no transaction described".
    pub fn no_transaction() -> Self {
        Self(FakeExtraction::NoTransaction)
    }

    /// Always violates the extractor contract with `message`.
    pub fn invalid(message: &str) -> Self {
        Self(FakeExtraction::Invalid(message.to_string()))
    }

    /// Always fails as a service error with `message`.
    pub fn failing(message: &str) -> Self {
        Self(FakeExtraction::Failing(message.to_string()))
    }
}

#[async_trait]
impl IntentExtractor for FakeExtractor {
    async fn extract(&self, _utterance: &str) -> Result<Extraction> {
        match &self.0 {
            FakeExtraction::Candidate(candidate) => Ok(Extraction::Candidate(candidate.clone())),
            FakeExtraction::NoTransaction => Ok(Extraction::NoTransaction),
            FakeExtraction::Invalid(message) => Err(Error::ExtractionInvalid {
                message: message.clone(),
            }),
            FakeExtraction::Failing(message) => Err(Error::ExtractionFailed {
                message: message.clone(),
            }),
        }
    }
}

/// An orchestrator over the given database and fakes, with default settings.
pub fn test_orchestrator(
    db: DatabaseConnection,
    transcriber: impl Transcriber + 'static,
    extractor: impl IntentExtractor + 'static,
) -> Orchestrator {
    let settings = AppConfig::default();
    Orchestrator::new(db, &settings, Arc::new(transcriber), Arc::new(extractor))
}
