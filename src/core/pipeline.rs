//! Pipeline orchestrator.
//!
//! Receives inbound chat events - typed commands or raw voice payloads -
//! and drives them through the ledger, the query engine, and the voice
//! pipeline. Every error is recovered here into a structured [`Outcome`];
//! a failing handler never crashes and never affects another user's
//! in-flight work. Handlers for the same user are serialized through a
//! per-user async lock; different users interleave freely across the
//! await points of external calls.

use crate::{
    config::AppConfig,
    core::{
        ledger,
        pending::{ConfirmationSessions, PendingTransaction},
        query::{self, BalanceReport, Period, StatsReport},
    },
    entities::{Direction, transaction},
    errors::{Error, Result},
    voice::{AudioFormat, Extraction, IntentExtractor, Transcriber},
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tracing::{error, info, warn};

/// A typed command produced by the transport boundary from an
/// already-tokenized message. Closed set: the orchestrator matches
/// exhaustively, there is no string-based dispatch past this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Record an expense directly
    AddExpense {
        /// Positive amount
        amount: Decimal,
        /// Category label
        category: String,
        /// Optional description
        description: Option<String>,
    },
    /// Record an income directly
    AddIncome {
        /// Positive amount
        amount: Decimal,
        /// Category label
        category: String,
        /// Optional description
        description: Option<String>,
    },
    /// Show the all-time balance
    Balance,
    /// Show statistics for a period
    Stats(Period),
    /// Delete the most recent transaction
    DeleteLast,
    /// Confirm the pending voice transaction
    Confirm,
    /// Reject the pending voice transaction
    Reject,
    /// First contact / usage request
    Start,
    /// Usage request
    Help,
}

impl Command {
    /// Parses a command from transport-tokenized arguments. The first token
    /// is the command name; `add_expense`/`add_income` take
    /// `<amount> <category> [description...]`, `stats` takes a period.
    pub fn from_tokens(tokens: &[&str]) -> Result<Self> {
        let Some((&name, args)) = tokens.split_first() else {
            return Err(Error::InvalidCommand {
                message: "empty command".to_string(),
            });
        };

        match name.to_ascii_lowercase().as_str() {
            "add_expense" => parse_add_args(args).map(|(amount, category, description)| {
                Self::AddExpense {
                    amount,
                    category,
                    description,
                }
            }),
            "add_income" => parse_add_args(args).map(|(amount, category, description)| {
                Self::AddIncome {
                    amount,
                    category,
                    description,
                }
            }),
            "balance" => Ok(Self::Balance),
            "stats" => match args {
                [period] => period.parse().map(Self::Stats),
                _ => Err(Error::InvalidCommand {
                    message: "usage: stats day|week|month|year".to_string(),
                }),
            },
            "delete_last" => Ok(Self::DeleteLast),
            "confirm" => Ok(Self::Confirm),
            "reject" => Ok(Self::Reject),
            "start" => Ok(Self::Start),
            "help" => Ok(Self::Help),
            other => Err(Error::InvalidCommand {
                message: format!("unknown command '{other}'"),
            }),
        }
    }
}

/// Parses `<amount> <category> [description...]`, accepting `,` as the
/// decimal separator.
fn parse_add_args(args: &[&str]) -> Result<(Decimal, String, Option<String>)> {
    let [amount_raw, category, description @ ..] = args else {
        return Err(Error::InvalidCommand {
            message: "usage: <amount> <category> [description]".to_string(),
        });
    };
    let amount: Decimal =
        amount_raw
            .replace(',', ".")
            .parse()
            .map_err(|_| Error::InvalidCommand {
                message: format!("amount '{amount_raw}' is not a number"),
            })?;
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    let description = if description.is_empty() {
        None
    } else {
        Some(description.join(" "))
    };
    Ok((amount.round_dp(2), (*category).to_string(), description))
}

/// One inbound chat event for a user.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// A typed command
    Command(Command),
    /// A raw voice payload with a transport-provided format hint
    Voice {
        /// Raw audio bytes
        audio: Vec<u8>,
        /// File extension or bare format name, e.g. `"oga"`
        format_hint: String,
    },
}

/// Structured result of handling one inbound event. Rendering these for a
/// particular chat surface belongs to the transport layer.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// A command inserted this transaction directly
    Recorded(transaction::Model),
    /// A voice candidate awaits the user's confirmation
    ConfirmationRequested(PendingTransaction),
    /// A confirmed voice candidate was committed
    Committed(transaction::Model),
    /// The pending voice candidate was discarded
    Discarded,
    /// Confirm/reject arrived with nothing pending (or it expired)
    NothingPending,
    /// All-time balance
    Balance(BalanceReport),
    /// Period statistics
    Stats(StatsReport),
    /// The most recent transaction was deleted
    Deleted(transaction::Model),
    /// There was no transaction to delete
    NothingToDelete,
    /// The utterance carried no financial intent
    NoTransactionDetected {
        /// What the audio transcribed to
        transcript: String,
    },
    /// Audio could not be transcribed (bad format, service failure, timeout)
    TranscriptionFailed {
        /// Operator-facing reason; the user just hears "could not process"
        reason: String,
    },
    /// The extractor service failed (not a contract violation)
    ExtractionFailed {
        /// Operator-facing reason
        reason: String,
    },
    /// The caller's input was invalid (amount, category, command shape)
    Invalid {
        /// What was wrong
        reason: String,
    },
    /// Usage information
    Help,
    /// An internal failure; logged, reported, never propagated
    Failed {
        /// Operator-facing reason
        reason: String,
    },
}

/// Per-user mutual-exclusion keys. Handlers acquire the lock for the
/// message's user for their whole invocation; the map itself is only locked
/// long enough to clone out the entry.
#[derive(Default)]
struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    fn for_user(&self, chat_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(chat_id)
            .or_default()
            .clone()
    }
}

/// Wires the voice pipeline and command dispatch over a shared database
/// connection and a pending-candidate table.
pub struct Orchestrator {
    db: DatabaseConnection,
    sessions: ConfirmationSessions,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn IntentExtractor>,
    locks: UserLocks,
    external_timeout: Duration,
}

impl Orchestrator {
    /// Builds an orchestrator from settings and the two voice adapters.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        config: &AppConfig,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn IntentExtractor>,
    ) -> Self {
        Self {
            db,
            sessions: ConfirmationSessions::new(config.confirm_ttl()),
            transcriber,
            extractor,
            locks: UserLocks::default(),
            external_timeout: config.external_timeout(),
        }
    }

    /// Handles one inbound event for a chat identity. Serialized per user;
    /// never returns an error - failures become [`Outcome`] variants.
    pub async fn handle(&self, chat_id: i64, incoming: Incoming) -> Outcome {
        let lock = self.locks.for_user(chat_id);
        let _guard = lock.lock().await;

        match self.dispatch(chat_id, incoming).await {
            Ok(outcome) => outcome,
            Err(e) => outcome_from_error(chat_id, e),
        }
    }

    async fn dispatch(&self, chat_id: i64, incoming: Incoming) -> Result<Outcome> {
        let user = ledger::ensure_user(&self.db, chat_id).await?;
        match incoming {
            Incoming::Command(command) => self.run_command(user.id, command).await,
            Incoming::Voice { audio, format_hint } => {
                self.run_voice(user.id, &audio, &format_hint).await
            }
        }
    }

    async fn run_command(&self, user_id: i64, command: Command) -> Result<Outcome> {
        match command {
            Command::AddExpense {
                amount,
                category,
                description,
            } => {
                let row = ledger::insert_transaction(
                    &self.db,
                    user_id,
                    Direction::Expense,
                    amount,
                    &category,
                    description,
                )
                .await?;
                Ok(Outcome::Recorded(row))
            }
            Command::AddIncome {
                amount,
                category,
                description,
            } => {
                let row = ledger::insert_transaction(
                    &self.db,
                    user_id,
                    Direction::Income,
                    amount,
                    &category,
                    description,
                )
                .await?;
                Ok(Outcome::Recorded(row))
            }
            Command::Balance => Ok(Outcome::Balance(query::balance(&self.db, user_id).await?)),
            Command::Stats(period) => {
                Ok(Outcome::Stats(query::stats(&self.db, user_id, period).await?))
            }
            Command::DeleteLast => {
                let deleted = ledger::delete_last_transaction(&self.db, user_id).await?;
                Ok(Outcome::Deleted(deleted))
            }
            Command::Confirm => {
                let committed = self.sessions.confirm(&self.db, user_id).await?;
                info!(
                    "User {user_id} confirmed voice transaction {} ({} {})",
                    committed.id, committed.direction, committed.amount
                );
                Ok(Outcome::Committed(committed))
            }
            Command::Reject => {
                self.sessions.reject(user_id).await?;
                Ok(Outcome::Discarded)
            }
            Command::Start | Command::Help => Ok(Outcome::Help),
        }
    }

    /// The voice path: transcribe, extract, validate, then propose for
    /// confirmation. Both external calls are bounded by the configured
    /// timeout.
    async fn run_voice(&self, user_id: i64, audio: &[u8], format_hint: &str) -> Result<Outcome> {
        let format = AudioFormat::from_hint(format_hint)?;

        let transcript = tokio::time::timeout(
            self.external_timeout,
            self.transcriber.transcribe(audio, format),
        )
        .await
        .map_err(|_| Error::TranscriptionFailed {
            message: "transcription timed out".to_string(),
        })??;
        info!("Transcribed voice message for user {user_id}: {transcript:?}");

        let extraction = match tokio::time::timeout(
            self.external_timeout,
            self.extractor.extract(&transcript),
        )
        .await
        .map_err(|_| Error::ExtractionFailed {
            message: "extraction timed out".to_string(),
        })? {
            Ok(extraction) => extraction,
            // A contract violation by the extractor reads as "no transaction"
            // to the user but is logged loudly for operators.
            Err(Error::ExtractionInvalid { message }) => {
                warn!("Extractor contract violation for user {user_id}: {message}");
                return Ok(Outcome::NoTransactionDetected { transcript });
            }
            Err(e) => return Err(e),
        };

        match extraction {
            Extraction::NoTransaction => Ok(Outcome::NoTransactionDetected { transcript }),
            Extraction::Candidate(candidate) => {
                if let Err(e) = candidate.validate() {
                    warn!("Extractor produced invalid candidate for user {user_id}: {e}");
                    return Ok(Outcome::NoTransactionDetected { transcript });
                }
                let pending = self.sessions.propose(user_id, candidate, transcript).await;
                Ok(Outcome::ConfirmationRequested(pending))
            }
        }
    }

    /// The pending-candidate table, for transports that want to render the
    /// current proposal.
    #[must_use]
    pub const fn sessions(&self) -> &ConfirmationSessions {
        &self.sessions
    }
}

/// Maps a recovered error to its structured outcome, logging at the
/// severity the taxonomy calls for.
fn outcome_from_error(chat_id: i64, error: Error) -> Outcome {
    match error {
        Error::InvalidAmount { .. } | Error::EmptyCategory | Error::InvalidCommand { .. } => {
            Outcome::Invalid {
                reason: error.to_string(),
            }
        }
        Error::NoTransactions => Outcome::NothingToDelete,
        Error::NoPendingConfirmation => Outcome::NothingPending,
        Error::UnsupportedAudio { .. } | Error::TranscriptionFailed { .. } => {
            warn!("Voice processing failed for chat {chat_id}: {error}");
            Outcome::TranscriptionFailed {
                reason: error.to_string(),
            }
        }
        Error::ExtractionFailed { .. } | Error::ExtractionInvalid { .. } => {
            warn!("Extraction failed for chat {chat_id}: {error}");
            Outcome::ExtractionFailed {
                reason: error.to_string(),
            }
        }
        other => {
            error!("Handler for chat {chat_id} failed: {other}");
            Outcome::Failed {
                reason: other.to_string(),
            }
        }
    }
}
