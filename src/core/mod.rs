//! Core business logic - framework-agnostic ledger, confirmation, query,
//! and pipeline operations.

/// Ledger store operations: users and transaction rows
pub mod ledger;
/// Confirmation session manager for voice-proposed transactions
pub mod pending;
/// Pipeline orchestrator: commands and the voice path
pub mod pipeline;
/// Ledger query engine: balance and period statistics
pub mod query;
