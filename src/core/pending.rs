//! Confirmation session manager.
//!
//! At most one voice-proposed transaction is pending per user. A new
//! proposal replaces any older one (the newest voice message wins), and a
//! pending entry past its deadline is treated as absent by whichever
//! operation observes it first - no background sweeper is required, though
//! [`ConfirmationSessions::sweep_expired`] can reclaim memory periodically.
//!
//! Entries live in process memory only: losing them on restart is fine,
//! they are re-askable proposals, not committed state.

use crate::{
    core::ledger,
    entities::transaction,
    errors::{Error, Result},
};
use crate::voice::CandidateTransaction;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// A voice-extracted transaction awaiting the user's confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// The extracted candidate
    pub candidate: CandidateTransaction,
    /// The transcript the candidate was extracted from
    pub transcript: String,
    /// When the candidate was proposed
    pub proposed_at: DateTime<Utc>,
    /// Deadline after which the candidate is treated as absent
    pub expires_at: DateTime<Utc>,
}

impl PendingTransaction {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Per-user pending-candidate table with a fixed confirmation window.
/// Memory is bounded by the number of users with a live candidate, not by
/// message volume.
pub struct ConfirmationSessions {
    ttl: chrono::Duration,
    slots: Mutex<HashMap<i64, PendingTransaction>>,
}

impl ConfirmationSessions {
    /// Creates an empty table whose candidates stay confirmable for `ttl`.
    #[must_use]
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a candidate for the user, replacing any previous one, and
    /// returns the stored entry (including its deadline).
    pub async fn propose(
        &self,
        user_id: i64,
        candidate: CandidateTransaction,
        transcript: String,
    ) -> PendingTransaction {
        let now = Utc::now();
        let pending = PendingTransaction {
            candidate,
            transcript,
            proposed_at: now,
            expires_at: now + self.ttl,
        };
        let replaced = self
            .slots
            .lock()
            .await
            .insert(user_id, pending.clone())
            .is_some();
        if replaced {
            debug!("Replaced pending candidate for user {user_id}");
        }
        pending
    }

    /// Commits the user's pending candidate to the ledger and clears the
    /// slot. With no live (non-expired) candidate this is
    /// [`Error::NoPendingConfirmation`]. A failed insert puts the candidate
    /// back, so one transient error does not consume the proposal.
    pub async fn confirm(
        &self,
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<transaction::Model> {
        let pending = self.take_live(user_id).await?;
        let inserted = ledger::insert_transaction(
            db,
            user_id,
            pending.candidate.direction,
            pending.candidate.amount,
            &pending.candidate.category,
            pending.candidate.description.clone(),
        )
        .await;
        if inserted.is_err() {
            self.slots.lock().await.entry(user_id).or_insert(pending);
        }
        inserted
    }

    /// Discards the user's pending candidate without persisting anything.
    pub async fn reject(&self, user_id: i64) -> Result<PendingTransaction> {
        self.take_live(user_id).await
    }

    /// Returns a copy of the user's live pending candidate, if any.
    /// An expired entry is dropped on observation.
    pub async fn pending_for(&self, user_id: i64) -> Option<PendingTransaction> {
        let mut slots = self.slots.lock().await;
        match slots.get(&user_id) {
            Some(pending) if pending.is_expired_at(Utc::now()) => {
                slots.remove(&user_id);
                None
            }
            Some(pending) => Some(pending.clone()),
            None => None,
        }
    }

    /// Drops every expired entry, returning how many were reclaimed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, pending| !pending.is_expired_at(now));
        before - slots.len()
    }

    /// Removes and returns the user's candidate if it exists and has not
    /// expired; expired entries are discarded on observation (lazy expiry).
    async fn take_live(&self, user_id: i64) -> Result<PendingTransaction> {
        let mut slots = self.slots.lock().await;
        let pending = slots.remove(&user_id).ok_or(Error::NoPendingConfirmation)?;
        if pending.is_expired_at(Utc::now()) {
            debug!("Pending candidate for user {user_id} expired unconfirmed");
            return Err(Error::NoPendingConfirmation);
        }
        Ok(pending)
    }
}
