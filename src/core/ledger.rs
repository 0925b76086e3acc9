//! Ledger store operations.
//!
//! All mutating operations for a single user are serialized by the
//! orchestrator's per-user locking, so "most recent transaction" queries
//! here never race with a concurrent insert for the same user. Timestamps
//! are server-assigned UTC; when two rows share a timestamp the higher `id`
//! is the newer row.

use crate::{
    entities::{Direction, Transaction, transaction, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Ensures a user row exists for this chat identity, creating it on first
/// contact. Idempotent: repeat calls return the existing row.
pub async fn ensure_user(db: &DatabaseConnection, chat_id: i64) -> Result<user::Model> {
    if let Some(existing) = user::Entity::find()
        .filter(user::Column::ChatId.eq(chat_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let created = user::ActiveModel {
        chat_id: Set(chat_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!("Created user {} for chat id {chat_id}", created.id);
    Ok(created)
}

/// Inserts a transaction with a server-assigned timestamp, validating the
/// amount and category first. Directions are a closed enum, so an invalid
/// direction cannot reach this function.
pub async fn insert_transaction(
    db: &DatabaseConnection,
    user_id: i64,
    direction: Direction,
    amount: Decimal,
    category: &str,
    description: Option<String>,
) -> Result<transaction::Model> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    let category = category.trim();
    if category.is_empty() {
        return Err(Error::EmptyCategory);
    }

    let row = transaction::ActiveModel {
        user_id: Set(user_id),
        direction: Set(direction),
        amount: Set(amount.round_dp(2)),
        category: Set(category.to_string()),
        description: Set(description.filter(|d| !d.trim().is_empty())),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!(
        "Inserted {} {} '{}' as transaction {} for user {user_id}",
        row.direction, row.amount, row.category, row.id
    );
    Ok(row)
}

/// Removes the user's most recently created transaction and returns it.
/// Ties on `created_at` go to the highest id. Returns
/// [`Error::NoTransactions`] when the user has no rows; this is a reported
/// condition, not a fault.
pub async fn delete_last_transaction(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let last = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .one(&txn)
        .await?
        .ok_or(Error::NoTransactions)?;

    let deleted = last.clone();
    last.delete(&txn).await?;
    txn.commit().await?;

    debug!("Deleted transaction {} for user {user_id}", deleted.id);
    Ok(deleted)
}

/// Returns the user's transactions with `created_at` in `[since, until)`,
/// oldest first. Used by the query engine; exposed for testability.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: i64,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::CreatedAt.gte(since))
        .filter(transaction::Column::CreatedAt.lt(until))
        .order_by_asc(transaction::Column::CreatedAt)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{dec, insert_backdated, setup_test_db, setup_with_user};
    use chrono::Duration;

    #[tokio::test]
    async fn ensure_user_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;

        let first = ensure_user(&db, 42).await?;
        let second = ensure_user(&db, 42).await?;
        assert_eq!(first.id, second.id);
        assert_eq!(first.chat_id, 42);

        // A different chat id gets a different row
        let other = ensure_user(&db, 43).await?;
        assert_ne!(other.id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_non_positive_amounts() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let zero =
            insert_transaction(&db, user.id, Direction::Expense, Decimal::ZERO, "Food", None)
                .await;
        assert!(matches!(zero, Err(Error::InvalidAmount { .. })));

        let negative =
            insert_transaction(&db, user.id, Direction::Income, dec("-5.00"), "Salary", None)
                .await;
        assert!(matches!(negative, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn insert_rejects_blank_category() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let result =
            insert_transaction(&db, user.id, Direction::Expense, dec("1.00"), "   ", None).await;
        assert!(matches!(result, Err(Error::EmptyCategory)));
        Ok(())
    }

    #[tokio::test]
    async fn insert_assigns_timestamp_and_keeps_cents() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let before = Utc::now();
        let row = insert_transaction(
            &db,
            user.id,
            Direction::Expense,
            dec("12.50"),
            "Food",
            Some("lunch".to_string()),
        )
        .await?;
        let after = Utc::now();

        assert_eq!(row.amount, dec("12.50"));
        assert_eq!(row.category, "Food");
        assert_eq!(row.description.as_deref(), Some("lunch"));
        assert!(row.created_at >= before && row.created_at <= after);
        Ok(())
    }

    #[tokio::test]
    async fn delete_last_removes_newest_row() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let first =
            insert_transaction(&db, user.id, Direction::Expense, dec("12.50"), "Food", None)
                .await?;
        let second =
            insert_transaction(&db, user.id, Direction::Income, dec("1000.00"), "Salary", None)
                .await?;

        let deleted = delete_last_transaction(&db, user.id).await?;
        assert_eq!(deleted.id, second.id);

        let remaining =
            list_transactions(&db, user.id, Utc::now() - Duration::days(1), Utc::now()).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn delete_last_breaks_timestamp_ties_by_id() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        // Two rows with the identical timestamp: the higher id is newer.
        let moment = Utc::now();
        let older = insert_backdated(&db, user.id, Direction::Expense, "3.00", "Food", moment)
            .await?;
        let newer = insert_backdated(&db, user.id, Direction::Expense, "4.00", "Food", moment)
            .await?;
        assert!(newer.id > older.id);

        let deleted = delete_last_transaction(&db, user.id).await?;
        assert_eq!(deleted.id, newer.id);
        Ok(())
    }

    #[tokio::test]
    async fn delete_last_on_empty_ledger_reports_no_transactions() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let result = delete_last_transaction(&db, user.id).await;
        assert!(matches!(result, Err(Error::NoTransactions)));
        Ok(())
    }

    #[tokio::test]
    async fn list_window_is_half_open() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let base = Utc::now() - Duration::hours(3);

        let at_since =
            insert_backdated(&db, user.id, Direction::Expense, "1.00", "Food", base).await?;
        let inside = insert_backdated(
            &db,
            user.id,
            Direction::Expense,
            "2.00",
            "Food",
            base + Duration::hours(1),
        )
        .await?;
        // Exactly at `until`: excluded
        insert_backdated(
            &db,
            user.id,
            Direction::Expense,
            "3.00",
            "Food",
            base + Duration::hours(2),
        )
        .await?;

        let rows = list_transactions(&db, user.id, base, base + Duration::hours(2)).await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![at_since.id, inside.id]);
        Ok(())
    }

    #[tokio::test]
    async fn list_is_isolated_per_user() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = ensure_user(&db, 1).await?;
        let bob = ensure_user(&db, 2).await?;

        insert_transaction(&db, alice.id, Direction::Expense, dec("5.00"), "Food", None).await?;

        let rows =
            list_transactions(&db, bob.id, Utc::now() - Duration::days(1), Utc::now()).await?;
        assert!(rows.is_empty());
        Ok(())
    }
}
