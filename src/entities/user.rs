//! User entity - one row per chat identity that has talked to the bot.
//!
//! Users are created lazily on first contact and never updated afterwards.
//! The `chat_id` is the stable external identity assigned by the chat
//! transport; `id` is our internal key that transactions reference.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Internal user identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable external chat identity (unique per user)
    #[sea_orm(unique)]
    pub chat_id: i64,
    /// When the user first interacted with the bot
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each user owns zero or more transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
