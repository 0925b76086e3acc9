//! Transaction entity - a single income or expense record in a user's ledger.
//!
//! Amounts are stored as `DECIMAL(10,2)` and surfaced as
//! [`rust_decimal::Decimal`] so cents never get lost to float rounding.
//! Rows are ordered per user by `(created_at, id)`; `id` breaks timestamp
//! ties for "most recent" queries.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a transaction. Exactly two values exist; anything else is
/// rejected at the parse boundary before it can reach the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(7))")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money coming in
    #[sea_orm(string_value = "income")]
    Income,
    /// Money going out
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl Direction {
    /// Wire-format name, matching the database enum values.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(crate::errors::Error::InvalidCommand {
                message: format!("direction must be 'income' or 'expense', got '{other}'"),
            }),
        }
    }
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Internal id of the owning user
    pub user_id: i64,
    /// Whether this is income or an expense
    pub direction: Direction,
    /// Positive amount with two decimal places
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    /// Short category label (non-empty)
    pub category: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Server-assigned creation timestamp (UTC)
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_round_trips_through_str() {
        assert_eq!("income".parse::<Direction>().unwrap(), Direction::Income);
        assert_eq!(" Expense ".parse::<Direction>().unwrap(), Direction::Expense);
        assert_eq!(Direction::Income.as_str(), "income");
        assert!("transfer".parse::<Direction>().is_err());
    }
}
