//! Ledger query engine: balance and period statistics.
//!
//! Aggregates are recomputed from the committed rows on every call; with a
//! single user's history at personal-finance volumes there is nothing worth
//! caching, and recomputation keeps results exactly consistent with the
//! ledger store.

use crate::{
    core::ledger,
    entities::{Direction, Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Statistics window anchored to "now" at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Since the start of the current calendar day (UTC)
    Day,
    /// Since Monday 00:00 of the current ISO week (UTC)
    Week,
    /// Since the first of the current calendar month (UTC)
    Month,
    /// Since January 1st of the current calendar year (UTC)
    Year,
}

impl Period {
    /// Lowercase token used by the `stats` command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(Error::InvalidCommand {
                message: format!("period must be day, week, month or year, got '{other}'"),
            }),
        }
    }
}

/// Start of the period containing `now`, in UTC.
#[must_use]
pub fn period_start(period: Period, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    let start = match period {
        Period::Day => midnight,
        Period::Week => {
            midnight - Duration::days(i64::from(now.date_naive().weekday().num_days_from_monday()))
        }
        Period::Month => midnight.with_day(1).unwrap_or(midnight),
        Period::Year => midnight
            .with_day(1)
            .and_then(|d| d.with_month(1))
            .unwrap_or(midnight),
    };
    start.and_utc()
}

/// Whole-history balance: income, expense, and their difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    /// Sum of all income amounts
    pub income: Decimal,
    /// Sum of all expense amounts
    pub expense: Decimal,
    /// `income - expense`
    pub net: Decimal,
}

/// Aggregated total for one category within a stats window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    /// Category label
    pub category: String,
    /// Sum of amounts in this category
    pub total: Decimal,
}

/// Aggregates over one period window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    /// The requested period
    pub period: Period,
    /// Window start (inclusive)
    pub since: DateTime<Utc>,
    /// Window end (exclusive) - the "now" captured for this call
    pub until: DateTime<Utc>,
    /// Income total in the window
    pub income: Decimal,
    /// Expense total in the window
    pub expense: Decimal,
    /// `income - expense`
    pub net: Decimal,
    /// Number of transactions in the window
    pub count: usize,
    /// Income totals per category, largest first
    pub income_by_category: Vec<CategoryTotal>,
    /// Expense totals per category, largest first
    pub expense_by_category: Vec<CategoryTotal>,
}

/// Computes the user's all-time balance from the committed ledger state.
pub async fn balance(db: &DatabaseConnection, user_id: i64) -> Result<BalanceReport> {
    let rows = Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    for row in &rows {
        match row.direction {
            Direction::Income => income += row.amount,
            Direction::Expense => expense += row.amount,
        }
    }
    Ok(BalanceReport {
        income,
        expense,
        net: income - expense,
    })
}

/// Computes window statistics for the period containing the current moment.
/// A window with no transactions yields all-zero totals.
pub async fn stats(db: &DatabaseConnection, user_id: i64, period: Period) -> Result<StatsReport> {
    // One "now" per call so the window boundaries and `until` agree.
    let now = Utc::now();
    let since = period_start(period, now);
    let rows = ledger::list_transactions(db, user_id, since, now).await?;

    let mut income = Decimal::ZERO;
    let mut expense = Decimal::ZERO;
    let mut income_buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut expense_buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in &rows {
        match row.direction {
            Direction::Income => {
                income += row.amount;
                *income_buckets.entry(row.category.clone()).or_default() += row.amount;
            }
            Direction::Expense => {
                expense += row.amount;
                *expense_buckets.entry(row.category.clone()).or_default() += row.amount;
            }
        }
    }

    Ok(StatsReport {
        period,
        since,
        until: now,
        income,
        expense,
        net: income - expense,
        count: rows.len(),
        income_by_category: into_sorted_totals(income_buckets),
        expense_by_category: into_sorted_totals(expense_buckets),
    })
}

fn into_sorted_totals(buckets: BTreeMap<String, Decimal>) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = buckets
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();
    // BTreeMap already sorted by name; make the largest total win overall
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}
