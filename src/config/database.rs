//! Database connection and table creation using `SeaORM`.
//!
//! The schema is generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the `users` and `transactions`
//! tables always match the Rust structs without hand-written SQL. Creation
//! is "if not exists" only; there are no migrations.

use crate::config::AppConfig;
use crate::entities::{Transaction, User};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::info;

/// Connects to the configured database. Connection and pool-acquire waits
/// are bounded by the same timeout as the other external calls, so a wedged
/// database surfaces as an error instead of a hung handler.
pub async fn create_connection(config: &AppConfig) -> Result<DatabaseConnection> {
    info!("Connecting to database at {}", config.database_url);
    let mut options = ConnectOptions::new(&config.database_url);
    options
        .connect_timeout(config.external_timeout())
        .acquire_timeout(config.external_timeout());
    Database::connect(options).await.map_err(Into::into)
}

/// Creates the `users` and `transactions` tables if they do not exist,
/// using `SeaORM`'s schema generation from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut user_table = schema.create_table_from_entity(User);
    let mut transaction_table = schema.create_table_from_entity(Transaction);

    db.execute(builder.build(user_table.if_not_exists()))
        .await?;
    db.execute(builder.build(transaction_table.if_not_exists()))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{TransactionModel, UserModel};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_connection_applies_configured_timeouts() -> Result<()> {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            ..AppConfig::default()
        };
        let db = create_connection(&config).await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        Ok(())
    }
}
