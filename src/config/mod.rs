/// Database connection management and schema creation
pub mod database;

/// Application settings from environment variables and optional TOML file
pub mod settings;

pub use database::{create_connection, create_tables};
pub use settings::{AppConfig, load_app_config};
