//! CLI command implementations.

pub mod batch;
pub mod migrate;
pub mod schedule;

use secrecy::SecretString;
use thiserror::Error;

use group_order_server::config::{ConfigError, DEFAULT_TIMEZONE, parse_timezone};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Invalid configuration value.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Repository read failed.
    #[error("Repository error: {0}")]
    Repository(#[from] group_order_server::db::RepositoryError),
}

/// Database URL from `ORDERING_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("ORDERING_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("ORDERING_DATABASE_URL"))
}

/// The explicit timezone, else `ORDERING_TIMEZONE`, else the default.
pub fn resolve_timezone(explicit: Option<chrono_tz::Tz>) -> Result<chrono_tz::Tz, CommandError> {
    if let Some(tz) = explicit {
        return Ok(tz);
    }
    dotenvy::dotenv().ok();
    match std::env::var("ORDERING_TIMEZONE") {
        Ok(name) => Ok(parse_timezone("ORDERING_TIMEZONE", &name)?),
        Err(_) => Ok(DEFAULT_TIMEZONE),
    }
}
