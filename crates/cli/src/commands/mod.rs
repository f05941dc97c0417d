//! Command implementations.

pub mod migrate;
pub mod permissions;
pub mod reconcile;
pub mod seed;

use sick_fits_core::{Email, EmailError, PermissionError};
use sick_fits_shop::config::{ConfigError, ShopConfig};
use sick_fits_shop::db::RepositoryError;
use sick_fits_shop::models::User;
use sick_fits_shop::state::SetupError;
use sick_fits_shop::{Shop, ShopError};
use thiserror::Error;

/// Errors from any command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("{0}")]
    Shop(#[from] ShopError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("{0}")]
    InvalidPermission(#[from] PermissionError),

    #[error("No user with email: {0}")]
    UnknownUser(String),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{failed} of {total} reconciliations failed")]
    ReconcileFailed { failed: usize, total: usize },
}

/// Load the full configuration and connect every collaborator.
async fn connect() -> Result<Shop, CliError> {
    let config = ShopConfig::from_env()?;
    tracing::info!("Connecting to shop database...");
    Ok(Shop::connect(&config).await?)
}

/// Look a user up by email.
async fn find_user(shop: &Shop, email: &str) -> Result<User, CliError> {
    let email = Email::parse(email)?;
    shop.store()
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| CliError::UnknownUser(email.into_inner()))
}
