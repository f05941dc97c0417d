//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/shop/migrations/` and create the `shop` schema.

use sick_fits_shop::config::database_url_from_env;
use sick_fits_shop::db;

use super::CliError;

/// Apply pending shop migrations.
///
/// # Errors
///
/// Returns an error if the URL is missing, the database is unreachable, or a
/// migration fails.
pub async fn run() -> Result<(), CliError> {
    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to shop database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running shop migrations...");
    sqlx::migrate!("../shop/migrations").run(&pool).await?;

    tracing::info!("Shop migrations complete!");
    Ok(())
}
