//! Persistence for the shop.
//!
//! # Database: `sick_fits`
//!
//! ## Tables (schema `shop`)
//!
//! - `user` - Accounts, permissions, password reset tokens
//! - `item` - Catalog
//! - `cart_line` - One row per (user, item), unique
//! - `order` / `order_line` - Immutable order snapshots
//! - `pending_reconciliation` - Charges whose order write failed
//!
//! # Migrations
//!
//! Migrations are stored in `crates/shop/migrations/` and run via:
//! ```bash
//! cargo run -p sick-fits-cli -- migrate
//! ```
//!
//! The services only see the [`Store`] capability. [`PgStore`] is the
//! production implementation, [`MemoryStore`] backs tests and local fakes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use sick_fits_core::{CartLineId, Email, ItemId, OrderId, PermissionSet, ReconciliationId, UserId};

use crate::models::{
    CartClaim, CartEntry, CartLine, Item, ItemPage, ItemUpdate, NewItem, NewOrder,
    NewReconciliation, NewUser, Order, PendingReconciliation, User,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryStore, StoreFault};
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store refused the write (injected by [`MemoryStore`] in tests).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Account persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. `Conflict` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// The user together with their stored password hash.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    /// Replace a user's permissions. `NotFound` if the user is missing.
    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError>;

    /// Store a reset token and its expiry, replacing any previous one.
    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Atomically swap the password hash for a valid reset token.
    ///
    /// Succeeds only when a user holds `token` and its expiry is not before
    /// `now`. The token and expiry are cleared in the same write, so a token
    /// works once. Returns `None` when no user matched.
    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError>;
}

/// Catalog persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_item(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;

    /// Items newest first.
    async fn list_items(&self, page: ItemPage) -> Result<Vec<Item>, RepositoryError>;

    async fn count_items(&self) -> Result<i64, RepositoryError>;

    /// `NotFound` if the item is missing.
    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<Item, RepositoryError>;

    /// Delete an item and any cart lines holding it. Returns the deleted item.
    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError>;
}

/// Cart persistence.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Insert a line with quantity 1 or increment the existing line for the
    /// same (user, item) pair, atomically.
    ///
    /// `NotFound("item")` if the item does not exist.
    async fn add_cart_line(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError>;

    async fn get_cart_line(&self, id: CartLineId) -> Result<Option<CartLine>, RepositoryError>;

    /// Delete a line. `NotFound` if it is already gone.
    async fn delete_cart_line(&self, id: CartLineId) -> Result<CartLine, RepositoryError>;

    /// The user's cart joined with items, oldest line first.
    async fn cart_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError>;

    /// Take the claimed units off the listed lines belonging to `user_id`,
    /// atomically. A line whose quantity reaches zero is deleted; units
    /// added since the claim was taken stay. Returns how many lines changed.
    async fn retire_cart_lines(
        &self,
        user_id: UserId,
        claims: &[CartClaim],
    ) -> Result<u64, RepositoryError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write an order and its lines in one transaction.
    ///
    /// `Conflict` if an order already exists for the charge.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn get_order_by_charge(&self, charge_id: &str) -> Result<Option<Order>, RepositoryError>;

    /// The user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;
}

/// Reconciliation queue persistence.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn record_reconciliation(
        &self,
        entry: NewReconciliation,
    ) -> Result<PendingReconciliation, RepositoryError>;

    /// Unresolved entries, oldest first.
    async fn list_pending_reconciliations(
        &self,
    ) -> Result<Vec<PendingReconciliation>, RepositoryError>;

    async fn get_reconciliation(
        &self,
        id: ReconciliationId,
    ) -> Result<Option<PendingReconciliation>, RepositoryError>;

    /// Mark an entry resolved by the given order.
    async fn resolve_reconciliation(
        &self,
        id: ReconciliationId,
        order_id: OrderId,
    ) -> Result<PendingReconciliation, RepositoryError>;
}

/// Everything the shop persists.
pub trait Store: UserStore + CatalogStore + CartStore + OrderStore + ReconciliationStore {}

impl<T> Store for T where T: UserStore + CatalogStore + CartStore + OrderStore + ReconciliationStore
{}
