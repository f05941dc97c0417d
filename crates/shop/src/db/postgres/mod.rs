//! `PostgreSQL` store.
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` row
//! types, so the crate builds without a live database. Each table has a
//! repository borrowing the pool; [`PgStore`] wires them to the store traits.

mod cart;
mod items;
mod orders;
mod reconciliation;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{CartLineId, Email, ItemId, OrderId, PermissionSet, ReconciliationId, UserId};

pub use cart::CartRepository;
pub use items::ItemRepository;
pub use orders::OrderRepository;
pub use reconciliation::ReconciliationRepository;
pub use users::UserRepository;

use super::{
    CartStore, CatalogStore, OrderStore, ReconciliationStore, RepositoryError, UserStore,
};
use crate::models::{
    CartClaim, CartEntry, CartLine, Item, ItemPage, ItemUpdate, NewItem, NewOrder,
    NewReconciliation, NewUser, Order, PendingReconciliation, User,
};

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).create(user).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_email(email).await
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        UserRepository::new(&self.pool).get_password_hash(email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        UserRepository::new(&self.pool).list().await
    }

    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool)
            .set_permissions(id, permissions)
            .await
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        UserRepository::new(&self.pool)
            .set_reset_token(id, token, expires_at)
            .await
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool)
            .consume_reset_token(token, now, password_hash)
            .await
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_item(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).create(owner, item).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        ItemRepository::new(&self.pool).get_by_id(id).await
    }

    async fn list_items(&self, page: ItemPage) -> Result<Vec<Item>, RepositoryError> {
        ItemRepository::new(&self.pool).list(page).await
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        ItemRepository::new(&self.pool).count().await
    }

    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).update(id, update).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).delete(id).await
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_cart_line(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError> {
        CartRepository::new(&self.pool).add(user_id, item_id).await
    }

    async fn get_cart_line(&self, id: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        CartRepository::new(&self.pool).get_by_id(id).await
    }

    async fn delete_cart_line(&self, id: CartLineId) -> Result<CartLine, RepositoryError> {
        CartRepository::new(&self.pool).delete(id).await
    }

    async fn cart_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        CartRepository::new(&self.pool).for_user(user_id).await
    }

    async fn retire_cart_lines(
        &self,
        user_id: UserId,
        claims: &[CartClaim],
    ) -> Result<u64, RepositoryError> {
        CartRepository::new(&self.pool).retire(user_id, claims).await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool).create(order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get_by_id(id).await
    }

    async fn get_order_by_charge(&self, charge_id: &str) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get_by_charge(charge_id).await
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).list_for_user(user_id).await
    }
}

#[async_trait]
impl ReconciliationStore for PgStore {
    async fn record_reconciliation(
        &self,
        entry: NewReconciliation,
    ) -> Result<PendingReconciliation, RepositoryError> {
        ReconciliationRepository::new(&self.pool).create(entry).await
    }

    async fn list_pending_reconciliations(
        &self,
    ) -> Result<Vec<PendingReconciliation>, RepositoryError> {
        ReconciliationRepository::new(&self.pool).list_pending().await
    }

    async fn get_reconciliation(
        &self,
        id: ReconciliationId,
    ) -> Result<Option<PendingReconciliation>, RepositoryError> {
        ReconciliationRepository::new(&self.pool).get_by_id(id).await
    }

    async fn resolve_reconciliation(
        &self,
        id: ReconciliationId,
        order_id: OrderId,
    ) -> Result<PendingReconciliation, RepositoryError> {
        ReconciliationRepository::new(&self.pool)
            .resolve(id, order_id)
            .await
    }
}
