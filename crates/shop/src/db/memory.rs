//! In-memory store.
//!
//! Holds every table behind one `tokio::sync::Mutex`, so each trait call is
//! atomic with respect to the others, which is the same guarantee the
//! Postgres unique constraints and transactions give [`super::PgStore`].
//! Writes can be made to fail with [`MemoryStore::fail_on`] to exercise the
//! checkout failure paths.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use sick_fits_core::{
    CartLineId, Email, ItemId, OrderId, OrderLineId, PermissionSet, ReconciliationId, UserId,
};

use super::{
    CartStore, CatalogStore, OrderStore, ReconciliationStore, RepositoryError, UserStore,
};
use crate::models::{
    CartClaim, CartEntry, CartLine, Item, ItemPage, ItemUpdate, NewItem, NewOrder,
    NewReconciliation, NewUser, Order, OrderLine, PendingReconciliation, ReconciliationStatus,
    User,
};

/// A write that [`MemoryStore`] can be told to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    CreateOrder,
    RetireCartLines,
    RecordReconciliation,
}

#[derive(Debug)]
struct UserRecord {
    user: User,
    password_hash: String,
    reset_token: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i32,
    users: BTreeMap<UserId, UserRecord>,
    items: BTreeMap<ItemId, Item>,
    cart_lines: BTreeMap<CartLineId, CartLine>,
    orders: BTreeMap<OrderId, Order>,
    reconciliations: BTreeMap<ReconciliationId, PendingReconciliation>,
    faults: HashSet<StoreFault>,
}

impl Tables {
    /// One sequence for every table, like a fresh database would hand out.
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn check(&self, fault: StoreFault) -> Result<(), RepositoryError> {
        if self.faults.contains(&fault) {
            return Err(RepositoryError::Unavailable(format!("{fault:?} rejected")));
        }
        Ok(())
    }

    fn cart_entry(&self, line: &CartLine) -> Result<CartEntry, RepositoryError> {
        let item = self.items.get(&line.item_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "cart line {} references missing item {}",
                line.id, line.item_id
            ))
        })?;
        Ok(CartEntry {
            id: line.id,
            quantity: line.quantity,
            item: item.clone(),
        })
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given write fail until [`Self::clear_faults`] is called.
    pub async fn fail_on(&self, fault: StoreFault) {
        self.tables.lock().await.faults.insert(fault);
    }

    /// Stop injecting failures.
    pub async fn clear_faults(&self) {
        self.tables.lock().await.faults.clear();
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|r| r.user.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(tables.next_id()),
            name: new.name,
            email: new.email,
            permissions: new.permissions,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                password_hash: new.password_hash,
                reset_token: None,
                reset_token_expires_at: None,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.get(&id).map(|r| r.user.clone()))
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|r| &r.user.email == email)
            .map(|r| (r.user.clone(), r.password_hash.clone())))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().map(|r| r.user.clone()).collect())
    }

    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .users
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("user"))?;
        record.user.permissions = permissions.clone();
        record.user.updated_at = Utc::now();
        Ok(record.user.clone())
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        let record = tables
            .users
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("user"))?;
        record.reset_token = Some(token.to_string());
        record.reset_token_expires_at = Some(expires_at);
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.users.values_mut().find(|r| {
            r.reset_token.as_deref() == Some(token)
                && r.reset_token_expires_at.is_some_and(|expires| expires >= now)
        }) else {
            return Ok(None);
        };

        record.password_hash = password_hash.to_string();
        record.reset_token = None;
        record.reset_token_expires_at = None;
        record.user.updated_at = now;
        Ok(Some(record.user.clone()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_item(&self, owner: UserId, new: NewItem) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&owner) {
            return Err(RepositoryError::NotFound("user"));
        }

        let item = Item {
            id: ItemId::new(tables.next_id()),
            user_id: owner,
            title: new.title,
            description: new.description,
            image: new.image,
            large_image: new.large_image,
            price: new.price,
            created_at: Utc::now(),
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.items.get(&id).cloned())
    }

    async fn list_items(&self, page: ItemPage) -> Result<Vec<Item>, RepositoryError> {
        let tables = self.tables.lock().await;
        // Ids are handed out in insertion order, so reverse id order is newest first.
        Ok(tables
            .items
            .values()
            .rev()
            .skip(page.skip() as usize)
            .take(page.first() as usize)
            .cloned()
            .collect())
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        let tables = self.tables.lock().await;
        i64::try_from(tables.items.len())
            .map_err(|e| RepositoryError::DataCorruption(format!("item count: {e}")))
    }

    async fn update_item(&self, id: ItemId, update: ItemUpdate) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .items
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("item"))?;
        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(description) = update.description {
            item.description = description;
        }
        if let Some(price) = update.price {
            item.price = price;
        }
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .items
            .remove(&id)
            .ok_or(RepositoryError::NotFound("item"))?;
        tables.cart_lines.retain(|_, line| line.item_id != id);
        Ok(item)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_cart_line(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartLine, RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.items.contains_key(&item_id) {
            return Err(RepositoryError::NotFound("item"));
        }
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound("user"));
        }

        if let Some(line) = tables
            .cart_lines
            .values_mut()
            .find(|line| line.user_id == user_id && line.item_id == item_id)
        {
            line.quantity += 1;
            return Ok(*line);
        }

        let line = CartLine {
            id: CartLineId::new(tables.next_id()),
            user_id,
            item_id,
            quantity: 1,
        };
        tables.cart_lines.insert(line.id, line);
        Ok(line)
    }

    async fn get_cart_line(&self, id: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.cart_lines.get(&id).copied())
    }

    async fn delete_cart_line(&self, id: CartLineId) -> Result<CartLine, RepositoryError> {
        let mut tables = self.tables.lock().await;
        tables
            .cart_lines
            .remove(&id)
            .ok_or(RepositoryError::NotFound("cart line"))
    }

    async fn cart_for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let tables = self.tables.lock().await;
        tables
            .cart_lines
            .values()
            .filter(|line| line.user_id == user_id)
            .map(|line| tables.cart_entry(line))
            .collect()
    }

    async fn retire_cart_lines(
        &self,
        user_id: UserId,
        claims: &[CartClaim],
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        tables.check(StoreFault::RetireCartLines)?;

        let mut changed = 0;
        for claim in claims {
            let Some(line) = tables
                .cart_lines
                .get_mut(&claim.id)
                .filter(|line| line.user_id == user_id)
            else {
                continue;
            };
            if line.quantity > claim.quantity {
                line.quantity -= claim.quantity;
            } else {
                tables.cart_lines.remove(&claim.id);
            }
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, new: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.lock().await;
        tables.check(StoreFault::CreateOrder)?;
        if tables.orders.values().any(|o| o.charge_id == new.charge_id) {
            return Err(RepositoryError::Conflict(format!(
                "order already exists for charge {}",
                new.charge_id
            )));
        }

        let id = OrderId::new(tables.next_id());
        let mut lines = Vec::with_capacity(new.lines.len());
        for line in new.lines {
            lines.push(OrderLine {
                id: OrderLineId::new(tables.next_id()),
                title: line.title,
                description: line.description,
                image: line.image,
                large_image: line.large_image,
                price: line.price,
                quantity: line.quantity,
            });
        }

        let order = Order {
            id,
            user_id: new.user_id,
            total: new.total,
            currency: new.currency,
            charge_id: new.charge_id,
            lines,
            created_at: Utc::now(),
        };
        tables.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn get_order_by_charge(&self, charge_id: &str) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .find(|o| o.charge_id == charge_id)
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn record_reconciliation(
        &self,
        new: NewReconciliation,
    ) -> Result<PendingReconciliation, RepositoryError> {
        let mut tables = self.tables.lock().await;
        tables.check(StoreFault::RecordReconciliation)?;

        let entry = PendingReconciliation {
            id: ReconciliationId::new(tables.next_id()),
            user_id: new.user_id,
            charge_id: new.charge_id,
            amount: new.amount,
            currency: new.currency,
            lines: new.lines,
            cart_lines: new.cart_lines,
            order_id: new.order_id,
            reason: new.reason,
            status: ReconciliationStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        tables.reconciliations.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn list_pending_reconciliations(
        &self,
    ) -> Result<Vec<PendingReconciliation>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reconciliations
            .values()
            .filter(|e| e.status == ReconciliationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_reconciliation(
        &self,
        id: ReconciliationId,
    ) -> Result<Option<PendingReconciliation>, RepositoryError> {
        let tables = self.tables.lock().await;
        Ok(tables.reconciliations.get(&id).cloned())
    }

    async fn resolve_reconciliation(
        &self,
        id: ReconciliationId,
        order_id: OrderId,
    ) -> Result<PendingReconciliation, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .reconciliations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound("reconciliation"))?;
        entry.order_id = Some(order_id);
        entry.status = ReconciliationStatus::Resolved;
        entry.resolved_at = Some(Utc::now());
        Ok(entry.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use sick_fits_core::{Money, Permission};

    use super::*;

    async fn seeded() -> (MemoryStore, User, Item) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: "Wes".to_string(),
                email: Email::parse("wes@example.com").unwrap(),
                password_hash: "hash".to_string(),
                permissions: PermissionSet::signup_default(),
            })
            .await
            .unwrap();
        let item = store
            .create_item(
                user.id,
                NewItem {
                    title: "Hat".to_string(),
                    description: "A hat".to_string(),
                    image: None,
                    large_image: None,
                    price: Money::from_minor(1000),
                },
            )
            .await
            .unwrap();
        (store, user, item)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, user, _) = seeded().await;
        let err = store
            .create_user(NewUser {
                name: "Other".to_string(),
                email: user.email.clone(),
                password_hash: "hash".to_string(),
                permissions: PermissionSet::signup_default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_cart_line_merges() {
        let (store, user, item) = seeded().await;
        let first = store.add_cart_line(user.id, item.id).await.unwrap();
        let second = store.add_cart_line(user.id, item.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(store.cart_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_cart_line_missing_item() {
        let (store, user, _) = seeded().await;
        let err = store
            .add_cart_line(user.id, ItemId::new(999))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound("item")));
    }

    #[tokio::test]
    async fn test_delete_item_removes_cart_lines() {
        let (store, user, item) = seeded().await;
        store.add_cart_line(user.id, item.id).await.unwrap();
        store.delete_item(item.id).await.unwrap();
        assert!(store.cart_for_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retire_cart_lines_only_touches_owner() {
        let (store, user, item) = seeded().await;
        let line = store.add_cart_line(user.id, item.id).await.unwrap();
        let claim = CartClaim {
            id: line.id,
            quantity: 1,
        };
        let changed = store
            .retire_cart_lines(UserId::new(999), &[claim])
            .await
            .unwrap();
        assert_eq!(changed, 0);
        let changed = store.retire_cart_lines(user.id, &[claim]).await.unwrap();
        assert_eq!(changed, 1);
        assert!(store.get_cart_line(line.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retire_cart_lines_keeps_unclaimed_units() {
        let (store, user, item) = seeded().await;
        store.add_cart_line(user.id, item.id).await.unwrap();
        store.add_cart_line(user.id, item.id).await.unwrap();
        let line = store.add_cart_line(user.id, item.id).await.unwrap();
        assert_eq!(line.quantity, 3);

        let claim = CartClaim {
            id: line.id,
            quantity: 2,
        };
        store.retire_cart_lines(user.id, &[claim]).await.unwrap();
        let left = store.get_cart_line(line.id).await.unwrap().unwrap();
        assert_eq!(left.quantity, 1);
    }

    #[tokio::test]
    async fn test_reset_token_single_use_and_expiry() {
        let (store, user, _) = seeded().await;
        let now = Utc::now();
        store
            .set_reset_token(user.id, "abc", now + Duration::hours(1))
            .await
            .unwrap();

        let consumed = store.consume_reset_token("abc", now, "new").await.unwrap();
        assert_eq!(consumed.unwrap().id, user.id);
        assert!(store.consume_reset_token("abc", now, "again").await.unwrap().is_none());

        store
            .set_reset_token(user.id, "old", now - Duration::minutes(1))
            .await
            .unwrap();
        assert!(store.consume_reset_token("old", now, "new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_permissions() {
        let (store, user, _) = seeded().await;
        let permissions = PermissionSet::from_iter([Permission::Admin]);
        let updated = store.set_permissions(user.id, &permissions).await.unwrap();
        assert!(updated.permissions.contains(Permission::Admin));

        let err = store
            .set_permissions(UserId::new(999), &permissions)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound("user")));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let (store, user, _) = seeded().await;
        store.fail_on(StoreFault::CreateOrder).await;
        let order = NewOrder {
            user_id: user.id,
            total: Money::from_minor(1000),
            currency: sick_fits_core::CurrencyCode::USD,
            charge_id: "ch_1".to_string(),
            lines: Vec::new(),
        };
        assert!(matches!(
            store.create_order(order.clone()).await,
            Err(RepositoryError::Unavailable(_))
        ));

        store.clear_faults().await;
        store.create_order(order.clone()).await.unwrap();
        assert!(matches!(
            store.create_order(order).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_items_newest_first() {
        let (store, user, first) = seeded().await;
        let second = store
            .create_item(
                user.id,
                NewItem {
                    title: "Shoes".to_string(),
                    description: String::new(),
                    image: None,
                    large_image: None,
                    price: Money::from_minor(5000),
                },
            )
            .await
            .unwrap();

        let items = store.list_items(ItemPage::new(0, 10)).await.unwrap();
        assert_eq!(items[0].id, second.id);
        assert_eq!(items[1].id, first.id);

        let items = store.list_items(ItemPage::new(1, 10)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(store.count_items().await.unwrap(), 2);
    }
}
