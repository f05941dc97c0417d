//! Cart manager.
//!
//! A cart is the set of `CartLine` rows for one user, with at most one line
//! per item. The store's upsert keeps that true under concurrent adds.

use tracing::instrument;

use sick_fits_core::{CartLineId, ItemId};

use super::guard::{Policy, require_caller};
use crate::context::Caller;
use crate::error::Result;
use crate::models::{CartEntry, CartLine};
use crate::state::Shop;

/// Cart operations.
pub struct CartService<'a> {
    shop: &'a Shop,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Add one unit of an item to the caller's cart.
    ///
    /// Creates the line with quantity 1 or increments the existing line.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound("item")` if the item does not exist
    #[instrument(skip(self, caller), fields(user_id))]
    pub async fn add_to_cart(&self, caller: Option<&Caller>, item_id: ItemId) -> Result<CartLine> {
        let caller = require_caller(caller)?;
        tracing::Span::current().record("user_id", caller.user_id.as_i32());

        let line = self
            .shop
            .store()
            .add_cart_line(caller.user_id, item_id)
            .await?;

        tracing::info!(
            cart_line_id = %line.id,
            quantity = line.quantity,
            "Item added to cart"
        );
        Ok(line)
    }

    /// Remove a whole line from the caller's cart.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound("cart line")` if the line does not exist
    /// - `Forbidden` if the line belongs to someone else (it is left alone)
    #[instrument(skip(self, caller), fields(user_id))]
    pub async fn remove_from_cart(
        &self,
        caller: Option<&Caller>,
        cart_line_id: CartLineId,
    ) -> Result<CartLine> {
        let caller = require_caller(caller)?;
        tracing::Span::current().record("user_id", caller.user_id.as_i32());

        let store = self.shop.store();
        let line = store
            .get_cart_line(cart_line_id)
            .await?
            .ok_or(crate::ShopError::NotFound("cart line"))?;

        Policy::owned_by(line.user_id).authorize(Some(caller))?;

        let removed = store.delete_cart_line(cart_line_id).await?;
        tracing::info!(item_id = %removed.item_id, "Cart line removed");
        Ok(removed)
    }

    /// The caller's cart with item details.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a caller.
    pub async fn cart(&self, caller: Option<&Caller>) -> Result<Vec<CartEntry>> {
        let caller = require_caller(caller)?;
        Ok(self.shop.store().cart_for_user(caller.user_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sick_fits_core::Permission;

    use super::*;
    use crate::ShopError;
    use crate::services::test_support::fixture;

    #[tokio::test]
    async fn test_add_twice_merges_into_one_line() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let hat = fx.item(&wes, "Hat", 1000).await;

        let first = fx.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();
        let second = fx.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        let cart = fx.shop.cart().cart(Some(&wes)).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_add_requires_caller() {
        let fx = fixture();
        let err = fx
            .shop
            .cart()
            .add_to_cart(None, ItemId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_add_missing_item() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let err = fx
            .shop
            .cart()
            .add_to_cart(Some(&wes), ItemId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound("item")));
    }

    #[tokio::test]
    async fn test_remove_other_users_line_is_forbidden() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let scott = fx.user("scott@example.com", &[Permission::Admin]).await;
        let hat = fx.item(&wes, "Hat", 1000).await;
        let line = fx.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

        let err = fx
            .shop
            .cart()
            .remove_from_cart(Some(&scott), line.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Forbidden));
        assert_eq!(fx.shop.cart().cart(Some(&wes)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_own_line() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let hat = fx.item(&wes, "Hat", 1000).await;
        let line = fx.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

        let removed = fx
            .shop
            .cart()
            .remove_from_cart(Some(&wes), line.id)
            .await
            .unwrap();
        assert_eq!(removed.id, line.id);
        assert!(fx.shop.cart().cart(Some(&wes)).await.unwrap().is_empty());

        let err = fx
            .shop
            .cart()
            .remove_from_cart(Some(&wes), line.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::NotFound("cart line")));
    }
}
