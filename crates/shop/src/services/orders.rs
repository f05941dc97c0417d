//! Order queries.

use tracing::instrument;

use sick_fits_core::{OrderId, Permission};

use super::guard::{Policy, require_caller};
use crate::context::Caller;
use crate::error::{Result, ShopError};
use crate::models::Order;
use crate::state::Shop;

/// Order reads.
pub struct OrderService<'a> {
    shop: &'a Shop,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// One order, for its owner or an admin.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound("order")` for an unknown order
    /// - `Forbidden` for anyone else's order without `ADMIN`
    #[instrument(skip(self, caller))]
    pub async fn get_order(&self, caller: Option<&Caller>, id: OrderId) -> Result<Order> {
        require_caller(caller)?;
        let order = self
            .shop
            .store()
            .get_order(id)
            .await?
            .ok_or(ShopError::NotFound("order"))?;

        Policy::any_of(&[Permission::Admin])
            .or_owner(order.user_id)
            .authorize(caller)?;
        Ok(order)
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a caller.
    pub async fn list_orders(&self, caller: Option<&Caller>) -> Result<Vec<Order>> {
        let caller = require_caller(caller)?;
        Ok(self
            .shop
            .store()
            .list_orders_for_user(caller.user_id)
            .await?)
    }
}
