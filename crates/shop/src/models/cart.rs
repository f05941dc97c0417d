//! Cart domain types.

use serde::{Deserialize, Serialize};

use sick_fits_core::{CartLineId, ItemId, Money, UserId};

use super::Item;

/// One (user, item) pair in a cart.
///
/// At most one line exists per pair; adding the same item again increments
/// `quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Always positive.
    pub quantity: i32,
}

/// A cart line joined with its item, as read at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub id: CartLineId,
    pub quantity: i32,
    pub item: Item,
}

impl CartEntry {
    /// `price × quantity`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.item.price.checked_mul(i64::from(self.quantity))
    }
}

/// Units of one cart line that a checkout paid for.
///
/// Checkout retires exactly these units once the order exists, so a unit
/// added to the same line while the charge was in flight stays in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartClaim {
    pub id: CartLineId,
    pub quantity: i32,
}

impl From<&CartEntry> for CartClaim {
    fn from(entry: &CartEntry) -> Self {
        Self {
            id: entry.id,
            quantity: entry.quantity,
        }
    }
}
