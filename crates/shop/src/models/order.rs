//! Order domain types.
//!
//! Orders are immutable once written. Lines are snapshots of the items at
//! checkout time and do not follow later catalog edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sick_fits_core::{CurrencyCode, Money, OrderId, OrderLineId, UserId};

use super::CartEntry;

/// A paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Customer.
    pub user_id: UserId,
    /// Amount confirmed by the payment processor.
    pub total: Money,
    pub currency: CurrencyCode,
    /// Payment processor charge reference. Unique across orders.
    pub charge_id: String,
    /// Item snapshots in cart order.
    pub lines: Vec<OrderLine>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of one purchased item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    /// Unit price at checkout.
    pub price: Money,
    pub quantity: i32,
}

/// Data needed to write an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Money,
    pub currency: CurrencyCode,
    pub charge_id: String,
    pub lines: Vec<NewOrderLine>,
}

/// Item snapshot taken from a cart entry.
///
/// Serializable so a failed checkout can park it in the reconciliation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Money,
    pub quantity: i32,
}

impl From<&CartEntry> for NewOrderLine {
    fn from(entry: &CartEntry) -> Self {
        Self {
            title: entry.item.title.clone(),
            description: entry.item.description.clone(),
            image: entry.item.image.clone(),
            large_image: entry.item.large_image.clone(),
            price: entry.item.price,
            quantity: entry.quantity,
        }
    }
}
