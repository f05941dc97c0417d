//! Domain models for the shop.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db::postgres`].

pub mod cart;
pub mod item;
pub mod order;
pub mod reconciliation;
pub mod user;

pub use cart::{CartClaim, CartEntry, CartLine};
pub use item::{Item, ItemPage, ItemUpdate, NewItem};
pub use order::{NewOrder, NewOrderLine, Order, OrderLine};
pub use reconciliation::{NewReconciliation, PendingReconciliation, ReconciliationStatus};
pub use user::{NewUser, User};
