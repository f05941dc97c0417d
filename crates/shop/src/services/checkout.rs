//! Checkout.
//!
//! Checkout runs three steps against three systems: charge the card, write
//! the order, take the paid units out of the cart. Only the charge talks to the outside world, so
//! the order of the steps decides what a failure costs:
//!
//! 1. Before the charge nothing has changed. Validation and payment errors
//!    leave the cart as it was.
//! 2. After the charge the money is gone. If the order or the cart cleanup
//!    fails, the charge is written to the reconciliation queue and the caller
//!    gets `PostPaymentPersistenceFailure` with the charge reference.
//!
//! [`CheckoutService::reconcile`] replays a queued entry. It looks the order
//! up by charge first, so running it twice never writes two orders.

use tokio::time::timeout;
use tracing::instrument;
use uuid::Uuid;

use sick_fits_core::{CurrencyCode, Money, OrderId, ReconciliationId, UserId};

use super::guard::require_caller;
use crate::context::Caller;
use crate::db::RepositoryError;
use crate::error::{Result, ShopError, ValidationError, add_breadcrumb};
use crate::models::{
    CartClaim, CartEntry, NewOrder, NewOrderLine, NewReconciliation, Order, PendingReconciliation,
    ReconciliationStatus,
};
use crate::payment::{Charge, ChargeRequest, PaymentError};
use crate::state::Shop;

/// Sum of `price * quantity` over the cart.
///
/// # Errors
///
/// Returns `ValidationError::TotalOverflow` if any product or the sum leaves
/// the `i64` range.
pub fn cart_total(entries: &[CartEntry]) -> std::result::Result<Money, ValidationError> {
    entries.iter().try_fold(Money::ZERO, |total, entry| {
        entry
            .line_total()
            .and_then(|line| total.checked_add(line))
            .ok_or(ValidationError::TotalOverflow)
    })
}

/// A charge that went through, and what checkout meant to do with it.
struct CapturedCharge {
    user_id: UserId,
    charge: Charge,
    currency: CurrencyCode,
    lines: Vec<NewOrderLine>,
    cart_lines: Vec<CartClaim>,
}

/// Checkout and the reconciliation queue.
pub struct CheckoutService<'a> {
    shop: &'a Shop,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Charge the caller's cart and turn it into an order.
    ///
    /// The order total is the amount the processor confirmed, and each order
    /// line copies the item's title, description, images and price as they
    /// were when the cart was read.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `ValidationFailed` for an empty cart or a total that overflows
    /// - `PaymentFailed` when the card was declined; nothing was charged
    /// - `PaymentStatusUnknown` when the processor did not answer in time or
    ///   could not say; retry with the reported idempotency key
    /// - `PostPaymentPersistenceFailure` when the card was charged but the
    ///   order or cart update failed; the charge is queued for reconciliation
    #[instrument(skip(self, caller, payment_token), fields(user_id, total))]
    pub async fn checkout(&self, caller: Option<&Caller>, payment_token: &str) -> Result<Order> {
        let caller = require_caller(caller)?;
        let user_id = caller.user_id;
        tracing::Span::current().record("user_id", user_id.as_i32());

        let store = self.shop.store();
        let cart = store.cart_for_user(user_id).await?;
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }

        let amount = cart_total(&cart)?;
        tracing::Span::current().record("total", amount.minor_units());

        let settings = self.shop.settings();
        let request = ChargeRequest {
            amount,
            currency: settings.currency,
            token: payment_token.to_string(),
            idempotency_key: Uuid::new_v4(),
        };
        let idempotency_key = request.idempotency_key;

        add_breadcrumb(
            "checkout",
            "Charging card",
            Some(&[
                ("amount", &amount.to_string()),
                ("idempotency_key", &idempotency_key.to_string()),
            ]),
        );

        let charge = match timeout(settings.payment_timeout, self.shop.payment().charge(&request))
            .await
        {
            Ok(Ok(charge)) => charge,
            Ok(Err(PaymentError::StatusUnknown(reason))) => {
                tracing::warn!(%idempotency_key, %reason, "Charge outcome unknown");
                return Err(ShopError::PaymentStatusUnknown { idempotency_key }.report());
            }
            Ok(Err(err)) => {
                tracing::info!(error = %err, "Charge not taken");
                return Err(ShopError::PaymentFailed(err.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    %idempotency_key,
                    timeout = ?settings.payment_timeout,
                    "Charge timed out"
                );
                return Err(ShopError::PaymentStatusUnknown { idempotency_key }.report());
            }
        };

        if charge.amount != amount {
            tracing::warn!(
                requested = %amount,
                confirmed = %charge.amount,
                charge_id = %charge.id,
                "Processor confirmed a different amount"
            );
        }
        add_breadcrumb(
            "checkout",
            "Charge confirmed",
            Some(&[("charge_id", &charge.id)]),
        );

        let captured = CapturedCharge {
            user_id,
            currency: settings.currency,
            lines: cart.iter().map(NewOrderLine::from).collect(),
            cart_lines: cart.iter().map(CartClaim::from).collect(),
            charge,
        };

        let order = match store
            .create_order(NewOrder {
                user_id,
                total: captured.charge.amount,
                currency: captured.currency,
                charge_id: captured.charge.id.clone(),
                lines: captured.lines.clone(),
            })
            .await
        {
            Ok(order) => order,
            Err(err) => return Err(self.post_payment_failure(captured, None, &err).await),
        };

        if let Err(err) = store
            .retire_cart_lines(user_id, &captured.cart_lines)
            .await
        {
            return Err(self
                .post_payment_failure(captured, Some(order.id), &err)
                .await);
        }

        tracing::info!(
            order_id = %order.id,
            charge_id = %order.charge_id,
            lines = order.lines.len(),
            "Order placed"
        );
        Ok(order)
    }

    /// Queue a captured charge whose order did not complete.
    async fn post_payment_failure(
        &self,
        captured: CapturedCharge,
        order_id: Option<OrderId>,
        cause: &RepositoryError,
    ) -> ShopError {
        let reason = cause.to_string();
        tracing::error!(
            charge_id = %captured.charge.id,
            amount = %captured.charge.amount,
            order_id = ?order_id,
            error = %cause,
            "Charge captured but checkout did not complete"
        );

        let entry = NewReconciliation {
            user_id: captured.user_id,
            charge_id: captured.charge.id.clone(),
            amount: captured.charge.amount,
            currency: captured.currency,
            lines: captured.lines,
            cart_lines: captured.cart_lines,
            order_id,
            reason: reason.clone(),
        };

        match self.shop.store().record_reconciliation(entry).await {
            Ok(pending) => {
                tracing::info!(reconciliation_id = %pending.id, "Charge queued for reconciliation");
            }
            Err(err) => {
                sentry::capture_error(&err);
                tracing::error!(
                    charge_id = %captured.charge.id,
                    error = %err,
                    "Could not queue charge for reconciliation"
                );
            }
        }

        ShopError::PostPaymentPersistenceFailure {
            charge_id: captured.charge.id,
            amount: captured.charge.amount,
            order_id,
            reason,
        }
        .report()
    }

    /// Unresolved reconciliation entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the queue cannot be read.
    pub async fn pending_reconciliations(&self) -> Result<Vec<PendingReconciliation>> {
        Ok(self.shop.store().list_pending_reconciliations().await?)
    }

    /// Finish a queued checkout: make sure the order exists, retire the
    /// claimed cart units and mark the entry resolved.
    ///
    /// Resolving an already resolved entry returns its order.
    ///
    /// # Errors
    ///
    /// - `NotFound("reconciliation")` for an unknown entry
    /// - `ShopError::Store` if any write fails; the entry stays pending
    #[instrument(skip(self))]
    pub async fn reconcile(&self, id: ReconciliationId) -> Result<Order> {
        let store = self.shop.store();
        let entry = store
            .get_reconciliation(id)
            .await?
            .ok_or(ShopError::NotFound("reconciliation"))?;

        if entry.status == ReconciliationStatus::Resolved
            && let Some(order_id) = entry.order_id
        {
            return store
                .get_order(order_id)
                .await?
                .ok_or(ShopError::NotFound("order"));
        }

        let order = match store.get_order_by_charge(&entry.charge_id).await? {
            Some(order) => order,
            None => self.create_reconciled_order(&entry).await?,
        };

        let retired = store
            .retire_cart_lines(entry.user_id, &entry.cart_lines)
            .await?;
        store.resolve_reconciliation(entry.id, order.id).await?;

        tracing::info!(
            order_id = %order.id,
            charge_id = %entry.charge_id,
            retired_cart_lines = retired,
            "Reconciliation resolved"
        );
        Ok(order)
    }

    async fn create_reconciled_order(&self, entry: &PendingReconciliation) -> Result<Order> {
        let store = self.shop.store();
        let new_order = NewOrder {
            user_id: entry.user_id,
            total: entry.amount,
            currency: entry.currency,
            charge_id: entry.charge_id.clone(),
            lines: entry.lines.clone(),
        };

        match store.create_order(new_order).await {
            Ok(order) => Ok(order),
            // Lost a race with another reconcile of the same charge.
            Err(RepositoryError::Conflict(_)) => store
                .get_order_by_charge(&entry.charge_id)
                .await?
                .ok_or(ShopError::NotFound("order")),
            Err(err) => Err(err.into()),
        }
    }
}
