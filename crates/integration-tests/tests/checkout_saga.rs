//! Checkout: charge, order, cart cleanup, and what happens when a step fails.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use sick_fits_core::{ItemId, Money, Permission, UserId};
use sick_fits_integration_tests::{TestShop, test_settings};
use sick_fits_shop::db::{CartStore, MemoryStore, StoreFault};
use sick_fits_shop::mail::RecordingMailer;
use sick_fits_shop::models::ItemUpdate;
use sick_fits_shop::payment::{
    Charge, ChargeRequest, PaymentError, PaymentProcessor, ScriptedProcessor,
};
use sick_fits_shop::{Caller, ErrorKind, Shop, ShopError, ValidationError};

/// Two hats at 1000 and one pair of socks at 500.
async fn fill_cart(t: &TestShop) -> Caller {
    let seller = t.user("seller@example.com", &[Permission::User]).await;
    let buyer = t.user("buyer@example.com", &[Permission::User]).await;
    let hat = t.item(&seller, "hat", 1000).await;
    let socks = t.item(&seller, "socks", 500).await;

    let cart = t.shop.cart();
    cart.add_to_cart(Some(&buyer), hat.id).await.unwrap();
    cart.add_to_cart(Some(&buyer), hat.id).await.unwrap();
    cart.add_to_cart(Some(&buyer), socks.id).await.unwrap();
    buyer
}

/// Approves the charge, but only after the buyer adds one more unit of an
/// item already in the cart.
struct AddsToCartWhileCharging {
    store: Arc<MemoryStore>,
    buyer: UserId,
    item: ItemId,
}

#[async_trait]
impl PaymentProcessor for AddsToCartWhileCharging {
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        self.store
            .add_cart_line(self.buyer, self.item)
            .await
            .map_err(|e| PaymentError::Failed(e.to_string()))?;
        Ok(Charge {
            id: "ch_mid_flight".to_string(),
            amount: request.amount,
        })
    }
}

/// The same store and mailer as `t`, charging through
/// [`AddsToCartWhileCharging`] for the buyer's hat.
async fn shop_adding_hat_mid_charge(t: &TestShop, buyer: &Caller) -> Shop {
    let cart = t.shop.cart().cart(Some(buyer)).await.unwrap();
    let hat = cart.iter().find(|entry| entry.item.title == "hat").unwrap();
    Shop::new(
        test_settings(Duration::from_millis(250)),
        t.store.clone(),
        Arc::new(AddsToCartWhileCharging {
            store: t.store.clone(),
            buyer: buyer.user_id,
            item: hat.item.id,
        }),
        t.mailer.clone(),
    )
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_checkout_charges_cart_total() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;

    let order = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap();

    let requests = t.payment.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount, Money::from_minor(2500));
    assert_eq!(order.total, Money::from_minor(2500));
    assert_eq!(order.charge_id, "ch_test_1");
    assert!(t.shop.cart().cart(Some(&buyer)).await.unwrap().is_empty());

    let listed = t.shop.orders().list_orders(Some(&buyer)).await.unwrap();
    assert_eq!(listed, vec![order]);
}

#[tokio::test]
async fn test_order_total_is_confirmed_amount() {
    let t = TestShop::with_processor(ScriptedProcessor::confirming(Money::from_minor(2499)));
    let buyer = fill_cart(&t).await;

    let order = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap();
    assert_eq!(t.payment.requests().await[0].amount, Money::from_minor(2500));
    assert_eq!(order.total, Money::from_minor(2499));
}

#[tokio::test]
async fn test_order_is_decoupled_from_catalog_changes() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    let order = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap();

    let items = t.shop.catalog().items(Default::default()).await.unwrap();
    let admin = t.user("admin@example.com", &[Permission::Admin]).await;
    for item in &items {
        t.shop
            .catalog()
            .update_item(
                Some(&admin),
                item.id,
                ItemUpdate {
                    title: Some("renamed".to_string()),
                    price: Some(Money::from_minor(1)),
                    ..ItemUpdate::default()
                },
            )
            .await
            .unwrap();
    }

    let reloaded = t.shop.orders().get_order(Some(&buyer), order.id).await.unwrap();
    assert_eq!(reloaded.total, Money::from_minor(2500));
    let hat = reloaded.lines.iter().find(|l| l.title == "hat").unwrap();
    assert_eq!(hat.price, Money::from_minor(1000));
    assert_eq!(hat.quantity, 2);
    assert_eq!(hat.image.as_deref(), Some("https://images.example.com/hat.jpg"));
}

// ============================================================================
// Failures before the charge
// ============================================================================

#[tokio::test]
async fn test_empty_cart_never_reaches_processor() {
    let t = TestShop::new();
    let buyer = t.user("buyer@example.com", &[Permission::User]).await;

    let err = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    assert!(matches!(
        err,
        ShopError::ValidationFailed(ValidationError::EmptyCart)
    ));
    assert!(t.payment.requests().await.is_empty());
}

#[tokio::test]
async fn test_declined_card_keeps_cart() {
    let t = TestShop::with_processor(ScriptedProcessor::declining("Your card was declined."));
    let buyer = fill_cart(&t).await;

    let err = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentFailed);
    assert!(!err.payment_captured());
    assert_eq!(t.shop.cart().cart(Some(&buyer)).await.unwrap().len(), 2);
    assert!(t.shop.orders().list_orders(Some(&buyer)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_processor_reports_unknown_status() {
    let t = TestShop::build(
        Arc::new(MemoryStore::new()),
        ScriptedProcessor::hanging(),
        RecordingMailer::new(),
        Duration::from_millis(50),
    );
    let buyer = fill_cart(&t).await;

    let err = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    let ShopError::PaymentStatusUnknown { idempotency_key } = err else {
        panic!("expected PaymentStatusUnknown, got {err:?}");
    };
    assert_eq!(t.payment.requests().await[0].idempotency_key, idempotency_key);
    assert_eq!(t.shop.cart().cart(Some(&buyer)).await.unwrap().len(), 2);
    assert!(t.shop.orders().list_orders(Some(&buyer)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_each_attempt_uses_new_idempotency_key() {
    let t = TestShop::with_processor(ScriptedProcessor::unknown());
    let buyer = fill_cart(&t).await;

    t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();

    let requests = t.payment.requests().await;
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].idempotency_key, requests[1].idempotency_key);
}

// ============================================================================
// Failures after the charge
// ============================================================================

#[tokio::test]
async fn test_failed_order_write_is_reconciled_once() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    t.store.fail_on(StoreFault::CreateOrder).await;

    let err = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PostPaymentPersistenceFailure);
    let ShopError::PostPaymentPersistenceFailure {
        charge_id, amount, ..
    } = err
    else {
        unreachable!();
    };
    assert_eq!(amount, Money::from_minor(2500));
    assert_eq!(t.shop.cart().cart(Some(&buyer)).await.unwrap().len(), 2);

    let checkout = t.shop.checkout();
    let pending = checkout.pending_reconciliations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].charge_id, charge_id);
    assert_eq!(pending[0].user_id, buyer.user_id);

    t.store.clear_faults().await;
    let first = checkout.reconcile(pending[0].id).await.unwrap();
    let second = checkout.reconcile(pending[0].id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.charge_id, charge_id);

    assert_eq!(t.shop.orders().list_orders(Some(&buyer)).await.unwrap().len(), 1);
    assert!(t.shop.cart().cart(Some(&buyer)).await.unwrap().is_empty());
    assert!(checkout.pending_reconciliations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_keeps_items_added_after_checkout() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    t.store.fail_on(StoreFault::CreateOrder).await;
    t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    t.store.clear_faults().await;

    let seller = t.user("other-seller@example.com", &[Permission::User]).await;
    let belt = t.item(&seller, "belt", 2000).await;
    t.shop.cart().add_to_cart(Some(&buyer), belt.id).await.unwrap();

    let pending = t.shop.checkout().pending_reconciliations().await.unwrap();
    t.shop.checkout().reconcile(pending[0].id).await.unwrap();

    let cart = t.shop.cart().cart(Some(&buyer)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item.id, belt.id);
}

#[tokio::test]
async fn test_failed_cart_cleanup_reports_order() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    t.store.fail_on(StoreFault::RetireCartLines).await;

    let err = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    let ShopError::PostPaymentPersistenceFailure { order_id, .. } = err else {
        panic!("expected PostPaymentPersistenceFailure, got {err:?}");
    };
    let order_id = order_id.unwrap();
    let order = t.shop.orders().get_order(Some(&buyer), order_id).await.unwrap();
    assert_eq!(order.total, Money::from_minor(2500));
}

// ============================================================================
// Adds that land while the card is being charged
// ============================================================================

#[tokio::test]
async fn test_unit_added_during_charge_stays_in_cart() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    let shop = shop_adding_hat_mid_charge(&t, &buyer).await;

    let order = shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap();
    assert_eq!(order.total, Money::from_minor(2500));
    let paid_hats = order.lines.iter().find(|l| l.title == "hat").unwrap();
    assert_eq!(paid_hats.quantity, 2);

    let cart = shop.cart().cart(Some(&buyer)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item.title, "hat");
    assert_eq!(cart[0].quantity, 1);
}

#[tokio::test]
async fn test_reconcile_retires_only_paid_units() {
    let t = TestShop::new();
    let buyer = fill_cart(&t).await;
    let shop = shop_adding_hat_mid_charge(&t, &buyer).await;
    t.store.fail_on(StoreFault::CreateOrder).await;

    let err = shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap_err();
    assert!(err.payment_captured());
    t.store.clear_faults().await;

    let pending = shop.checkout().pending_reconciliations().await.unwrap();
    assert_eq!(pending.len(), 1);
    shop.checkout().reconcile(pending[0].id).await.unwrap();

    let cart = shop.cart().cart(Some(&buyer)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item.title, "hat");
    assert_eq!(cart[0].quantity, 1);
}
