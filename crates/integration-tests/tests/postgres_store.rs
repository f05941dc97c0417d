//! Store guarantees against a real `PostgreSQL` database.
//!
//! These tests require `TEST_DATABASE_URL`. Each test uses fresh users so
//! runs do not interfere.
//!
//! Run with: `cargo test -p sick-fits-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use sick_fits_core::{Money, Permission};
use sick_fits_integration_tests::{TestShop, pg_store, unique_email};
use sick_fits_shop::db::{CartStore, OrderStore, PgStore, UserStore};
use sick_fits_shop::mail::RecordingMailer;
use sick_fits_shop::models::CartClaim;
use sick_fits_shop::payment::ScriptedProcessor;
use sick_fits_shop::ShopError;

async fn pg_shop() -> TestShop<PgStore> {
    let store = pg_store()
        .await
        .expect("TEST_DATABASE_URL must be set for Postgres tests");
    TestShop::build(
        Arc::new(store),
        ScriptedProcessor::approving(),
        RecordingMailer::new(),
        Duration::from_secs(2),
    )
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_pg_concurrent_adds_make_one_line() {
    let t = pg_shop().await;
    let buyer = t.user(&unique_email("buyer"), &[Permission::User]).await;
    let hat = t.item(&buyer, "hat", 1000).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shop = t.shop.clone();
            let buyer = buyer.clone();
            tokio::spawn(async move { shop.cart().add_to_cart(Some(&buyer), hat.id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cart = t.store.cart_for_user(buyer.user_id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 8);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_pg_checkout_round_trip() {
    let t = pg_shop().await;
    let seller = t.user(&unique_email("seller"), &[Permission::User]).await;
    let buyer = t.user(&unique_email("buyer"), &[Permission::User]).await;
    let hat = t.item(&seller, "hat", 1000).await;
    let socks = t.item(&seller, "socks", 500).await;
    t.shop.cart().add_to_cart(Some(&buyer), hat.id).await.unwrap();
    t.shop.cart().add_to_cart(Some(&buyer), hat.id).await.unwrap();
    t.shop.cart().add_to_cart(Some(&buyer), socks.id).await.unwrap();

    let order = t.shop.checkout().checkout(Some(&buyer), "tok_visa").await.unwrap();
    assert_eq!(order.total, Money::from_minor(2500));
    assert!(t.store.cart_for_user(buyer.user_id).await.unwrap().is_empty());

    let stored = t.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
    let by_charge = t.store.get_order_by_charge(&order.charge_id).await.unwrap();
    assert_eq!(by_charge.map(|o| o.id), Some(order.id));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_pg_retire_keeps_units_added_after_claim() {
    let t = pg_shop().await;
    let seller = t.user(&unique_email("seller"), &[Permission::User]).await;
    let buyer = t.user(&unique_email("buyer"), &[Permission::User]).await;
    let hat = t.item(&seller, "hat", 1000).await;
    let socks = t.item(&seller, "socks", 500).await;
    t.store.add_cart_line(buyer.user_id, hat.id).await.unwrap();
    t.store.add_cart_line(buyer.user_id, hat.id).await.unwrap();
    t.store.add_cart_line(buyer.user_id, socks.id).await.unwrap();

    let claims: Vec<CartClaim> = t
        .store
        .cart_for_user(buyer.user_id)
        .await
        .unwrap()
        .iter()
        .map(CartClaim::from)
        .collect();
    t.store.add_cart_line(buyer.user_id, hat.id).await.unwrap();

    let changed = t.store.retire_cart_lines(buyer.user_id, &claims).await.unwrap();
    assert_eq!(changed, 2);

    let cart = t.store.cart_for_user(buyer.user_id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item.id, hat.id);
    assert_eq!(cart[0].quantity, 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_pg_missing_item_is_not_found() {
    let t = pg_shop().await;
    let buyer = t.user(&unique_email("buyer"), &[Permission::User]).await;

    let err = t
        .shop
        .cart()
        .add_to_cart(Some(&buyer), sick_fits_core::ItemId::new(i32::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::NotFound("item")));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_pg_reset_token_single_use() {
    let t = pg_shop().await;
    let wes = t.user(&unique_email("wes"), &[Permission::User]).await;
    let token = format!("{:040x}", wes.user_id.as_i32());
    t.store
        .set_reset_token(wes.user_id, &token, Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    let first = t
        .store
        .consume_reset_token(&token, Utc::now(), "new-hash")
        .await
        .unwrap();
    assert_eq!(first.map(|u| u.id), Some(wes.user_id));

    let second = t
        .store
        .consume_reset_token(&token, Utc::now(), "newer-hash")
        .await
        .unwrap();
    assert!(second.is_none());
}
