//! Cart behaviour across users and concurrent requests.

#![allow(clippy::unwrap_used)]

use sick_fits_core::{ItemId, Permission};
use sick_fits_integration_tests::TestShop;
use sick_fits_shop::ShopError;

// ============================================================================
// Merging
// ============================================================================

#[tokio::test]
async fn test_adding_same_item_twice_merges() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;

    t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();
    t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

    let cart = t.shop.cart().cart(Some(&wes)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 2);
    assert_eq!(cart[0].item.id, hat.id);
}

#[tokio::test]
async fn test_concurrent_adds_make_one_line() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let shop = t.shop.clone();
            let wes = wes.clone();
            tokio::spawn(async move { shop.cart().add_to_cart(Some(&wes), hat.id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cart = t.shop.cart().cart(Some(&wes)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 16);
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let scott = t.user("scott@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;

    t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();
    t.shop.cart().add_to_cart(Some(&scott), hat.id).await.unwrap();

    let wes_cart = t.shop.cart().cart(Some(&wes)).await.unwrap();
    let scott_cart = t.shop.cart().cart(Some(&scott)).await.unwrap();
    assert_eq!(wes_cart.len(), 1);
    assert_eq!(scott_cart.len(), 1);
    assert_ne!(wes_cart[0].id, scott_cart[0].id);
}

// ============================================================================
// Removal
// ============================================================================

#[tokio::test]
async fn test_remove_someone_elses_line_is_forbidden() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let scott = t.user("scott@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;
    let line = t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

    let err = t
        .shop
        .cart()
        .remove_from_cart(Some(&scott), line.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Forbidden));

    let cart = t.shop.cart().cart(Some(&wes)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 1);
}

#[tokio::test]
async fn test_remove_drops_whole_line() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;
    t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();
    let line = t.shop.cart().add_to_cart(Some(&wes), hat.id).await.unwrap();

    let removed = t
        .shop
        .cart()
        .remove_from_cart(Some(&wes), line.id)
        .await
        .unwrap();
    assert_eq!(removed.quantity, 2);
    assert!(t.shop.cart().cart(Some(&wes)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_an_item_clears_it_from_carts() {
    let t = TestShop::new();
    let wes = t.user("wes@example.com", &[Permission::User]).await;
    let scott = t.user("scott@example.com", &[Permission::User]).await;
    let hat = t.item(&wes, "hat", 1000).await;
    let socks = t.item(&wes, "socks", 500).await;
    t.shop.cart().add_to_cart(Some(&scott), hat.id).await.unwrap();
    t.shop.cart().add_to_cart(Some(&scott), socks.id).await.unwrap();

    t.shop.catalog().delete_item(Some(&wes), hat.id).await.unwrap();

    let cart = t.shop.cart().cart(Some(&scott)).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].item.id, socks.id);
}

#[tokio::test]
async fn test_cart_requires_sign_in() {
    let t = TestShop::new();
    assert!(matches!(
        t.shop.cart().add_to_cart(None, ItemId::new(1)).await,
        Err(ShopError::Unauthenticated)
    ));
    assert!(matches!(
        t.shop.cart().cart(None).await,
        Err(ShopError::Unauthenticated)
    ));
}
