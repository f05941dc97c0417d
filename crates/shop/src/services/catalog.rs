//! Catalog writes and the public read proxy.
//!
//! Reads are open to everyone and limited to the listed queries. Writes need
//! a caller; updates and deletes go to the item's owner or a catalog
//! permission holder.

use tracing::instrument;

use sick_fits_core::{ItemId, Permission};

use super::guard::{Policy, require_caller};
use crate::context::Caller;
use crate::error::{Result, ShopError, ValidationError};
use crate::models::{Item, ItemPage, ItemUpdate, NewItem};
use crate::state::Shop;

fn validate_title(title: &str) -> std::result::Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::InvalidItem("title is required".to_string()));
    }
    Ok(())
}

fn validate_price(price: sick_fits_core::Money) -> std::result::Result<(), ValidationError> {
    if price.is_negative() {
        return Err(ValidationError::InvalidItem(
            "price cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Catalog operations.
pub struct CatalogService<'a> {
    shop: &'a Shop,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    async fn existing(&self, id: ItemId) -> Result<Item> {
        self.shop
            .store()
            .get_item(id)
            .await?
            .ok_or(ShopError::NotFound("item"))
    }

    /// List an item for sale, owned by the caller.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `Forbidden` without `USER`, `ITEMCREATE` or `ADMIN`
    /// - `ValidationFailed` for a blank title or a negative price
    #[instrument(skip(self, caller, item), fields(title = %item.title))]
    pub async fn create_item(&self, caller: Option<&Caller>, item: NewItem) -> Result<Item> {
        Policy::any_of(&[Permission::Admin, Permission::ItemCreate, Permission::User])
            .authorize(caller)?;
        let caller = require_caller(caller)?;

        validate_title(&item.title)?;
        validate_price(item.price)?;

        let item = self.shop.store().create_item(caller.user_id, item).await?;
        tracing::info!(item_id = %item.id, user_id = %caller.user_id, "Item created");
        Ok(item)
    }

    /// Change an item's title, description or price.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound("item")` for an unknown item
    /// - `Forbidden` unless the caller owns it or holds `ITEMUPDATE`/`ADMIN`
    /// - `ValidationFailed` for a blank title or a negative price
    #[instrument(skip(self, caller, update))]
    pub async fn update_item(
        &self,
        caller: Option<&Caller>,
        id: ItemId,
        update: ItemUpdate,
    ) -> Result<Item> {
        require_caller(caller)?;
        let item = self.existing(id).await?;
        Policy::any_of(&[Permission::Admin, Permission::ItemUpdate])
            .or_owner(item.user_id)
            .authorize(caller)?;

        if update.is_empty() {
            return Ok(item);
        }
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }

        let item = self.shop.store().update_item(id, update).await?;
        tracing::info!(item_id = %item.id, "Item updated");
        Ok(item)
    }

    /// Delete an item. Cart lines for it go with it; order lines are copies
    /// and stay.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` without a caller
    /// - `NotFound("item")` for an unknown item
    /// - `Forbidden` unless the caller owns it or holds `ITEMDELETE`/`ADMIN`
    #[instrument(skip(self, caller))]
    pub async fn delete_item(&self, caller: Option<&Caller>, id: ItemId) -> Result<Item> {
        require_caller(caller)?;
        let item = self.existing(id).await?;
        Policy::any_of(&[Permission::Admin, Permission::ItemDelete])
            .or_owner(item.user_id)
            .authorize(caller)?;

        let deleted = self.shop.store().delete_item(id).await?;
        tracing::info!(item_id = %deleted.id, title = %deleted.title, "Item deleted");
        Ok(deleted)
    }

    /// A page of items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the query fails.
    pub async fn items(&self, page: ItemPage) -> Result<Vec<Item>> {
        Ok(self.shop.store().list_items(page).await?)
    }

    /// One item, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the query fails.
    pub async fn item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.shop.store().get_item(id).await?)
    }

    /// Number of items in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the query fails.
    pub async fn items_count(&self) -> Result<i64> {
        Ok(self.shop.store().count_items().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sick_fits_core::Money;

    use super::*;
    use crate::services::test_support::fixture;

    fn new_item(title: &str, price: i64) -> NewItem {
        NewItem {
            title: title.to_string(),
            description: String::new(),
            image: None,
            large_image: None,
            price: Money::from_minor(price),
        }
    }

    #[tokio::test]
    async fn test_any_user_can_sell() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;

        let item = fx
            .shop
            .catalog()
            .create_item(Some(&wes), new_item("Hat", 1000))
            .await
            .unwrap();
        assert_eq!(item.user_id, wes.user_id);
        assert_eq!(fx.shop.catalog().items_count().await.unwrap(), 1);

        let err = fx
            .shop
            .catalog()
            .create_item(None, new_item("Hat", 1000))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_create_item_validation() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;

        for bad in [new_item("  ", 1000), new_item("Hat", -1)] {
            let err = fx
                .shop
                .catalog()
                .create_item(Some(&wes), bad)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                ShopError::ValidationFailed(ValidationError::InvalidItem(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_update_by_owner_or_permission() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let scott = fx.user("scott@example.com", &[Permission::User]).await;
        let editor = fx
            .user("editor@example.com", &[Permission::ItemUpdate])
            .await;
        let hat = fx.item(&wes, "Hat", 1000).await;
        let catalog = fx.shop.catalog();

        let err = catalog
            .update_item(
                Some(&scott),
                hat.id,
                ItemUpdate {
                    title: Some("Stolen Hat".to_string()),
                    ..ItemUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Forbidden));

        let updated = catalog
            .update_item(
                Some(&editor),
                hat.id,
                ItemUpdate {
                    price: Some(Money::from_minor(1200)),
                    ..ItemUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, Money::from_minor(1200));
        assert_eq!(updated.title, "Hat");
    }

    #[tokio::test]
    async fn test_delete_item_rules() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        let scott = fx.user("scott@example.com", &[Permission::User]).await;
        let hat = fx.item(&wes, "Hat", 1000).await;
        let catalog = fx.shop.catalog();

        assert!(matches!(
            catalog.delete_item(None, hat.id).await,
            Err(ShopError::Unauthenticated)
        ));
        assert!(matches!(
            catalog.delete_item(Some(&scott), hat.id).await,
            Err(ShopError::Forbidden)
        ));
        assert!(matches!(
            catalog.delete_item(Some(&wes), ItemId::new(404)).await,
            Err(ShopError::NotFound("item"))
        ));

        let deleted = catalog.delete_item(Some(&wes), hat.id).await.unwrap();
        assert_eq!(deleted.id, hat.id);
        assert!(catalog.item(hat.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_items_newest_first() {
        let fx = fixture();
        let wes = fx.user("wes@example.com", &[Permission::User]).await;
        fx.item(&wes, "Hat", 1000).await;
        fx.item(&wes, "Socks", 500).await;

        let page = fx.shop.catalog().items(ItemPage::new(0, 1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Socks");
    }
}
