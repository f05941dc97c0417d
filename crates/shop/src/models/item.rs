//! Catalog item domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sick_fits_core::{ItemId, Money, UserId};

/// An item for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item ID.
    pub id: ItemId,
    /// User who listed the item.
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    /// Thumbnail image URL.
    pub image: Option<String>,
    /// Full-size image URL.
    pub large_image: Option<String>,
    /// Unit price in minor units.
    pub price: Money,
    /// When the item was listed.
    pub created_at: DateTime<Utc>,
}

/// Data needed to list an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub large_image: Option<String>,
    pub price: Money,
}

/// Partial update of an item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
}

impl ItemUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.price.is_none()
    }
}

/// Offset pagination over the catalog, newest first.
///
/// `first` is clamped to `1..=MAX_FIRST` however the page is built,
/// including when it is deserialized from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawItemPage")]
pub struct ItemPage {
    skip: u32,
    first: u32,
}

#[derive(Deserialize)]
struct RawItemPage {
    #[serde(default)]
    skip: u32,
    #[serde(default = "default_first")]
    first: u32,
}

const fn default_first() -> u32 {
    ItemPage::DEFAULT_FIRST
}

impl From<RawItemPage> for ItemPage {
    fn from(raw: RawItemPage) -> Self {
        Self::new(raw.skip, raw.first)
    }
}

impl ItemPage {
    /// Largest page the read proxy serves.
    pub const MAX_FIRST: u32 = 100;
    /// Page size used by the storefront.
    pub const DEFAULT_FIRST: u32 = 4;

    /// Create a page with `first` clamped to the allowed range.
    #[must_use]
    pub fn new(skip: u32, first: u32) -> Self {
        Self {
            skip,
            first: first.clamp(1, Self::MAX_FIRST),
        }
    }

    /// Items to skip.
    #[must_use]
    pub const fn skip(self) -> u32 {
        self.skip
    }

    /// Items to return.
    #[must_use]
    pub const fn first(self) -> u32 {
        self.first
    }
}

impl Default for ItemPage {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_FIRST)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_page_clamps_first() {
        assert_eq!(ItemPage::new(0, 0).first(), 1);
        assert_eq!(ItemPage::new(8, 500).first(), ItemPage::MAX_FIRST);
        assert_eq!(ItemPage::new(8, 4), ItemPage { skip: 8, first: 4 });
    }

    #[test]
    fn test_item_page_clamps_when_deserialized() {
        let page: ItemPage = serde_json::from_str(r#"{"skip": 2, "first": 10000}"#).unwrap();
        assert_eq!(page, ItemPage::new(2, ItemPage::MAX_FIRST));

        let page: ItemPage = serde_json::from_str(r#"{"first": 0}"#).unwrap();
        assert_eq!(page.skip(), 0);
        assert_eq!(page.first(), 1);

        let page: ItemPage = serde_json::from_str("{}").unwrap();
        assert_eq!(page, ItemPage::default());
    }

    #[test]
    fn test_item_update_is_empty() {
        assert!(ItemUpdate::default().is_empty());
        let update = ItemUpdate {
            price: Some(Money::from_minor(100)),
            ..ItemUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
