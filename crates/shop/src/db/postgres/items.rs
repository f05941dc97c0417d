//! Catalog repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{ItemId, Money, UserId};

use crate::db::RepositoryError;
use crate::models::{Item, ItemPage, ItemUpdate, NewItem};

/// Column list for `shop.item` queries.
const ITEM_COLUMNS: &str =
    "id, user_id, title, description, image, large_image, price, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: ItemId,
    user_id: UserId,
    title: String,
    description: String,
    image: Option<String>,
    large_image: Option<String>,
    price: i64,
    created_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            image: row.image,
            large_image: row.large_image,
            price: Money::from_minor(row.price),
            created_at: row.created_at,
        }
    }
}

/// Repository for catalog items.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List an item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner does not exist.
    pub async fn create(&self, owner: UserId, item: NewItem) -> Result<Item, RepositoryError> {
        let query = format!(
            "INSERT INTO shop.item (user_id, title, description, image, large_image, price)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&query)
            .bind(owner)
            .bind(&item.title)
            .bind(&item.description)
            .bind(&item.image)
            .bind(&item.large_image)
            .bind(item.price.minor_units())
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound("user");
                }
                RepositoryError::Database(e)
            })?;

        Ok(row.into())
    }

    /// Get an item by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM shop.item WHERE id = $1");
        let row = sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Item::from))
    }

    /// One page of items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, page: ItemPage) -> Result<Vec<Item>, RepositoryError> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM shop.item
             ORDER BY created_at DESC, id DESC
             OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query_as::<_, ItemRow>(&query)
            .bind(i64::from(page.skip()))
            .bind(i64::from(page.first()))
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Number of items in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.item")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn update(&self, id: ItemId, update: ItemUpdate) -> Result<Item, RepositoryError> {
        let query = format!(
            "UPDATE shop.item
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 price = COALESCE($4, price)
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .bind(update.title)
            .bind(update.description)
            .bind(update.price.map(Money::minor_units))
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("item"))?;
        Ok(row.into())
    }

    /// Delete an item. Cart lines holding it go with it (`ON DELETE CASCADE`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not exist.
    pub async fn delete(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let query = format!("DELETE FROM shop.item WHERE id = $1 RETURNING {ITEM_COLUMNS}");
        let row = sqlx::query_as::<_, ItemRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("item"))?;
        Ok(row.into())
    }
}
