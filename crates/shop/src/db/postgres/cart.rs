//! Cart repository.
//!
//! The `cart_line_user_item_key` unique constraint keeps one row per
//! (user, item); [`CartRepository::add`] relies on it for the upsert.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{CartLineId, ItemId, Money, UserId};

use crate::db::RepositoryError;
use crate::models::{CartClaim, CartEntry, CartLine, Item};

const CART_LINE_COLUMNS: &str = "id, user_id, item_id, quantity";

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            item_id: row.item_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartEntryRow {
    id: CartLineId,
    quantity: i32,
    item_id: ItemId,
    item_user_id: UserId,
    title: String,
    description: String,
    image: Option<String>,
    large_image: Option<String>,
    price: i64,
    item_created_at: DateTime<Utc>,
}

impl From<CartEntryRow> for CartEntry {
    fn from(row: CartEntryRow) -> Self {
        Self {
            id: row.id,
            quantity: row.quantity,
            item: Item {
                id: row.item_id,
                user_id: row.item_user_id,
                title: row.title,
                description: row.description,
                image: row.image,
                large_image: row.large_image,
                price: Money::from_minor(row.price),
                created_at: row.item_created_at,
            },
        }
    }
}

/// Repository for cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a line or bump the quantity of the existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item or user does not exist.
    pub async fn add(&self, user_id: UserId, item_id: ItemId) -> Result<CartLine, RepositoryError> {
        let query = format!(
            "INSERT INTO shop.cart_line (user_id, item_id, quantity)
             VALUES ($1, $2, 1)
             ON CONFLICT ON CONSTRAINT cart_line_user_item_key
             DO UPDATE SET quantity = shop.cart_line.quantity + 1
             RETURNING {CART_LINE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CartLineRow>(&query)
            .bind(user_id)
            .bind(item_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    if db_err.constraint() == Some("cart_line_user_id_fkey") {
                        return RepositoryError::NotFound("user");
                    }
                    return RepositoryError::NotFound("item");
                }
                RepositoryError::Database(e)
            })?;

        Ok(row.into())
    }

    /// Get a line by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CartLineId) -> Result<Option<CartLine>, RepositoryError> {
        let query = format!("SELECT {CART_LINE_COLUMNS} FROM shop.cart_line WHERE id = $1");
        let row = sqlx::query_as::<_, CartLineRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(CartLine::from))
    }

    /// Delete one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is already gone.
    pub async fn delete(&self, id: CartLineId) -> Result<CartLine, RepositoryError> {
        let query =
            format!("DELETE FROM shop.cart_line WHERE id = $1 RETURNING {CART_LINE_COLUMNS}");
        let row = sqlx::query_as::<_, CartLineRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("cart line"))?;
        Ok(row.into())
    }

    /// The user's cart joined with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartEntryRow>(
            "SELECT c.id, c.quantity,
                    i.id AS item_id, i.user_id AS item_user_id, i.title, i.description,
                    i.image, i.large_image, i.price, i.created_at AS item_created_at
             FROM shop.cart_line c
             JOIN shop.item i ON i.id = c.item_id
             WHERE c.user_id = $1
             ORDER BY c.id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(CartEntry::from).collect())
    }

    /// Take claimed units off the user's lines in one transaction.
    ///
    /// Lines covered entirely by their claim are deleted first; the rest
    /// are decremented by a second statement, which sees any increment
    /// committed by a concurrent add.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either statement fails.
    pub async fn retire(
        &self,
        user_id: UserId,
        claims: &[CartClaim],
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = claims.iter().map(|c| c.id.as_i32()).collect();
        let quantities: Vec<i32> = claims.iter().map(|c| c.quantity).collect();

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM shop.cart_line c
             USING UNNEST($2::int4[], $3::int4[]) AS claim(id, quantity)
             WHERE c.user_id = $1 AND c.id = claim.id AND c.quantity <= claim.quantity",
        )
        .bind(user_id)
        .bind(&ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        let reduced = sqlx::query(
            "UPDATE shop.cart_line c
             SET quantity = c.quantity - claim.quantity
             FROM UNNEST($2::int4[], $3::int4[]) AS claim(id, quantity)
             WHERE c.user_id = $1 AND c.id = claim.id AND c.quantity > claim.quantity",
        )
        .bind(user_id)
        .bind(&ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() + reduced.rows_affected())
    }
}
