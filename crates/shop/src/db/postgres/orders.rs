//! Order repository.
//!
//! An order and its lines are written in one transaction. `charge_id` is
//! unique, so a charge can back at most one order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sick_fits_core::{CurrencyCode, Money, OrderId, OrderLineId, UserId};

use crate::db::RepositoryError;
use crate::models::{NewOrder, Order, OrderLine};

const ORDER_COLUMNS: &str = "id, user_id, total, currency, charge_id, created_at";
const ORDER_LINE_COLUMNS: &str =
    "id, order_id, title, description, image, large_image, price, quantity";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total: i64,
    currency: String,
    charge_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    title: String,
    description: String,
    image: Option<String>,
    large_image: Option<String>,
    price: i64,
    quantity: i32,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            image: row.image,
            large_image: row.large_image,
            price: Money::from_minor(row.price),
            quantity: row.quantity,
        }
    }
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let currency = self.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            total: Money::from_minor(self.total),
            currency,
            charge_id: self.charge_id,
            lines,
            created_at: self.created_at,
        })
    }
}

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Write an order and its lines atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order exists for the charge.
    pub async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO shop.\"order\" (user_id, total, currency, charge_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(order.user_id)
            .bind(order.total.minor_units())
            .bind(order.currency.code())
            .bind(&order.charge_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict(format!(
                        "order already exists for charge {}",
                        order.charge_id
                    ));
                }
                RepositoryError::Database(e)
            })?;

        let line_query = format!(
            "INSERT INTO shop.order_line
                 (order_id, position, title, description, image, large_image, price, quantity)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {ORDER_LINE_COLUMNS}"
        );
        let mut lines = Vec::with_capacity(order.lines.len());
        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|e| RepositoryError::DataCorruption(format!("line position: {e}")))?;
            let line_row = sqlx::query_as::<_, OrderLineRow>(&line_query)
                .bind(row.id)
                .bind(position)
                .bind(&line.title)
                .bind(&line.description)
                .bind(&line.image)
                .bind(&line.large_image)
                .bind(line.price.minor_units())
                .bind(line.quantity)
                .fetch_one(&mut *tx)
                .await?;
            lines.push(OrderLine::from(line_row));
        }

        tx.commit().await?;
        row.into_order(lines)
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM shop.\"order\" WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        self.with_lines(row).await
    }

    /// Get the order backed by a charge.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_charge(&self, charge_id: &str) -> Result<Option<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM shop.\"order\" WHERE charge_id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(charge_id)
            .fetch_optional(self.pool)
            .await?;
        self.with_lines(row).await
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM shop.\"order\"
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&query)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<i32> = rows.iter().map(|row| row.id.as_i32()).collect();
        let line_query = format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM shop.order_line
             WHERE order_id = ANY($1)
             ORDER BY order_id, position"
        );
        let line_rows = sqlx::query_as::<_, OrderLineRow>(&line_query)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for line in line_rows {
            lines_by_order
                .entry(line.order_id)
                .or_default()
                .push(line.into());
        }

        rows.into_iter()
            .map(|row| {
                let lines = lines_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    async fn with_lines(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let query = format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM shop.order_line
             WHERE order_id = $1
             ORDER BY position"
        );
        let lines = sqlx::query_as::<_, OrderLineRow>(&query)
            .bind(row.id)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(OrderLine::from)
            .collect();

        row.into_order(lines).map(Some)
    }
}
