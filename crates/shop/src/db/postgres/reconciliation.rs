//! Reconciliation queue repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use sick_fits_core::{CurrencyCode, Money, OrderId, ReconciliationId, UserId};

use crate::db::RepositoryError;
use crate::models::{
    CartClaim, NewOrderLine, NewReconciliation, PendingReconciliation, ReconciliationStatus,
};

const RECONCILIATION_COLUMNS: &str = "id, user_id, charge_id, amount, currency, lines, \
    cart_lines, order_id, reason, status, created_at, resolved_at";

#[derive(Debug, sqlx::FromRow)]
struct ReconciliationRow {
    id: ReconciliationId,
    user_id: UserId,
    charge_id: String,
    amount: i64,
    currency: String,
    lines: Json<Vec<NewOrderLine>>,
    cart_lines: Json<Vec<CartClaim>>,
    order_id: Option<OrderId>,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReconciliationRow> for PendingReconciliation {
    type Error = RepositoryError;

    fn try_from(row: ReconciliationRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("reconciliation {}: {e}", row.id))
        })?;
        let status = row
            .status
            .parse::<ReconciliationStatus>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            charge_id: row.charge_id,
            amount: Money::from_minor(row.amount),
            currency,
            lines: row.lines.0,
            cart_lines: row.cart_lines.0,
            order_id: row.order_id,
            reason: row.reason,
            status,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

/// Repository for post-payment failures.
pub struct ReconciliationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReconciliationRepository<'a> {
    /// Create a new reconciliation repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Park a failed checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        entry: NewReconciliation,
    ) -> Result<PendingReconciliation, RepositoryError> {
        let query = format!(
            "INSERT INTO shop.pending_reconciliation
                 (user_id, charge_id, amount, currency, lines, cart_lines, order_id, reason)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RECONCILIATION_COLUMNS}"
        );
        sqlx::query_as::<_, ReconciliationRow>(&query)
            .bind(entry.user_id)
            .bind(&entry.charge_id)
            .bind(entry.amount.minor_units())
            .bind(entry.currency.code())
            .bind(Json(&entry.lines))
            .bind(Json(&entry.cart_lines))
            .bind(entry.order_id)
            .bind(&entry.reason)
            .fetch_one(self.pool)
            .await?
            .try_into()
    }

    /// Unresolved entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_pending(&self) -> Result<Vec<PendingReconciliation>, RepositoryError> {
        let query = format!(
            "SELECT {RECONCILIATION_COLUMNS} FROM shop.pending_reconciliation
             WHERE status = 'pending'
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ReconciliationRow>(&query)
            .fetch_all(self.pool)
            .await?
            .into_iter()
            .map(PendingReconciliation::try_from)
            .collect()
    }

    /// Get an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        id: ReconciliationId,
    ) -> Result<Option<PendingReconciliation>, RepositoryError> {
        let query =
            format!("SELECT {RECONCILIATION_COLUMNS} FROM shop.pending_reconciliation WHERE id = $1");
        sqlx::query_as::<_, ReconciliationRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .map(PendingReconciliation::try_from)
            .transpose()
    }

    /// Mark an entry resolved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry does not exist.
    pub async fn resolve(
        &self,
        id: ReconciliationId,
        order_id: OrderId,
    ) -> Result<PendingReconciliation, RepositoryError> {
        let query = format!(
            "UPDATE shop.pending_reconciliation
             SET status = 'resolved', order_id = $2, resolved_at = NOW()
             WHERE id = $1
             RETURNING {RECONCILIATION_COLUMNS}"
        );
        sqlx::query_as::<_, ReconciliationRow>(&query)
            .bind(id)
            .bind(order_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("reconciliation"))?
            .try_into()
    }
}
