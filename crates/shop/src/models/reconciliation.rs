//! Post-payment failures awaiting an operator.
//!
//! When a charge succeeds but the order or cart write fails, checkout parks
//! everything needed to finish the job here. `sf-cli reconcile run` replays
//! the entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sick_fits_core::{CurrencyCode, Money, OrderId, ReconciliationId, UserId};

use super::{CartClaim, NewOrderLine};

/// Whether an entry still needs work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Pending,
    Resolved,
}

impl ReconciliationStatus {
    /// Stored name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown reconciliation status: {other}")),
        }
    }
}

/// A captured charge whose order or cart cleanup did not persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReconciliation {
    pub id: ReconciliationId,
    pub user_id: UserId,
    pub charge_id: String,
    /// Confirmed amount.
    pub amount: Money,
    pub currency: CurrencyCode,
    /// Order lines to write.
    pub lines: Vec<NewOrderLine>,
    /// Cart units the charge paid for.
    pub cart_lines: Vec<CartClaim>,
    /// Set once an order exists for the charge.
    pub order_id: Option<OrderId>,
    /// Error that interrupted checkout.
    pub reason: String,
    pub status: ReconciliationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Data needed to park a failed checkout.
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    pub user_id: UserId,
    pub charge_id: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub lines: Vec<NewOrderLine>,
    pub cart_lines: Vec<CartClaim>,
    pub order_id: Option<OrderId>,
    pub reason: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips() {
        for status in [ReconciliationStatus::Pending, ReconciliationStatus::Resolved] {
            assert_eq!(status.as_str().parse::<ReconciliationStatus>().unwrap(), status);
        }
        assert!("done".parse::<ReconciliationStatus>().is_err());
    }
}
