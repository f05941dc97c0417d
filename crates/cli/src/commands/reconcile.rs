//! Checkout reconciliation commands.
//!
//! When a card is charged but the order or cart update fails, checkout parks
//! the charge in the reconciliation queue. These commands list the queue and
//! replay entries once the database is healthy again. Replaying is safe to
//! repeat: an order that already exists for the charge is reused.
//!
//! # Usage
//!
//! ```bash
//! sf-cli reconcile list
//! sf-cli reconcile run --id 42
//! sf-cli reconcile run
//! ```

use tracing::{error, info, warn};

use sick_fits_core::ReconciliationId;

use super::{CliError, connect};

/// Log every unresolved entry.
///
/// # Errors
///
/// Returns an error if configuration is missing or the queue cannot be read.
pub async fn list() -> Result<(), CliError> {
    let shop = connect().await?;
    let pending = shop.checkout().pending_reconciliations().await?;

    if pending.is_empty() {
        info!("No pending reconciliations");
        return Ok(());
    }

    warn!(count = pending.len(), "Pending reconciliations");
    for entry in &pending {
        info!(
            id = %entry.id,
            user_id = %entry.user_id,
            charge_id = %entry.charge_id,
            amount = %entry.amount.display(entry.currency),
            order_id = ?entry.order_id,
            created_at = %entry.created_at,
            reason = %entry.reason,
            "Pending reconciliation"
        );
    }
    Ok(())
}

/// Resolve one entry.
///
/// # Errors
///
/// Returns an error if the entry does not exist or a write fails.
pub async fn run_one(id: i32) -> Result<(), CliError> {
    let shop = connect().await?;
    let order = shop.checkout().reconcile(ReconciliationId::new(id)).await?;

    info!(
        reconciliation_id = id,
        order_id = %order.id,
        charge_id = %order.charge_id,
        "Reconciled"
    );
    Ok(())
}

/// Resolve every pending entry, continuing past failures.
///
/// # Errors
///
/// Returns `CliError::ReconcileFailed` if any entry could not be resolved.
pub async fn run_all() -> Result<(), CliError> {
    let shop = connect().await?;
    let checkout = shop.checkout();
    let pending = checkout.pending_reconciliations().await?;
    let total = pending.len();

    let mut failed = 0usize;
    for entry in pending {
        match checkout.reconcile(entry.id).await {
            Ok(order) => info!(
                reconciliation_id = %entry.id,
                order_id = %order.id,
                charge_id = %entry.charge_id,
                "Reconciled"
            ),
            Err(err) => {
                failed += 1;
                error!(
                    reconciliation_id = %entry.id,
                    charge_id = %entry.charge_id,
                    error = %err,
                    "Reconciliation failed"
                );
            }
        }
    }

    info!(total, resolved = total - failed, "Reconciliation run complete");
    if failed > 0 {
        return Err(CliError::ReconcileFailed { failed, total });
    }
    Ok(())
}
