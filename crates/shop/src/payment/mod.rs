//! Payment processor capability.
//!
//! Checkout charges through [`PaymentProcessor`]. The outcome is one of three
//! things: the processor confirmed a charge, it definitely did not take money
//! ([`PaymentError::Declined`], [`PaymentError::Failed`]), or nobody knows
//! ([`PaymentError::StatusUnknown`]). Only the last one may be retried, with
//! the same idempotency key.

pub mod stripe;

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use sick_fits_core::{CurrencyCode, Money};

/// A request to capture money from a tokenized card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in minor units.
    pub amount: Money,
    pub currency: CurrencyCode,
    /// Card token from the client-side checkout form.
    pub token: String,
    /// Sent to the processor so a retried request cannot charge twice.
    pub idempotency_key: Uuid,
}

/// A confirmed charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    /// Processor reference, e.g. `ch_...`.
    pub id: String,
    /// Amount the processor says it captured.
    pub amount: Money,
}

/// Errors returned by a payment processor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The card was declined.
    #[error("card declined: {0}")]
    Declined(String),

    /// The request was rejected before any money moved.
    #[error("charge rejected: {0}")]
    Failed(String),

    /// The request may or may not have been processed.
    #[error("charge outcome unknown: {0}")]
    StatusUnknown(String),
}

/// Something that can charge a card.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge the card.
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError>;
}

/// Processor used when no payment credentials are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledProcessor;

#[async_trait]
impl PaymentProcessor for DisabledProcessor {
    async fn charge(&self, _request: &ChargeRequest) -> Result<Charge, PaymentError> {
        Err(PaymentError::Failed("payments are not configured".to_string()))
    }
}

#[derive(Debug, Clone)]
enum Script {
    Approve,
    Confirm(Money),
    Decline(String),
    Unknown,
    Hang,
}

/// Processor with a fixed outcome, for tests and local development.
///
/// Records every request it receives.
#[derive(Debug)]
pub struct ScriptedProcessor {
    script: Script,
    requests: Mutex<Vec<ChargeRequest>>,
    charges: AtomicUsize,
}

impl ScriptedProcessor {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
            charges: AtomicUsize::new(0),
        }
    }

    /// Confirm every charge for the requested amount.
    #[must_use]
    pub fn approving() -> Self {
        Self::with_script(Script::Approve)
    }

    /// Confirm every charge, reporting `amount` as captured.
    #[must_use]
    pub fn confirming(amount: Money) -> Self {
        Self::with_script(Script::Confirm(amount))
    }

    /// Decline every charge.
    #[must_use]
    pub fn declining(message: &str) -> Self {
        Self::with_script(Script::Decline(message.to_string()))
    }

    /// Fail every charge with an unknown outcome.
    #[must_use]
    pub fn unknown() -> Self {
        Self::with_script(Script::Unknown)
    }

    /// Never answer.
    #[must_use]
    pub fn hanging() -> Self {
        Self::with_script(Script::Hang)
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        self.requests.lock().await.push(request.clone());
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.script {
            Script::Approve => Ok(Charge {
                id: format!("ch_test_{n}"),
                amount: request.amount,
            }),
            Script::Confirm(amount) => Ok(Charge {
                id: format!("ch_test_{n}"),
                amount: *amount,
            }),
            Script::Decline(message) => Err(PaymentError::Declined(message.clone())),
            Script::Unknown => Err(PaymentError::StatusUnknown(
                "connection reset".to_string(),
            )),
            Script::Hang => std::future::pending().await,
        }
    }
}
