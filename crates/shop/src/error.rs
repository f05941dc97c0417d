//! Unified error handling with Sentry integration.
//!
//! Every shop operation returns [`Result<T>`]. Transports map errors through
//! [`ShopError::kind`] and call [`ShopError::report`] so server-side failures
//! reach Sentry before the response goes out.

use sick_fits_core::{EmailError, Money, OrderId};
use thiserror::Error;
use uuid::Uuid;

use crate::db::RepositoryError;
use crate::mail::MailError;
use crate::services::credentials::CredentialError;

/// Input rejected before any state change.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Checkout attempted with no cart lines.
    #[error("your cart is empty")]
    EmptyCart,

    /// Cart total does not fit in 64 bits of minor units.
    #[error("cart total is too large")]
    TotalOverflow,

    /// Password and confirmation differ.
    #[error("your passwords don't match")]
    PasswordMismatch,

    /// Password fails the strength rules.
    #[error("{0}")]
    WeakPassword(String),

    /// Email address could not be parsed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// An account already uses this email.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// Permission updates must leave at least one permission.
    #[error("at least one permission is required")]
    EmptyPermissions,

    /// Item fields are out of range.
    #[error("invalid item: {0}")]
    InvalidItem(String),
}

/// Shop-level error type.
#[derive(Debug, Error)]
pub enum ShopError {
    /// No caller identity on the request.
    #[error("you must be logged in to do that")]
    Unauthenticated,

    /// Caller is signed in but neither owns the resource nor holds a
    /// required permission.
    #[error("you don't have permission to do that")]
    Forbidden,

    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input rejected.
    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),

    /// Password reset token unknown, used, or older than one hour.
    #[error("this reset token is either invalid or expired")]
    InvalidOrExpiredToken,

    /// The payment processor declined or rejected the charge. Nothing was
    /// captured.
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// The charge outcome is not known. Retrying with the same idempotency
    /// key is safe.
    #[error("payment status unknown (idempotency key {idempotency_key})")]
    PaymentStatusUnknown {
        /// Key sent with the charge request.
        idempotency_key: Uuid,
    },

    /// Money was captured but the order or cart update did not persist.
    #[error("payment {charge_id} captured but the order was not completed: {reason}")]
    PostPaymentPersistenceFailure {
        /// Processor charge reference.
        charge_id: String,
        /// Confirmed amount.
        amount: Money,
        /// Order created before the failure, if any.
        order_id: Option<OrderId>,
        /// What went wrong.
        reason: String,
    },

    /// Outgoing mail could not be delivered.
    #[error("mail delivery failed: {0}")]
    DeliveryFailed(#[from] MailError),

    /// Persistence layer failure.
    #[error("store error: {0}")]
    Store(RepositoryError),

    /// Hashing or token signing failure.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

impl From<RepositoryError> for ShopError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Store(other),
        }
    }
}

impl From<EmailError> for ShopError {
    fn from(err: EmailError) -> Self {
        Self::ValidationFailed(ValidationError::InvalidEmail(err))
    }
}

/// Stable error code for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    ValidationFailed,
    InvalidOrExpiredToken,
    PaymentFailed,
    PaymentStatusUnknown,
    PostPaymentPersistenceFailure,
    DeliveryFailed,
    Internal,
}

impl ErrorKind {
    /// Upper snake case code, e.g. `UNAUTHENTICATED`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::PaymentStatusUnknown => "PAYMENT_STATUS_UNKNOWN",
            Self::PostPaymentPersistenceFailure => "POST_PAYMENT_PERSISTENCE_FAILURE",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ShopError {
    /// Error code for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::InvalidOrExpiredToken => ErrorKind::InvalidOrExpiredToken,
            Self::PaymentFailed(_) => ErrorKind::PaymentFailed,
            Self::PaymentStatusUnknown { .. } => ErrorKind::PaymentStatusUnknown,
            Self::PostPaymentPersistenceFailure { .. } => ErrorKind::PostPaymentPersistenceFailure,
            Self::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            Self::Store(_) | Self::Credential(_) => ErrorKind::Internal,
        }
    }

    /// Whether the failure is on our side and should be captured to Sentry.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_)
                | Self::Credential(_)
                | Self::DeliveryFailed(_)
                | Self::PaymentStatusUnknown { .. }
                | Self::PostPaymentPersistenceFailure { .. }
        )
    }

    /// Whether the customer's money was taken even though the operation failed.
    #[must_use]
    pub const fn payment_captured(&self) -> bool {
        matches!(self, Self::PostPaymentPersistenceFailure { .. })
    }

    /// Capture server errors to Sentry and log them.
    ///
    /// Client errors are ignored. Returns `self` so callers can write
    /// `Err(err.report())`.
    #[must_use]
    pub fn report(self) -> Self {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                kind = %self.kind(),
                sentry_event_id = %event_id,
                "Shop operation failed"
            );
        }
        self
    }
}

/// Result type alias for `ShopError`.
pub type Result<T> = std::result::Result<T, ShopError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shop action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Charge confirmed", Some(&[("charge_id", "ch_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
