//! The shop handle passed to every operation.

use std::sync::Arc;

use crate::config::{ShopConfig, ShopSettings};
use crate::context::Caller;
use crate::db::{self, PgStore, Store};
use crate::error::Result;
use crate::mail::smtp::SmtpMailer;
use crate::mail::{LogMailer, Mailer};
use crate::payment::stripe::{StripeClient, StripeError};
use crate::payment::{DisabledProcessor, PaymentProcessor};
use crate::services::accounts::AccountService;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::checkout::CheckoutService;
use crate::services::credentials::SessionKeys;
use crate::services::orders::OrderService;

/// Error wiring up the production collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("payment client error: {0}")]
    Payment(#[from] StripeError),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Store, payment processor, mailer and settings for one shop.
///
/// This struct is cheaply cloneable via `Arc`. Transports hold one and hand
/// it to each request; nothing in the crate keeps a global.
#[derive(Clone)]
pub struct Shop {
    inner: Arc<ShopInner>,
}

struct ShopInner {
    settings: ShopSettings,
    store: Arc<dyn Store>,
    payment: Arc<dyn PaymentProcessor>,
    mailer: Arc<dyn Mailer>,
    sessions: SessionKeys,
}

impl std::fmt::Debug for Shop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shop")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Shop {
    /// Assemble a shop from its collaborators.
    #[must_use]
    pub fn new(
        settings: ShopSettings,
        store: Arc<dyn Store>,
        payment: Arc<dyn PaymentProcessor>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let sessions = SessionKeys::from_secret(&settings.app_secret);
        Self {
            inner: Arc::new(ShopInner {
                settings,
                store,
                payment,
                mailer,
                sessions,
            }),
        }
    }

    /// Connect to Postgres and build the configured payment and mail clients.
    ///
    /// Without Stripe credentials checkout fails with `PaymentFailed`;
    /// without SMTP settings reset mail is only logged.
    ///
    /// # Errors
    ///
    /// Returns `SetupError` if the pool cannot connect or a client fails to
    /// build.
    pub async fn connect(config: &ShopConfig) -> std::result::Result<Self, SetupError> {
        let pool = db::create_pool(&config.database_url).await?;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

        let payment: Arc<dyn PaymentProcessor> = match &config.stripe {
            Some(stripe) => Arc::new(StripeClient::new(stripe)?),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, checkout is disabled");
                Arc::new(DisabledProcessor)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => Arc::new(LogMailer),
        };

        Ok(Self::new(config.settings.clone(), store, payment, mailer))
    }

    /// Get a reference to the shop settings.
    #[must_use]
    pub fn settings(&self) -> &ShopSettings {
        &self.inner.settings
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub(crate) fn payment(&self) -> &dyn PaymentProcessor {
        self.inner.payment.as_ref()
    }

    pub(crate) fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    pub(crate) fn sessions(&self) -> &SessionKeys {
        &self.inner.sessions
    }

    /// Signup, signin and account administration.
    #[must_use]
    pub const fn accounts(&self) -> AccountService<'_> {
        AccountService::new(self)
    }

    /// Cart operations.
    #[must_use]
    pub const fn cart(&self) -> CartService<'_> {
        CartService::new(self)
    }

    /// Checkout and reconciliation.
    #[must_use]
    pub const fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self)
    }

    /// Catalog writes and the public read proxy.
    #[must_use]
    pub const fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self)
    }

    /// Order queries.
    #[must_use]
    pub const fn orders(&self) -> OrderService<'_> {
        OrderService::new(self)
    }

    /// Turn a session token into a caller.
    ///
    /// A missing or invalid token, or one naming a user that no longer
    /// exists, yields `None`. Permissions are read fresh from the store.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Store` if the user lookup fails.
    pub async fn resolve_caller(&self, token: Option<&str>) -> Result<Option<Caller>> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let user_id = match self.sessions().verify(token) {
            Ok(user_id) => user_id,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring invalid session token");
                return Ok(None);
            }
        };

        let user = self.store().get_user(user_id).await?;
        Ok(user.as_ref().map(Caller::from_user))
    }
}
