//! Integration test harness for Sick Fits.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p sick-fits-integration-tests
//!
//! # Postgres-backed tests (migrations are applied automatically)
//! TEST_DATABASE_URL=postgres://localhost/sick_fits_test \
//!     cargo test -p sick-fits-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_workflow` - Cart merge, ownership, concurrent adds
//! - `checkout_saga` - Charge, order and cart cleanup, failure handling
//! - `accounts` - Signup, signin, password reset
//! - `authorization` - Permission and ownership rules across operations
//! - `postgres_store` - The same guarantees against a real database

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use sick_fits_core::{Email, Money, Permission, PermissionSet};
use sick_fits_shop::config::ShopSettings;
use sick_fits_shop::db::{self, MemoryStore, PgStore, Store, UserStore};
use sick_fits_shop::mail::RecordingMailer;
use sick_fits_shop::models::{Item, NewItem, NewUser};
use sick_fits_shop::payment::ScriptedProcessor;
use sick_fits_shop::{Caller, Shop};

/// Signing secret that passes the config strength checks.
pub const TEST_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

/// Frontend URL used in reset links.
pub const TEST_FRONTEND_URL: &str = "http://localhost:7777";

/// Settings with a short payment timeout.
#[must_use]
pub fn test_settings(payment_timeout: Duration) -> ShopSettings {
    ShopSettings::new(
        SecretString::from(TEST_SECRET),
        Url::parse(TEST_FRONTEND_URL).unwrap(),
    )
    .with_payment_timeout(payment_timeout)
}

/// A shop over in-memory collaborators, with handles to inspect them.
pub struct TestShop<S: Store + 'static = MemoryStore> {
    pub shop: Shop,
    pub store: Arc<S>,
    pub payment: Arc<ScriptedProcessor>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestShop<MemoryStore> {
    /// Memory store, approving processor, recording mailer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_processor(ScriptedProcessor::approving())
    }

    #[must_use]
    pub fn with_processor(payment: ScriptedProcessor) -> Self {
        Self::build(
            Arc::new(MemoryStore::new()),
            payment,
            RecordingMailer::new(),
            Duration::from_millis(250),
        )
    }

    #[must_use]
    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::build(
            Arc::new(MemoryStore::new()),
            ScriptedProcessor::approving(),
            mailer,
            Duration::from_millis(250),
        )
    }
}

impl Default for TestShop<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store + 'static> TestShop<S> {
    /// Assemble from parts.
    pub fn build(
        store: Arc<S>,
        payment: ScriptedProcessor,
        mailer: RecordingMailer,
        payment_timeout: Duration,
    ) -> Self {
        let payment = Arc::new(payment);
        let mailer = Arc::new(mailer);
        let shop = Shop::new(
            test_settings(payment_timeout),
            store.clone(),
            payment.clone(),
            mailer.clone(),
        );
        Self {
            shop,
            store,
            payment,
            mailer,
        }
    }

    /// Insert a user directly, bypassing password hashing.
    pub async fn user(&self, email: &str, permissions: &[Permission]) -> Caller {
        let user = self
            .store
            .create_user(NewUser {
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: "not-a-real-hash".to_string(),
                permissions: permissions.iter().copied().collect::<PermissionSet>(),
            })
            .await
            .unwrap();
        Caller::from_user(&user)
    }

    /// List an item for sale through the catalog service.
    pub async fn item(&self, seller: &Caller, title: &str, price: i64) -> Item {
        self.shop
            .catalog()
            .create_item(
                Some(seller),
                NewItem {
                    title: title.to_string(),
                    description: format!("A very nice {title}"),
                    image: Some(format!("https://images.example.com/{title}.jpg")),
                    large_image: None,
                    price: Money::from_minor(price),
                },
            )
            .await
            .unwrap()
    }
}

/// Connect to `TEST_DATABASE_URL` and apply migrations.
///
/// Returns `None` when the variable is not set.
pub async fn pg_store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../shop/migrations").run(&pool).await.unwrap();
    Some(PgStore::new(pool))
}

/// An email no other test run has used.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", uuid::Uuid::new_v4().simple())
}
