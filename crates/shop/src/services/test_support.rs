//! Shared fixtures for service unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use sick_fits_core::{Email, Money, Permission, PermissionSet};

use crate::config::ShopSettings;
use crate::context::Caller;
use crate::db::{CatalogStore, MemoryStore, UserStore};
use crate::mail::RecordingMailer;
use crate::models::{Item, NewItem, NewUser};
use crate::payment::ScriptedProcessor;
use crate::state::Shop;

pub struct Fixture {
    pub shop: Shop,
    pub store: Arc<MemoryStore>,
    pub payment: Arc<ScriptedProcessor>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn settings() -> ShopSettings {
    ShopSettings::new(
        SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
        Url::parse("http://localhost:7777").unwrap(),
    )
    .with_payment_timeout(Duration::from_millis(200))
}

pub fn fixture() -> Fixture {
    fixture_with(ScriptedProcessor::approving(), RecordingMailer::new())
}

pub fn fixture_with(payment: ScriptedProcessor, mailer: RecordingMailer) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let payment = Arc::new(payment);
    let mailer = Arc::new(mailer);
    let shop = Shop::new(settings(), store.clone(), payment.clone(), mailer.clone());
    Fixture {
        shop,
        store,
        payment,
        mailer,
    }
}

impl Fixture {
    pub async fn user(&self, email: &str, permissions: &[Permission]) -> Caller {
        let user = self
            .store
            .create_user(NewUser {
                name: email.to_string(),
                email: Email::parse(email).unwrap(),
                password_hash: "unused".to_string(),
                permissions: permissions.iter().copied().collect::<PermissionSet>(),
            })
            .await
            .unwrap();
        Caller::from_user(&user)
    }

    pub async fn item(&self, owner: &Caller, title: &str, price: i64) -> Item {
        self.store
            .create_item(
                owner.user_id,
                NewItem {
                    title: title.to_string(),
                    description: format!("{title} description"),
                    image: None,
                    large_image: None,
                    price: Money::from_minor(price),
                },
            )
            .await
            .unwrap()
    }
}
