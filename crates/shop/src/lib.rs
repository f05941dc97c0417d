//! Sick Fits shop library.
//!
//! Turns per-user shopping carts into paid, immutable orders and gates every
//! sensitive operation behind the permission/ownership guard. The transport
//! layer (HTTP, GraphQL, cookies) lives outside this crate: callers resolve a
//! [`Caller`] from the session token with [`Shop::resolve_caller`] and invoke
//! the operations on the services handed out by [`Shop`].
//!
//! # Collaborators
//!
//! - [`db::Store`] - transactional persistence ([`db::PgStore`], [`db::MemoryStore`])
//! - [`payment::PaymentProcessor`] - card charges ([`payment::stripe::StripeClient`])
//! - [`mail::Mailer`] - password reset mail ([`mail::smtp::SmtpMailer`])

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod payment;
pub mod services;
pub mod state;

pub use context::Caller;
pub use error::{ErrorKind, Result, ShopError, ValidationError};
pub use state::Shop;
