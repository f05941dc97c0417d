//! Sick Fits Core - Shared domain types.
//!
//! This crate provides the types shared by every Sick Fits component:
//! - `shop` - Cart, checkout, account and catalog operations
//! - `cli` - Operator tooling (migrations, permission grants, reconciliation)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encodings are available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, and permissions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
