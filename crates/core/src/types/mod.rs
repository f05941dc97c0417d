//! Core types for Sick Fits.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod permission;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, CurrencyError, Money};
pub use permission::{Permission, PermissionError, PermissionSet};
