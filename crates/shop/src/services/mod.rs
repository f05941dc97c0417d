//! Shop operations.
//!
//! Each service borrows the [`crate::Shop`] it was handed out by and takes
//! the request's [`crate::Caller`] (if any) as its first argument.

pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod credentials;
pub mod guard;
pub mod orders;

#[cfg(test)]
pub(crate) mod test_support;
