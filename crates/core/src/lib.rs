//! Shared domain types for the Copperleaf storefront.
//!
//! This crate contains the validated value types used by the storefront
//! server: usernames, email addresses, and account IDs. Everything here is
//! pure — no I/O, no async, no database coupling.

#![cfg_attr(not(test), forbid(unsafe_code))]

mod types;

pub use types::email::{Email, EmailError, mask_email};
pub use types::id::UserId;
pub use types::username::{Username, UsernameError};
