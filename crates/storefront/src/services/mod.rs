//! Business logic services for storefront.

pub mod auth;
pub mod email;
