//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] - message timeline invariant violations
//! - [`string`] - title derivation helpers

pub mod error;
pub mod string;
