//! `bandportal-core`: shared primitives for the portal crates.
//!
//! This crate contains **pure** building blocks (no IO, no transport).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
