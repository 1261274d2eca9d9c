//! # claimcheck-core
//!
//! Core types for the claimcheck documentation verification system.
//!
//! Documentation makes claims about a live application: a screenshot exists,
//! a route renders, a button carries a given label. This crate holds the
//! vocabulary every other claimcheck crate speaks:
//!
//! - Claims are extracted from prose and verified one at a time
//! - A resolved [`Session`] scopes every navigable URL
//! - Navigation reports its outcome as data, never as an error
//! - Failed verifications are classified, not thrown

pub mod artifacts;
pub mod config;
mod error;
pub mod fail_open;
mod types;

pub use artifacts::{slugify, ArtifactKind, ArtifactStore};
pub use config::ClaimcheckConfig;
pub use error::{ClaimcheckError, Result};
pub use types::*;
