//! # claimcheck-verify
//!
//! Claim extraction and verification for claimcheck.
//!
//! This crate provides:
//! - [`ClaimExtractor`]: fixed claim patterns over documentation text
//! - [`ClaimVerifier`]: per-kind checks against the filesystem and live page
//! - [`PageMap`]: which route a documentation file describes

mod extract;
mod pages;
mod verifier;

pub use extract::ClaimExtractor;
pub use pages::PageMap;
pub use verifier::ClaimVerifier;
