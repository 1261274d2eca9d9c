//! Unified error types for claimcheck

use thiserror::Error;

/// Unified error type for all claimcheck operations
///
/// Only precondition failures (credentials, session, configuration, I/O)
/// are expected to reach the process boundary. Verification mismatches are
/// never errors: they travel as `VerificationResult { verified: false, .. }`.
#[derive(Error, Debug)]
pub enum ClaimcheckError {
    // Session errors
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Session unresolved: {0}")]
    SessionUnresolved(String),

    // Navigation errors
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    // Page driver errors
    #[error("Browser error: {0}")]
    Driver(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using ClaimcheckError
pub type Result<T> = std::result::Result<T, ClaimcheckError>;
