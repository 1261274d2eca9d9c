//! Browser error types - re-exports the unified ClaimcheckError from claimcheck-core
//!
//! Driver failures map onto two variants:
//! - Driver(String) - launch, navigation, CDP, and screenshot failures
//! - ElementNotFound { selector } - selector waits and click targets that never matched
//!
//! Messages keep the driver's own wording so timeouts stay recognizable.

pub use claimcheck_core::{ClaimcheckError, Result};

pub type BrowserError = ClaimcheckError;
