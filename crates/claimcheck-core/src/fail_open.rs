//! Best-effort side work that must not change a verdict
//!
//! A diagnostic screenshot that cannot be written is worth a warning, not a
//! failed run. Login, session discovery, and the checks themselves never go
//! through here.

use std::fmt::Display;
use std::future::Future;
use tracing::warn;

use crate::Result;

/// Run `f`, logging and swallowing its error
///
/// `subject` names what the operation acted on (a path, a URL) and only
/// appears in the warning.
///
/// ```no_run
/// use claimcheck_core::fail_open::fail_open;
/// use claimcheck_core::Result;
///
/// async fn capture() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let captured = fail_open("diagnostic_screenshot", "shot.png", capture).await;
///     assert!(captured.is_some());
/// }
/// ```
pub async fn fail_open<S, F, Fut, T>(operation: &str, subject: S, f: F) -> Option<T>
where
    S: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    f().await
        .map_err(|e| warn!("{} for {} skipped: {}", operation, subject, e))
        .ok()
}
