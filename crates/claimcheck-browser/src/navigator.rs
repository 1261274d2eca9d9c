//! Resilient navigation: retry, settling, and global-error detection
//!
//! Each `goto_route` call runs a small state machine:
//!
//! ```text
//! Attempting(n) --loaded--------------------> Settled
//! Attempting(n) --failed/banner, n < max----> Retrying(n+1) --backoff--> Attempting(n+1)
//! Attempting(n) --failed/banner, n == max---> GaveUp
//! Attempting(n) --logged out----------------> GaveUp
//! ```
//!
//! [`transition`] is pure; all I/O lives in [`ResilientNavigator`].

use crate::driver::PageDriver;
use crate::error::{ClaimcheckError, Result};
use crate::probe;
use claimcheck_core::config::NavigationConfig;
use claimcheck_core::fail_open::fail_open;
use claimcheck_core::{ArtifactKind, ArtifactStore, NavigationErrorKind, NavigationOutcome, Session};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Per-call navigation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GotoOptions {
    /// Retries after the first attempt
    pub retries: u32,
    pub timeout: Duration,
}

impl GotoOptions {
    pub fn from_config(config: &NavigationConfig) -> Self {
        Self {
            retries: config.retries,
            timeout: config.timeout(),
        }
    }
}

/// Why one attempt did not settle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub kind: NavigationErrorKind,
    pub message: Option<String>,
}

/// Navigation state for one `goto_route` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Attempting { attempt: u32 },
    Retrying { next_attempt: u32, last: AttemptFailure },
    Settled { attempts: u32 },
    GaveUp { attempts: u32, failure: AttemptFailure },
}

impl NavState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled { .. } | Self::GaveUp { .. })
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Attempting { attempt } => *attempt,
            Self::Retrying { next_attempt, .. } => next_attempt.saturating_sub(1),
            Self::Settled { attempts } | Self::GaveUp { attempts, .. } => *attempts,
        }
    }
}

/// Observations that drive the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEvent {
    /// Page settled with no error phrase and no login form
    Loaded,
    /// The driver's navigate call failed
    NavigateFailed(AttemptFailure),
    /// A global error phrase is visible
    ErrorBanner { phrase: String },
    /// A login form is visible; the session is gone
    LoggedOut,
    BackoffElapsed,
}

fn retry_or_give_up(attempt: u32, max_attempts: u32, failure: AttemptFailure) -> NavState {
    if attempt < max_attempts {
        NavState::Retrying {
            next_attempt: attempt + 1,
            last: failure,
        }
    } else {
        NavState::GaveUp {
            attempts: attempt,
            failure,
        }
    }
}

/// Pure state transition function
///
/// `max_attempts` counts the first attempt, so `retries = 0` means
/// `max_attempts = 1`. Invalid transitions end in `GaveUp` with
/// `Unknown`; this function never panics.
pub fn transition(state: NavState, event: AttemptEvent, max_attempts: u32) -> NavState {
    match (state, event) {
        (NavState::Attempting { attempt }, AttemptEvent::Loaded) => {
            NavState::Settled { attempts: attempt }
        }

        (NavState::Attempting { attempt }, AttemptEvent::NavigateFailed(failure)) => {
            retry_or_give_up(attempt, max_attempts, failure)
        }

        (NavState::Attempting { attempt }, AttemptEvent::ErrorBanner { phrase }) => retry_or_give_up(
            attempt,
            max_attempts,
            AttemptFailure {
                kind: NavigationErrorKind::GlobalErrorBanner,
                message: Some(phrase),
            },
        ),

        // Retrying cannot repair a lost session
        (NavState::Attempting { attempt }, AttemptEvent::LoggedOut) => NavState::GaveUp {
            attempts: attempt,
            failure: AttemptFailure {
                kind: NavigationErrorKind::LoggedOut,
                message: Some("login form visible".to_string()),
            },
        },

        (NavState::Retrying { next_attempt, .. }, AttemptEvent::BackoffElapsed) => {
            NavState::Attempting {
                attempt: next_attempt,
            }
        }

        (state, event) => NavState::GaveUp {
            attempts: state.attempts(),
            failure: AttemptFailure {
                kind: NavigationErrorKind::Unknown,
                message: Some(format!(
                    "Invalid navigation transition: {:?} cannot handle {:?}",
                    state, event
                )),
            },
        },
    }
}

/// Map a driver error message onto a navigation error kind
pub fn kind_for_driver_error(message: &str) -> NavigationErrorKind {
    let lower = message.to_lowercase();
    // headless_chrome reports its own timeouts as "The event waited for never came"
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("never came") {
        NavigationErrorKind::Timeout
    } else {
        NavigationErrorKind::Unknown
    }
}

/// Reject route strings no navigation could be built from
pub fn validate_route(route: &str) -> Result<()> {
    let problem = if !route.starts_with('/') {
        Some("must start with '/'")
    } else if route.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if route.contains("://") {
        Some("must be a path, not a URL")
    } else if route.split('/').any(|segment| segment == "..") {
        Some("must not contain '..' segments")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(ClaimcheckError::InvalidRoute(format!("{:?} {}", route, problem))),
        None => Ok(()),
    }
}

/// Navigation wrapper that turns an unreliable page into settled outcomes
pub struct ResilientNavigator<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    config: NavigationConfig,
    /// A visible password input means the session was lost
    password_selectors: Vec<String>,
    /// Only count inside a form that also holds a password input
    email_selectors: Vec<String>,
    artifacts: Option<ArtifactStore>,
}

impl<'a, D: PageDriver + ?Sized> ResilientNavigator<'a, D> {
    pub fn new(driver: &'a D, config: NavigationConfig) -> Self {
        Self {
            driver,
            config,
            password_selectors: vec!["input[type=\"password\"]".to_string()],
            email_selectors: vec!["input[type=\"email\"]".to_string()],
            artifacts: None,
        }
    }

    /// Selectors of the login form inputs that mark a lost session
    pub fn with_login_inputs(mut self, password: Vec<String>, email: Vec<String>) -> Self {
        self.password_selectors = password;
        self.email_selectors = email;
        self
    }

    /// Capture a screenshot into `store` whenever an attempt fails to navigate
    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn driver(&self) -> &'a D {
        self.driver
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn default_options(&self) -> GotoOptions {
        GotoOptions::from_config(&self.config)
    }

    /// Navigate to a workspace-scoped route and settle the page
    ///
    /// Remote failures are reported in the outcome; only an invalid route
    /// shape is an error.
    #[instrument(skip(self, session, options), fields(session = %session.session_id))]
    pub async fn goto_route(
        &self,
        session: &Session,
        route: &str,
        options: GotoOptions,
    ) -> Result<NavigationOutcome> {
        validate_route(route)?;

        let url = session.url_for(route);
        let max_attempts = options.retries.saturating_add(1);
        let mut artifact: Option<PathBuf> = None;
        let mut state = NavState::Attempting { attempt: 1 };

        loop {
            state = match &state {
                NavState::Attempting { attempt } => {
                    let event = self
                        .attempt(&url, *attempt, options.timeout, &mut artifact)
                        .await;
                    transition(state.clone(), event, max_attempts)
                }
                NavState::Retrying { next_attempt, last } => {
                    let failed = next_attempt.saturating_sub(1);
                    let delay = self.config.backoff_for(failed);
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        failed,
                        max_attempts,
                        url,
                        last.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    transition(state.clone(), AttemptEvent::BackoffElapsed, max_attempts)
                }
                NavState::Settled { attempts } => {
                    let final_url = self.current_url_or(&url).await;
                    info!("Settled on {} after {} attempt(s)", final_url, attempts);
                    return Ok(NavigationOutcome::settled(final_url, *attempts));
                }
                NavState::GaveUp { attempts, failure } => {
                    let final_url = self.current_url_or(&url).await;
                    warn!(
                        "Gave up on {} after {} attempt(s): {}",
                        url, attempts, failure.kind
                    );
                    let mut outcome = NavigationOutcome::gave_up(
                        final_url,
                        failure.kind,
                        *attempts,
                        failure.message.clone(),
                    );
                    outcome.artifact = artifact;
                    return Ok(outcome);
                }
            };
        }
    }

    /// Reload a page's primary route with the default options
    pub async fn restore(&self, session: &Session, route: &str) -> Result<NavigationOutcome> {
        debug!("Restoring navigation context {}", route);
        self.goto_route(session, route, self.default_options()).await
    }

    async fn attempt(
        &self,
        url: &str,
        attempt: u32,
        timeout: Duration,
        artifact: &mut Option<PathBuf>,
    ) -> AttemptEvent {
        debug!("Navigating to {} (attempt {})", url, attempt);

        if let Err(e) = self.driver.navigate(url, timeout).await {
            let message = e.to_string();
            if let Some(path) = self.capture_diagnostic(url, attempt).await {
                *artifact = Some(path);
            }
            return AttemptEvent::NavigateFailed(AttemptFailure {
                kind: kind_for_driver_error(&message),
                message: Some(message),
            });
        }

        self.settle().await;
        self.inspect().await
    }

    /// Wait for network quiescence, then for loaders to disappear
    ///
    /// Both waits are best-effort: long-lived connections keep the network
    /// busy and many pages have no loader at all.
    async fn settle(&self) {
        if !self.wait_for_quiescence().await {
            debug!("Network did not go quiet within {}ms", self.config.quiescence_timeout_ms);
        }
        if let Some(loader) = self.wait_for_loaders().await {
            warn!(
                "Loader {} still visible after {}ms, continuing",
                loader, self.config.loader_timeout_ms
            );
        }
    }

    async fn wait_for_quiescence(&self) -> bool {
        let deadline = Instant::now() + Duration::from_millis(self.config.quiescence_timeout_ms);
        let poll = Duration::from_millis(self.config.quiescence_poll_ms);
        let mut previous = probe::resource_count(self.driver).await.ok().flatten();

        loop {
            tokio::time::sleep(poll).await;
            let current = probe::resource_count(self.driver).await.ok().flatten();
            if current == previous {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            previous = current;
        }
    }

    /// Returns the loader still visible when the wait ran out
    async fn wait_for_loaders(&self) -> Option<String> {
        let deadline = Instant::now() + Duration::from_millis(self.config.loader_timeout_ms);
        let poll = Duration::from_millis(self.config.loader_poll_ms);

        loop {
            match probe::first_visible(self.driver, &self.config.loader_selectors).await {
                Ok(None) => return None,
                Ok(Some(loader)) => {
                    if Instant::now() >= deadline {
                        return Some(loader);
                    }
                    debug!("Waiting for loader {}", loader);
                }
                Err(e) => {
                    debug!("Loader probe failed: {}", e);
                    return None;
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn inspect(&self) -> AttemptEvent {
        match probe::login_form_visible(self.driver, &self.password_selectors, &self.email_selectors)
            .await
        {
            Ok(true) => return AttemptEvent::LoggedOut,
            Ok(false) => {}
            Err(e) => debug!("Login form probe failed: {}", e),
        }

        let text = match probe::visible_text(self.driver).await {
            Ok(text) => text,
            Err(e) => {
                debug!("Visible text probe failed: {}", e);
                String::new()
            }
        };

        match probe::first_phrase_in(&text, &self.config.error_phrases) {
            Some(phrase) => AttemptEvent::ErrorBanner {
                phrase: phrase.to_string(),
            },
            None => AttemptEvent::Loaded,
        }
    }

    async fn capture_diagnostic(&self, url: &str, attempt: u32) -> Option<PathBuf> {
        let store = self.artifacts.as_ref()?;
        let path = store.timestamped_path(
            ArtifactKind::Screenshot,
            &format!("{} attempt {}", url, attempt),
        );
        fail_open("diagnostic_screenshot", path.display(), || self.driver.screenshot(&path))
            .await
            .map(|_| path)
    }

    async fn current_url_or(&self, fallback: &str) -> String {
        self.driver
            .current_url()
            .await
            .unwrap_or_else(|_| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPageDriver;
    use serde_json::json;
    use tempfile::TempDir;

    const SESSION_ID: &str = "0b5e2c1a-9f0e-4c4e-8a51-3d2f6a7b8c9d";

    fn session() -> Session {
        Session::new(SESSION_ID, "https://app.test")
    }

    fn fast_config() -> NavigationConfig {
        NavigationConfig {
            backoff_step_ms: 1,
            backoff_ceiling_ms: 2,
            quiescence_timeout_ms: 5,
            quiescence_poll_ms: 1,
            loader_timeout_ms: 5,
            loader_poll_ms: 1,
            ..NavigationConfig::default()
        }
    }

    fn options(retries: u32) -> GotoOptions {
        GotoOptions {
            retries,
            timeout: Duration::from_millis(50),
        }
    }

    fn failure(kind: NavigationErrorKind) -> AttemptFailure {
        AttemptFailure { kind, message: None }
    }

    #[test]
    fn test_transition_settles_on_load() {
        let state = transition(NavState::Attempting { attempt: 1 }, AttemptEvent::Loaded, 3);
        assert_eq!(state, NavState::Settled { attempts: 1 });
        assert!(state.is_terminal());
    }

    #[test]
    fn test_transition_retries_until_max() {
        let event = AttemptEvent::NavigateFailed(failure(NavigationErrorKind::Timeout));

        let state = transition(NavState::Attempting { attempt: 1 }, event.clone(), 2);
        assert!(matches!(state, NavState::Retrying { next_attempt: 2, .. }));

        let state = transition(state, AttemptEvent::BackoffElapsed, 2);
        assert_eq!(state, NavState::Attempting { attempt: 2 });

        let state = transition(state, event, 2);
        assert!(matches!(state, NavState::GaveUp { attempts: 2, .. }));
    }

    #[test]
    fn test_transition_banner_is_soft_failure() {
        let state = transition(
            NavState::Attempting { attempt: 1 },
            AttemptEvent::ErrorBanner {
                phrase: "Something went wrong".to_string(),
            },
            2,
        );
        match state {
            NavState::Retrying { last, .. } => {
                assert_eq!(last.kind, NavigationErrorKind::GlobalErrorBanner);
                assert_eq!(last.message.as_deref(), Some("Something went wrong"));
            }
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_transition_logged_out_never_retries() {
        let state = transition(NavState::Attempting { attempt: 1 }, AttemptEvent::LoggedOut, 5);
        match state {
            NavState::GaveUp { attempts, failure } => {
                assert_eq!(attempts, 1);
                assert_eq!(failure.kind, NavigationErrorKind::LoggedOut);
            }
            other => panic!("expected give up, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_transition_never_panics() {
        let state = transition(NavState::Settled { attempts: 1 }, AttemptEvent::Loaded, 3);
        assert!(matches!(
            state,
            NavState::GaveUp {
                failure: AttemptFailure {
                    kind: NavigationErrorKind::Unknown,
                    ..
                },
                ..
            }
        ));

        let state = transition(
            NavState::Retrying {
                next_attempt: 2,
                last: failure(NavigationErrorKind::Timeout),
            },
            AttemptEvent::Loaded,
            3,
        );
        assert!(matches!(state, NavState::GaveUp { attempts: 1, .. }));
    }

    #[test]
    fn test_hand_built_retry_state_never_underflows() {
        let state = NavState::Retrying {
            next_attempt: 0,
            last: failure(NavigationErrorKind::Timeout),
        };
        assert_eq!(state.attempts(), 0);

        let state = transition(state, AttemptEvent::Loaded, 3);
        assert!(matches!(state, NavState::GaveUp { attempts: 0, .. }));
    }

    #[test]
    fn test_kind_for_driver_error() {
        assert_eq!(
            kind_for_driver_error("Navigation timeout for x: The event waited for never came"),
            NavigationErrorKind::Timeout
        );
        assert_eq!(kind_for_driver_error("Request timed out"), NavigationErrorKind::Timeout);
        assert_eq!(
            kind_for_driver_error("net::ERR_CONNECTION_REFUSED"),
            NavigationErrorKind::Unknown
        );
    }

    #[test]
    fn test_validate_route() {
        assert!(validate_route("/agents/templates").is_ok());
        assert!(validate_route("/").is_ok());
        assert!(validate_route("agents").is_err());
        assert!(validate_route("/agents list").is_err());
        assert!(validate_route("/https://evil.test").is_err());
        assert!(validate_route("/../etc").is_err());
    }

    #[tokio::test]
    async fn test_goto_route_settles() {
        let driver = MockPageDriver::new();
        let navigator = ResilientNavigator::new(&driver, fast_config());

        let outcome = navigator
            .goto_route(&session(), "/agents", options(2))
            .await
            .unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error_kind, NavigationErrorKind::None);
        assert_eq!(outcome.final_url, format!("https://app.test/{}/agents", SESSION_ID));
    }

    #[tokio::test]
    async fn test_zero_retries_makes_exactly_one_attempt() {
        let driver = MockPageDriver::new().with_navigate_always_failing("Navigation timeout");
        let navigator = ResilientNavigator::new(&driver, fast_config());

        let outcome = navigator
            .goto_route(&session(), "/agents", options(0))
            .await
            .unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.error_kind, NavigationErrorKind::Timeout);
        assert_eq!(driver.navigations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_on_success_is_one_attempt() {
        let driver = MockPageDriver::new();
        let navigator = ResilientNavigator::new(&driver, fast_config());

        navigator
            .goto_route(&session(), "/agents", options(0))
            .await
            .unwrap();
        assert_eq!(driver.navigations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let driver = MockPageDriver::new().with_navigate_failure("net::ERR_CONNECTION_RESET");
        let navigator = ResilientNavigator::new(&driver, fast_config());

        let outcome = navigator
            .goto_route(&session(), "/agents", options(2))
            .await
            .unwrap();

        assert!(outcome.ok);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(driver.navigations().await.len(), 2);
    }

    #[tokio::test]
    async fn test_persistent_banner_gives_up() {
        let driver = MockPageDriver::new()
            .with_evaluate(probe::VISIBLE_TEXT, json!("Oops. Something went wrong!"));
        let navigator = ResilientNavigator::new(&driver, fast_config());

        let outcome = navigator
            .goto_route(&session(), "/agents", options(1))
            .await
            .unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.error_kind, NavigationErrorKind::GlobalErrorBanner);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.message.as_deref(), Some("Something went wrong"));
    }

    #[tokio::test]
    async fn test_logged_out_is_not_retried() {
        let config = fast_config();
        let password = vec!["input[type=\"password\"]".to_string()];
        let email = vec!["input[name=\"email\"]".to_string()];
        let driver = MockPageDriver::new()
            .with_evaluate(&probe::login_form_script(&password, &email), json!(true));
        let navigator =
            ResilientNavigator::new(&driver, config).with_login_inputs(password, email);

        let outcome = navigator
            .goto_route(&session(), "/agents", options(3))
            .await
            .unwrap();

        assert!(!outcome.ok);
        assert_eq!(outcome.error_kind, NavigationErrorKind::LoggedOut);
        assert_eq!(driver.navigations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_email_field_on_authenticated_page_still_settles() {
        let password = vec!["input[type=\"password\"]".to_string()];
        let email = vec!["input[type=\"email\"]".to_string()];
        let members = session().url_for("/members");
        let driver = MockPageDriver::new()
            .with_page_evaluate(&members, probe::VISIBLE_TEXT, json!("Members\nInvite by email"))
            .with_page_evaluate(&members, &probe::credential_input_script(&email), json!(true))
            .with_page_evaluate(&members, &probe::login_form_script(&password, &email), json!(false));
        let navigator = ResilientNavigator::new(&driver, fast_config())
            .with_login_inputs(password.clone(), email.clone());

        let outcome = navigator
            .goto_route(&session(), "/members", options(0))
            .await
            .unwrap();

        assert!(outcome.ok, "{:?}", outcome.error_kind);
        let evaluations = driver.evaluations().await;
        assert!(evaluations.contains(&probe::login_form_script(&password, &email)));
        assert!(!evaluations.contains(&probe::credential_input_script(&email)));
    }

    #[tokio::test]
    async fn test_quiescence_waits_for_a_stable_resource_count() {
        let driver = MockPageDriver::new().with_evaluate_sequence(
            probe::RESOURCE_COUNT,
            vec![json!(4), json!(9), json!(12), json!(12)],
        );
        let config = NavigationConfig {
            quiescence_timeout_ms: 1_000,
            ..fast_config()
        };
        let navigator = ResilientNavigator::new(&driver, config);

        assert!(navigator.wait_for_quiescence().await);
        let polls = driver
            .evaluations()
            .await
            .into_iter()
            .filter(|script| script == probe::RESOURCE_COUNT)
            .count();
        assert_eq!(polls, 4);
    }

    #[tokio::test]
    async fn test_busy_network_is_not_fatal() {
        let counts = (0..10_000).map(|n| json!(n)).collect();
        let driver = MockPageDriver::new().with_evaluate_sequence(probe::RESOURCE_COUNT, counts);
        let navigator = ResilientNavigator::new(&driver, fast_config());

        assert!(!navigator.wait_for_quiescence().await);

        let outcome = navigator
            .goto_route(&session(), "/agents", options(0))
            .await
            .unwrap();
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn test_lingering_loader_is_not_fatal() {
        let config = fast_config();
        let driver = MockPageDriver::new().with_evaluate(
            &probe::first_visible_script(&config.loader_selectors),
            json!(".spinner"),
        );
        let navigator = ResilientNavigator::new(&driver, config);

        let outcome = navigator
            .goto_route(&session(), "/agents", options(0))
            .await
            .unwrap();
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn test_failed_navigation_captures_diagnostic() {
        let temp_dir = TempDir::new().unwrap();
        let driver = MockPageDriver::new().with_navigate_always_failing("boom");
        let navigator = ResilientNavigator::new(&driver, fast_config())
            .with_artifacts(ArtifactStore::new(temp_dir.path()));

        let outcome = navigator
            .goto_route(&session(), "/agents", options(1))
            .await
            .unwrap();

        assert_eq!(outcome.error_kind, NavigationErrorKind::Unknown);
        assert_eq!(driver.screenshots().await.len(), 2);
        let artifact = outcome.artifact.unwrap();
        assert!(artifact.starts_with(temp_dir.path().join("screenshots")));
    }

    #[tokio::test]
    async fn test_invalid_route_is_an_error() {
        let driver = MockPageDriver::new();
        let navigator = ResilientNavigator::new(&driver, fast_config());

        let result = navigator.goto_route(&session(), "agents", options(0)).await;
        assert!(matches!(result, Err(ClaimcheckError::InvalidRoute(_))));
        assert!(driver.navigations().await.is_empty());
    }
}
