//! Login and workspace discovery
//!
//! The target application scopes every page under a workspace id that
//! appears as the first URL path segment. [`SessionResolver`] logs in once
//! and then walks an ordered fallback chain until one strategy yields an id.

use crate::driver::{ClickTarget, PageDriver};
use crate::error::{ClaimcheckError, Result};
use crate::probe;
use claimcheck_core::config::SessionConfig;
use claimcheck_core::Session;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Length of a hyphenated workspace id
const TOKEN_LEN: usize = 36;

/// Environment variables credentials are read from
pub const EMAIL_ENV: &str = "CLAIMCHECK_EMAIL";
pub const PASSWORD_ENV: &str = "CLAIMCHECK_PASSWORD";
pub const SESSION_ID_ENV: &str = "CLAIMCHECK_SESSION_ID";

/// Login credentials
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Read credentials from `CLAIMCHECK_EMAIL` / `CLAIMCHECK_PASSWORD`
    ///
    /// Returns `None` unless both are set and non-empty.
    pub fn from_env() -> Option<Self> {
        let email = std::env::var(EMAIL_ENV).ok().filter(|v| !v.trim().is_empty())?;
        let password = std::env::var(PASSWORD_ENV).ok().filter(|v| !v.is_empty())?;
        Some(Self::new(email, password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Whether `candidate` is a 36-character hyphenated hex token
pub fn is_session_token(candidate: &str) -> bool {
    candidate.len() == TOKEN_LEN && Uuid::try_parse(candidate).is_ok()
}

/// First token-shaped substring of `text`
pub fn find_session_token(text: &str) -> Option<String> {
    if text.len() < TOKEN_LEN {
        return None;
    }
    (0..=text.len() - TOKEN_LEN)
        .filter(|&start| text.is_char_boundary(start) && text.is_char_boundary(start + TOKEN_LEN))
        .map(|start| &text[start..start + TOKEN_LEN])
        .find(|window| is_session_token(window))
        .map(str::to_string)
}

/// Token in the first path segment of `url`, if any
pub fn session_id_from_url(url: &str) -> Option<String> {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let path = without_scheme.find('/').map(|idx| &without_scheme[idx..])?;
    let first_segment = path
        .trim_start_matches('/')
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");

    is_session_token(first_segment).then(|| first_segment.to_string())
}

/// Which fallback strategy produced the session id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    CurrentUrl,
    WorkspaceLink,
    LocalStorage,
    ProbeRoute(String),
    Fallback,
}

/// Logs in and discovers the workspace id for a run
pub struct SessionResolver<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    config: SessionConfig,
}

impl<'a, D: PageDriver + ?Sized> SessionResolver<'a, D> {
    pub fn new(driver: &'a D, config: SessionConfig) -> Self {
        Self { driver, config }
    }

    /// Log in, then resolve the workspace id
    ///
    /// Fails with `Auth` when credentials are missing or the login form
    /// cannot be driven, and with `SessionUnresolved` when every discovery
    /// strategy comes up empty. Neither is retried.
    #[instrument(skip(self, credentials, fallback_session_id))]
    pub async fn resolve(
        &self,
        credentials: Option<&Credentials>,
        base_url: &str,
        fallback_session_id: Option<&str>,
    ) -> Result<Session> {
        let credentials = credentials
            .ok_or_else(|| ClaimcheckError::Auth("no credentials supplied".to_string()))?;

        self.login(credentials, base_url).await?;

        let (session_id, source) = self.discover(base_url, fallback_session_id).await?;
        info!("Resolved session {} via {:?}", session_id, source);

        Ok(Session::new(session_id, base_url))
    }

    /// Drive the two-step login form once
    pub async fn login(&self, credentials: &Credentials, base_url: &str) -> Result<()> {
        let login_url = format!("{}{}", base_url.trim_end_matches('/'), self.config.login_path);
        info!("Logging in at {}", login_url);

        self.driver
            .navigate(&login_url, self.config.step_timeout())
            .await
            .map_err(|e| ClaimcheckError::Auth(format!("cannot open login page: {}", e)))?;

        let email_selector = self
            .wait_for_any(&self.config.email_selectors)
            .await
            .ok_or_else(|| ClaimcheckError::Auth("no email input appeared".to_string()))?;
        self.driver
            .type_text(&email_selector, &credentials.email)
            .await
            .map_err(|e| ClaimcheckError::Auth(format!("cannot fill email: {}", e)))?;
        self.submit(&email_selector).await?;

        let password_selector = self
            .wait_for_any(&self.config.password_selectors)
            .await
            .ok_or_else(|| ClaimcheckError::Auth("no password input appeared".to_string()))?;
        self.driver
            .type_text(&password_selector, &credentials.password)
            .await
            .map_err(|e| ClaimcheckError::Auth(format!("cannot fill password: {}", e)))?;
        self.submit(&password_selector).await?;

        self.wait_for_login_to_clear().await
    }

    /// First selector that becomes visible within the step timeout
    async fn wait_for_any(&self, selectors: &[String]) -> Option<String> {
        if selectors.is_empty() {
            return None;
        }
        let per_selector = self.config.step_timeout() / selectors.len() as u32;

        for selector in selectors {
            match self
                .driver
                .wait_for_selector(selector, true, per_selector)
                .await
            {
                Ok(()) => return Some(selector.clone()),
                Err(e) => debug!("{} not available: {}", selector, e),
            }
        }
        None
    }

    /// Submit via the owning form, else via the first labelled button found
    async fn submit(&self, input_selector: &str) -> Result<()> {
        match probe::submit_enclosing_form(self.driver, input_selector).await {
            Ok(true) => {
                debug!("Submitted form owning {}", input_selector);
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => debug!("Form submit probe failed: {}", e),
        }

        for label in &self.config.submit_labels {
            if self.driver.click(&ClickTarget::button(label)).await.is_ok() {
                debug!("Submitted via button '{}'", label);
                return Ok(());
            }
        }

        Err(ClaimcheckError::Auth(format!(
            "no submit trigger found for {}",
            input_selector
        )))
    }

    async fn wait_for_login_to_clear(&self) -> Result<()> {
        let mut selectors = self.config.email_selectors.clone();
        selectors.extend(self.config.password_selectors.iter().cloned());
        let deadline = Instant::now() + self.config.step_timeout();

        loop {
            let visible = probe::credential_input_visible(self.driver, &selectors)
                .await
                .unwrap_or(true);
            if !visible {
                info!("Login completed");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ClaimcheckError::Auth(
                    "login form still visible after submitting credentials".to_string(),
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn id_from_current_url(&self) -> Option<String> {
        let url = self.driver.current_url().await.ok()?;
        session_id_from_url(&url)
    }

    /// Ordered fallback chain; the first strategy to yield an id wins
    pub async fn discover(
        &self,
        base_url: &str,
        fallback_session_id: Option<&str>,
    ) -> Result<(String, SessionSource)> {
        if let Some(id) = self.id_from_current_url().await {
            return Ok((id, SessionSource::CurrentUrl));
        }

        match probe::token_link_href(self.driver).await {
            Ok(Some(href)) => {
                let target = ClickTarget::selector(format!("a[href=\"{}\"]", href.replace('"', "\\\"")));
                match self.driver.click(&target).await {
                    Ok(()) => {
                        if let Some(id) = self.id_from_current_url().await {
                            return Ok((id, SessionSource::WorkspaceLink));
                        }
                    }
                    Err(e) => debug!("Workspace link click failed: {}", e),
                }
            }
            Ok(None) => debug!("No workspace link on page"),
            Err(e) => debug!("Workspace link probe failed: {}", e),
        }

        match probe::local_storage_values(self.driver).await {
            Ok(values) => {
                if let Some(id) = values.iter().find_map(|value| find_session_token(value)) {
                    return Ok((id, SessionSource::LocalStorage));
                }
            }
            Err(e) => debug!("localStorage probe failed: {}", e),
        }

        let base = base_url.trim_end_matches('/');
        for route in &self.config.probe_routes {
            let url = format!("{}{}", base, route);
            if let Err(e) = self.driver.navigate(&url, self.config.step_timeout()).await {
                debug!("Probe route {} failed: {}", route, e);
                continue;
            }
            if let Some(id) = self.id_from_current_url().await {
                return Ok((id, SessionSource::ProbeRoute(route.clone())));
            }
        }

        if let Some(fallback) = fallback_session_id.map(str::trim).filter(|id| !id.is_empty()) {
            if !is_session_token(fallback) {
                warn!("Fallback session id {} is not token-shaped, using it anyway", fallback);
            }
            return Ok((fallback.to_string(), SessionSource::Fallback));
        }

        Err(ClaimcheckError::SessionUnresolved(
            "no workspace id in URL, links, localStorage, probe routes, or fallback".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPageDriver;
    use serde_json::json;

    const ID: &str = "0b5e2c1a-9f0e-4c4e-8a51-3d2f6a7b8c9d";
    const BASE: &str = "https://app.test";
    const EMAIL: &str = "input[type=\"email\"]";
    const PASSWORD: &str = "input[type=\"password\"]";

    fn config() -> SessionConfig {
        SessionConfig {
            step_timeout_ms: 20,
            email_selectors: vec![EMAIL.to_string()],
            password_selectors: vec![PASSWORD.to_string()],
            submit_labels: vec!["Continue".to_string(), "Sign in".to_string()],
            probe_routes: vec!["/".to_string(), "/agents".to_string()],
            ..SessionConfig::default()
        }
    }

    fn login_ready() -> MockPageDriver {
        MockPageDriver::new()
            .with_selector(EMAIL)
            .with_selector(PASSWORD)
            .with_clickable(ClickTarget::button("Sign in"))
    }

    #[test]
    fn test_token_shape() {
        assert!(is_session_token(ID));
        assert!(!is_session_token("0b5e2c1a9f0e4c4e8a513d2f6a7b8c9d"));
        assert!(!is_session_token("agents"));
        assert!(!is_session_token("zb5e2c1a-9f0e-4c4e-8a51-3d2f6a7b8c9d"));
    }

    #[test]
    fn test_session_id_from_url() {
        assert_eq!(
            session_id_from_url(&format!("{}/{}/agents", BASE, ID)).as_deref(),
            Some(ID)
        );
        assert_eq!(
            session_id_from_url(&format!("{}/{}?tab=1", BASE, ID)).as_deref(),
            Some(ID)
        );
        assert_eq!(session_id_from_url(&format!("{}/agents/{}", BASE, ID)), None);
        assert_eq!(session_id_from_url(BASE), None);
    }

    #[test]
    fn test_find_session_token_in_json() {
        let stored = format!(r#"{{"state":{{"workspaceId":"{}"}}}}"#, ID);
        assert_eq!(find_session_token(&stored).as_deref(), Some(ID));
        assert_eq!(find_session_token("short"), None);
        assert_eq!(find_session_token("héllo wörld, nothing to see in this string"), None);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("dev@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("dev@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_error() {
        let driver = MockPageDriver::new();
        let resolver = SessionResolver::new(&driver, config());

        let result = resolver.resolve(None, BASE, Some(ID)).await;
        assert!(matches!(result, Err(ClaimcheckError::Auth(_))));
        assert!(driver.navigations().await.is_empty());
    }

    #[tokio::test]
    async fn test_login_fills_both_steps() {
        let driver = login_ready();
        let resolver = SessionResolver::new(&driver, config());
        let creds = Credentials::new("dev@example.com", "hunter2");

        resolver.login(&creds, BASE).await.unwrap();

        assert_eq!(driver.navigations().await, vec![format!("{}/login", BASE)]);
        let typed = driver.typed().await;
        assert_eq!(typed[0], (EMAIL.to_string(), "dev@example.com".to_string()));
        assert_eq!(typed[1], (PASSWORD.to_string(), "hunter2".to_string()));
        // "Continue" is tried first and is not on the page
        assert_eq!(
            driver.clicks().await,
            vec![
                ClickTarget::button("Continue"),
                ClickTarget::button("Sign in"),
                ClickTarget::button("Continue"),
                ClickTarget::button("Sign in"),
            ]
        );
    }

    #[tokio::test]
    async fn test_login_prefers_form_submit() {
        let driver = login_ready()
            .with_evaluate(&probe::submit_form_script(EMAIL), json!(true))
            .with_evaluate(&probe::submit_form_script(PASSWORD), json!(true));
        let resolver = SessionResolver::new(&driver, config());

        resolver
            .login(&Credentials::new("dev@example.com", "pw"), BASE)
            .await
            .unwrap();
        assert!(driver.clicks().await.is_empty());
    }

    #[tokio::test]
    async fn test_login_without_email_input_fails() {
        let driver = MockPageDriver::new();
        let resolver = SessionResolver::new(&driver, config());

        let result = resolver
            .login(&Credentials::new("dev@example.com", "pw"), BASE)
            .await;
        assert!(matches!(result, Err(ClaimcheckError::Auth(_))));
    }

    #[tokio::test]
    async fn test_login_without_submit_trigger_fails() {
        let driver = MockPageDriver::new().with_selector(EMAIL);
        let resolver = SessionResolver::new(&driver, config());

        let result = resolver
            .login(&Credentials::new("dev@example.com", "pw"), BASE)
            .await;
        match result {
            Err(ClaimcheckError::Auth(message)) => assert!(message.contains("submit")),
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_form_still_visible_fails() {
        let mut selectors = vec![EMAIL.to_string()];
        selectors.push(PASSWORD.to_string());
        let driver = login_ready()
            .with_evaluate(&probe::credential_input_script(&selectors), json!(true));
        let resolver = SessionResolver::new(&driver, config());

        let result = resolver
            .login(&Credentials::new("dev@example.com", "wrong"), BASE)
            .await;
        assert!(matches!(result, Err(ClaimcheckError::Auth(_))));
    }

    #[tokio::test]
    async fn test_resolve_from_redirect_after_login() {
        let driver = login_ready().with_redirect(
            &format!("{}/login", BASE),
            &format!("{}/{}/home", BASE, ID),
        );
        let resolver = SessionResolver::new(&driver, config());
        let creds = Credentials::new("dev@example.com", "pw");

        let session = resolver.resolve(Some(&creds), BASE, None).await.unwrap();
        assert_eq!(session.session_id, ID);
        assert_eq!(session.base_url, BASE);
        assert!(session.authenticated);
    }

    #[tokio::test]
    async fn test_discover_via_workspace_link() {
        let href = format!("/{}/agents", ID);
        let driver = MockPageDriver::new()
            .with_current_url(&format!("{}/workspaces", BASE))
            .with_evaluate(probe::TOKEN_LINK_HREF, json!(href))
            .with_click_navigation(
                ClickTarget::selector(format!("a[href=\"{}\"]", href)),
                &format!("{}/{}/agents", BASE, ID),
            );
        let resolver = SessionResolver::new(&driver, config());

        let (id, source) = resolver.discover(BASE, None).await.unwrap();
        assert_eq!(id, ID);
        assert_eq!(source, SessionSource::WorkspaceLink);
    }

    #[tokio::test]
    async fn test_discover_via_local_storage() {
        let driver = MockPageDriver::new()
            .with_current_url(&format!("{}/workspaces", BASE))
            .with_evaluate(
                probe::LOCAL_STORAGE_VALUES,
                json!(["dark", format!("{{\"lastWorkspace\":\"{}\"}}", ID)]),
            );
        let resolver = SessionResolver::new(&driver, config());

        let (id, source) = resolver.discover(BASE, None).await.unwrap();
        assert_eq!(id, ID);
        assert_eq!(source, SessionSource::LocalStorage);
    }

    #[tokio::test]
    async fn test_discover_via_probe_route() {
        let driver = MockPageDriver::new()
            .with_current_url(&format!("{}/welcome", BASE))
            .with_redirect(&format!("{}/agents", BASE), &format!("{}/{}/agents", BASE, ID));
        let resolver = SessionResolver::new(&driver, config());

        let (id, source) = resolver.discover(BASE, None).await.unwrap();
        assert_eq!(id, ID);
        assert_eq!(source, SessionSource::ProbeRoute("/agents".to_string()));
        assert_eq!(driver.navigations().await.len(), 2);
    }

    #[tokio::test]
    async fn test_discover_falls_back_then_fails() {
        let driver = MockPageDriver::new().with_current_url(&format!("{}/welcome", BASE));
        let resolver = SessionResolver::new(&driver, config());

        let (id, source) = resolver.discover(BASE, Some(ID)).await.unwrap();
        assert_eq!(id, ID);
        assert_eq!(source, SessionSource::Fallback);

        let result = resolver.discover(BASE, None).await;
        assert!(matches!(result, Err(ClaimcheckError::SessionUnresolved(_))));
    }
}
