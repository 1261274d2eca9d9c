//! Configuration management for claimcheck
//!
//! Every selector, phrase, timeout, and pattern the verification core relies
//! on lives here with a default, so UI wording drift in the target
//! application is absorbed by editing `.claimcheck/config.toml` rather than
//! the code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ClaimcheckError, Result};

/// Run-level claimcheck configuration
///
/// Loaded from `.claimcheck/config.toml` in the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimcheckConfig {
    /// Application base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Documentation corpus root
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Directory asset claims are resolved against
    #[serde(default = "default_assets_root")]
    pub assets_root: PathBuf,

    /// Directory for screenshots, classifications, and reports
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    /// Documentation path prefix -> primary route of the page it describes
    #[serde(default)]
    pub pages: BTreeMap<String, String>,
}

/// Retry and settling parameters for the resilient navigator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Retries after the first attempt (0 means a single attempt)
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_navigation_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff before retry n is `backoff_step_ms * n`
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,

    #[serde(default = "default_quiescence_timeout_ms")]
    pub quiescence_timeout_ms: u64,

    #[serde(default = "default_quiescence_poll_ms")]
    pub quiescence_poll_ms: u64,

    #[serde(default = "default_loader_timeout_ms")]
    pub loader_timeout_ms: u64,

    #[serde(default = "default_loader_poll_ms")]
    pub loader_poll_ms: u64,

    /// Elements that indicate the page is still loading
    #[serde(default = "default_loader_selectors")]
    pub loader_selectors: Vec<String>,

    /// Visible phrases that indicate an application-wide error state
    #[serde(default = "default_error_phrases")]
    pub error_phrases: Vec<String>,
}

/// Login form and workspace discovery parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Bounded wait for each login step
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    #[serde(default = "default_email_selectors")]
    pub email_selectors: Vec<String>,

    #[serde(default = "default_password_selectors")]
    pub password_selectors: Vec<String>,

    /// Button labels tried in order when the form does not auto-submit
    #[serde(default = "default_submit_labels")]
    pub submit_labels: Vec<String>,

    /// Routes probed when no workspace id is visible after login
    #[serde(default = "default_probe_routes")]
    pub probe_routes: Vec<String>,
}

/// Claim pattern parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Known top-level route segments
    #[serde(default = "default_route_segments")]
    pub route_segments: Vec<String>,

    /// Placeholder segments docs use for the workspace id
    #[serde(default = "default_workspace_placeholders")]
    pub workspace_placeholders: Vec<String>,

    #[serde(default = "default_ui_text_max_len")]
    pub ui_text_max_len: usize,

    #[serde(default = "default_action_verbs")]
    pub action_verbs: Vec<String>,
}

/// Verification parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// At least one must be present for a route to count as loaded
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,
}

// Default value providers
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_assets_root() -> PathBuf {
    PathBuf::from("static")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".claimcheck/artifacts")
}

fn default_retries() -> u32 {
    2
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_backoff_step_ms() -> u64 {
    1_000
}

fn default_backoff_ceiling_ms() -> u64 {
    5_000
}

fn default_quiescence_timeout_ms() -> u64 {
    5_000
}

fn default_quiescence_poll_ms() -> u64 {
    500
}

fn default_loader_timeout_ms() -> u64 {
    10_000
}

fn default_loader_poll_ms() -> u64 {
    250
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_loader_selectors() -> Vec<String> {
    strings(&[
        "[aria-busy=\"true\"]",
        "[role=\"progressbar\"]",
        ".loading",
        ".spinner",
        ".skeleton",
        "[data-loading=\"true\"]",
    ])
}

fn default_error_phrases() -> Vec<String> {
    strings(&[
        "Something went wrong",
        "An unexpected error occurred",
        "Application error",
        "Internal Server Error",
        "Failed to load",
        "Please try again later",
    ])
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_step_timeout_ms() -> u64 {
    10_000
}

fn default_email_selectors() -> Vec<String> {
    strings(&[
        "input[type=\"email\"]",
        "input[name=\"email\"]",
        "input[autocomplete=\"username\"]",
        "input[name=\"username\"]",
    ])
}

fn default_password_selectors() -> Vec<String> {
    strings(&["input[type=\"password\"]", "input[name=\"password\"]"])
}

fn default_submit_labels() -> Vec<String> {
    strings(&["Continue", "Next", "Sign in", "Log in", "Login", "Submit"])
}

fn default_probe_routes() -> Vec<String> {
    strings(&["/", "/agents", "/home", "/settings"])
}

fn default_asset_prefix() -> String {
    "/screenshots/".to_string()
}

fn default_route_segments() -> Vec<String> {
    strings(&[
        "agents",
        "workflows",
        "knowledge",
        "integrations",
        "tools",
        "chats",
        "analytics",
        "settings",
        "members",
        "billing",
    ])
}

fn default_workspace_placeholders() -> Vec<String> {
    strings(&[
        "{workspace}",
        "{workspaceId}",
        ":workspace",
        ":workspaceId",
        "<workspace>",
        "<workspace-id>",
        "[workspace]",
        "WORKSPACE_ID",
    ])
}

fn default_ui_text_max_len() -> usize {
    40
}

fn default_action_verbs() -> Vec<String> {
    strings(&["click", "button", "tab", "field", "select"])
}

fn default_content_selectors() -> Vec<String> {
    strings(&[
        "main h1",
        "main h2",
        "[role=\"main\"] *",
        "table",
        "form",
        "[data-testid]",
        "h1",
    ])
}

impl NavigationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Linear backoff before the given retry, capped by the ceiling
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let ms = self.backoff_step_ms.saturating_mul(u64::from(retry));
        Duration::from_millis(ms.min(self.backoff_ceiling_ms))
    }
}

impl SessionConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl ClaimcheckConfig {
    /// Load configuration from `.claimcheck/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".claimcheck/config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            ClaimcheckError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write default configuration to `.claimcheck/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(".claimcheck");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default()).map_err(|e| {
            ClaimcheckError::Config(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

impl Default for ClaimcheckConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            docs_dir: default_docs_dir(),
            assets_root: default_assets_root(),
            artifacts_dir: default_artifacts_dir(),
            navigation: NavigationConfig::default(),
            session: SessionConfig::default(),
            extract: ExtractConfig::default(),
            verify: VerifyConfig::default(),
            pages: BTreeMap::new(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            timeout_ms: default_navigation_timeout_ms(),
            backoff_step_ms: default_backoff_step_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
            quiescence_timeout_ms: default_quiescence_timeout_ms(),
            quiescence_poll_ms: default_quiescence_poll_ms(),
            loader_timeout_ms: default_loader_timeout_ms(),
            loader_poll_ms: default_loader_poll_ms(),
            loader_selectors: default_loader_selectors(),
            error_phrases: default_error_phrases(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            step_timeout_ms: default_step_timeout_ms(),
            email_selectors: default_email_selectors(),
            password_selectors: default_password_selectors(),
            submit_labels: default_submit_labels(),
            probe_routes: default_probe_routes(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            asset_prefix: default_asset_prefix(),
            route_segments: default_route_segments(),
            workspace_placeholders: default_workspace_placeholders(),
            ui_text_max_len: default_ui_text_max_len(),
            action_verbs: default_action_verbs(),
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            content_selectors: default_content_selectors(),
        }
    }
}
