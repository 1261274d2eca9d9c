//! The page automation capability every claimcheck component consumes

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Elements that count as clickable when targeting by visible label
pub const BUTTON_SCOPE: &str = "button, [role=\"button\"], input[type=\"submit\"], a";

/// What a click is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClickTarget {
    /// CSS selector; the first match is clicked
    Selector(String),
    /// First element within `scope` whose visible text equals `text`
    /// (trimmed, case-insensitive)
    Text { scope: String, text: String },
}

impl ClickTarget {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    /// A button-like element labelled `text`
    pub fn button(text: impl Into<String>) -> Self {
        Self::Text {
            scope: BUTTON_SCOPE.to_string(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for ClickTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selector(selector) => write!(f, "{}", selector),
            Self::Text { text, .. } => write!(f, "text={}", text),
        }
    }
}

/// Trait for driving one browser page (allows mocking in tests)
///
/// Implementations hold exactly one live page. Calls are serialized by the
/// caller; no implementation is expected to handle concurrent use.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url`, failing on hard navigation errors or `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    ///
    /// `undefined` and non-serializable results come back as `Value::Null`.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn click(&self, target: &ClickTarget) -> Result<()>;

    /// Focus the element matching `selector` and type `text` into it
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Wait until `selector` matches (and is rendered, when `visible`)
    ///
    /// Fails with `ElementNotFound` when `timeout` elapses first.
    async fn wait_for_selector(&self, selector: &str, visible: bool, timeout: Duration)
        -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Write a PNG screenshot of the page to `path`
    async fn screenshot(&self, path: &Path) -> Result<()>;
}
