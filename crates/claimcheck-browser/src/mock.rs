//! Scriptable page driver for tests
//!
//! `MockPageDriver` returns canned results instead of driving a browser:
//! evaluate responses are keyed by exact script text, either globally or
//! for a specific current URL, and everything not primed comes back empty
//! (`Value::Null`, selector timeouts, failed clicks).

use crate::driver::{ClickTarget, PageDriver};
use crate::error::{ClaimcheckError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct MockState {
    current_url: String,
    /// Consumed one per navigate call; navigation succeeds once empty
    navigate_failures: VecDeque<String>,
    /// Fails every navigate call when set
    navigate_always_fails: Option<String>,
    redirects: HashMap<String, String>,
    evaluate_global: HashMap<String, Value>,
    evaluate_by_url: HashMap<(String, String), Value>,
    /// Answered in order; the last value repeats
    evaluate_sequences: HashMap<String, VecDeque<Value>>,
    present_selectors: HashSet<String>,
    click_targets: HashSet<ClickTarget>,
    click_navigation: HashMap<ClickTarget, String>,
    navigations: Vec<String>,
    evaluations: Vec<String>,
    clicks: Vec<ClickTarget>,
    typed: Vec<(String, String)>,
    screenshots: Vec<PathBuf>,
}

/// Mock page driver for testing
#[derive(Default)]
pub struct MockPageDriver {
    state: Mutex<MockState>,
}

impl MockPageDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start on `url` without a recorded navigation
    pub fn with_current_url(mut self, url: &str) -> Self {
        self.state.get_mut().current_url = url.to_string();
        self
    }

    /// Fail the next navigate call with `message`
    pub fn with_navigate_failure(mut self, message: &str) -> Self {
        self.state
            .get_mut()
            .navigate_failures
            .push_back(message.to_string());
        self
    }

    /// Fail every navigate call with `message`
    pub fn with_navigate_always_failing(mut self, message: &str) -> Self {
        self.state.get_mut().navigate_always_fails = Some(message.to_string());
        self
    }

    /// Land on `to` whenever `from` is navigated to
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.state
            .get_mut()
            .redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    /// Answer `script` with `value` on every page
    pub fn with_evaluate(mut self, script: &str, value: Value) -> Self {
        self.state
            .get_mut()
            .evaluate_global
            .insert(script.to_string(), value);
        self
    }

    /// Answer `script` with `value` while the current URL is `url`
    pub fn with_page_evaluate(mut self, url: &str, script: &str, value: Value) -> Self {
        self.state
            .get_mut()
            .evaluate_by_url
            .insert((url.to_string(), script.to_string()), value);
        self
    }

    /// Answer successive evaluations of `script` with `values`, repeating the last
    pub fn with_evaluate_sequence(mut self, script: &str, values: Vec<Value>) -> Self {
        self.state
            .get_mut()
            .evaluate_sequences
            .insert(script.to_string(), values.into());
        self
    }

    /// Let `wait_for_selector(selector, ..)` succeed
    pub fn with_selector(mut self, selector: &str) -> Self {
        self.state
            .get_mut()
            .present_selectors
            .insert(selector.to_string());
        self
    }

    /// Let clicks on `target` succeed without navigating
    pub fn with_clickable(mut self, target: ClickTarget) -> Self {
        self.state.get_mut().click_targets.insert(target);
        self
    }

    /// Let clicks on `target` succeed and land on `url`
    pub fn with_click_navigation(mut self, target: ClickTarget, url: &str) -> Self {
        let state = self.state.get_mut();
        state.click_targets.insert(target.clone());
        state.click_navigation.insert(target, url.to_string());
        self
    }

    pub async fn navigations(&self) -> Vec<String> {
        self.state.lock().await.navigations.clone()
    }

    pub async fn evaluations(&self) -> Vec<String> {
        self.state.lock().await.evaluations.clone()
    }

    pub async fn clicks(&self) -> Vec<ClickTarget> {
        self.state.lock().await.clicks.clone()
    }

    pub async fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().await.typed.clone()
    }

    pub async fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().await.screenshots.clone()
    }
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        state.navigations.push(url.to_string());

        if let Some(message) = state.navigate_always_fails.clone() {
            return Err(ClaimcheckError::Driver(message));
        }
        if let Some(message) = state.navigate_failures.pop_front() {
            return Err(ClaimcheckError::Driver(message));
        }

        let landed = state
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        state.current_url = landed;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let mut state = self.state.lock().await;
        state.evaluations.push(script.to_string());

        if let Some(values) = state.evaluate_sequences.get_mut(script) {
            let value = if values.len() > 1 {
                values.pop_front()
            } else {
                values.front().cloned()
            };
            return Ok(value.unwrap_or(Value::Null));
        }

        let key = (state.current_url.clone(), script.to_string());
        let value = state
            .evaluate_by_url
            .get(&key)
            .or_else(|| state.evaluate_global.get(script))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(value)
    }

    async fn click(&self, target: &ClickTarget) -> Result<()> {
        let mut state = self.state.lock().await;
        state.clicks.push(target.clone());

        if !state.click_targets.contains(target) {
            return Err(ClaimcheckError::ElementNotFound {
                selector: target.to_string(),
            });
        }
        if let Some(url) = state.click_navigation.get(target).cloned() {
            state.current_url = url;
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.present_selectors.contains(selector) {
            return Err(ClaimcheckError::ElementNotFound {
                selector: selector.to_string(),
            });
        }
        state.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        _visible: bool,
        _timeout: Duration,
    ) -> Result<()> {
        let state = self.state.lock().await;
        if state.present_selectors.contains(selector) {
            Ok(())
        } else {
            Err(ClaimcheckError::ElementNotFound {
                selector: selector.to_string(),
            })
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().await.current_url.clone())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.state.lock().await.screenshots.push(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_navigation_failures_are_consumed_in_order() {
        let driver = MockPageDriver::new().with_navigate_failure("net::ERR_CONNECTION_RESET");
        let timeout = Duration::from_secs(1);

        assert!(driver.navigate("https://a.test/x", timeout).await.is_err());
        assert!(driver.navigate("https://a.test/x", timeout).await.is_ok());
        assert_eq!(driver.current_url().await.unwrap(), "https://a.test/x");
        assert_eq!(driver.navigations().await.len(), 2);
    }

    #[tokio::test]
    async fn test_redirect_sets_current_url() {
        let driver = MockPageDriver::new().with_redirect("https://a.test/", "https://a.test/login");
        driver
            .navigate("https://a.test/", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "https://a.test/login");
    }

    #[tokio::test]
    async fn test_page_evaluate_overrides_global() {
        let driver = MockPageDriver::new()
            .with_current_url("https://a.test/one")
            .with_evaluate("1 + 1", json!(2))
            .with_page_evaluate("https://a.test/one", "1 + 1", json!(3));

        assert_eq!(driver.evaluate("1 + 1").await.unwrap(), json!(3));
        driver
            .navigate("https://a.test/two", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(driver.evaluate("1 + 1").await.unwrap(), json!(2));
        assert_eq!(driver.evaluate("unknown()").await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_evaluate_sequence_repeats_last_value() {
        let driver = MockPageDriver::new().with_evaluate_sequence("count()", vec![json!(1), json!(2)]);

        assert_eq!(driver.evaluate("count()").await.unwrap(), json!(1));
        assert_eq!(driver.evaluate("count()").await.unwrap(), json!(2));
        assert_eq!(driver.evaluate("count()").await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_click_navigation() {
        let target = ClickTarget::selector("a.workspace");
        let driver = MockPageDriver::new().with_click_navigation(target.clone(), "https://a.test/ws");

        driver.click(&target).await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "https://a.test/ws");
        assert!(driver.click(&ClickTarget::button("Missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_type_requires_selector() {
        let driver = MockPageDriver::new().with_selector("input[type=\"email\"]");
        driver
            .type_text("input[type=\"email\"]", "dev@example.com")
            .await
            .unwrap();
        assert!(driver.type_text("#nope", "x").await.is_err());
        assert_eq!(driver.typed().await.len(), 1);
    }
}
