//! Chrome DevTools Protocol implementation of [`PageDriver`]

use crate::driver::{ClickTarget, PageDriver};
use crate::error::{ClaimcheckError, Result};
use crate::probe;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// How the Chrome instance is started
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub headless: bool,
    /// Viewport as (width, height)
    pub window: (u32, u32),
    /// Overrides Chrome's default user agent
    pub user_agent: Option<String>,
    /// Budget for element lookups, clicks, and typing
    pub element_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window: (1440, 900),
            user_agent: None,
            element_timeout: Duration::from_secs(10),
        }
    }
}

impl DriverConfig {
    /// Extra Chrome command-line switches
    pub fn extra_args(&self) -> Vec<String> {
        self.user_agent
            .iter()
            .map(|ua| format!("--user-agent={}", ua))
            .collect()
    }
}

/// One Chrome tab driven over CDP
///
/// Scripts are evaluated as expressions and transported back as JSON, so
/// arrays and objects arrive intact rather than as remote object handles.
pub struct ChromeDriver {
    /// Owns the Chrome process; the tab dies with it
    #[allow(dead_code)]
    browser: Browser,
    tab: Arc<Tab>,
    config: DriverConfig,
}

impl ChromeDriver {
    pub async fn launch() -> Result<Self> {
        Self::launch_with_config(DriverConfig::default()).await
    }

    pub async fn launch_with_config(config: DriverConfig) -> Result<Self> {
        let (width, height) = config.window;
        info!(
            "Starting Chrome ({}, {}x{})",
            if config.headless { "headless" } else { "headed" },
            width,
            height
        );

        let extra_args = config.extra_args();
        let mut options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window))
            .build()
            .map_err(|e| driver_error("invalid launch options", e))?;
        options.args.extend(extra_args.iter().map(OsStr::new));

        let browser = Browser::new(options).map_err(|e| driver_error("cannot start Chrome", e))?;
        Self::with_new_tab(browser, config)
    }

    /// Attach to a Chrome started with `--remote-debugging-port`
    pub async fn connect(port: u16) -> Result<Self> {
        let endpoint = format!("http://127.0.0.1:{}", port);
        info!("Attaching to Chrome at {}", endpoint);

        let browser = Browser::connect(endpoint).map_err(|e| driver_error("cannot attach to Chrome", e))?;
        Self::with_new_tab(browser, DriverConfig::default())
    }

    fn with_new_tab(browser: Browser, config: DriverConfig) -> Result<Self> {
        let tab = browser
            .new_tab()
            .map_err(|e| driver_error("cannot open tab", e))?;
        debug!("Opened tab {}", tab.get_target_id());
        Ok(Self { browser, tab, config })
    }
}

fn driver_error(context: &str, e: impl std::fmt::Display) -> ClaimcheckError {
    ClaimcheckError::Driver(format!("{}: {}", context, e))
}

/// Run `f` under the `during` timeout, then put `after` back whatever `f` returned
fn with_timeout<T>(
    set_timeout: impl Fn(Duration),
    during: Duration,
    after: Duration,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    set_timeout(during);
    let result = f();
    set_timeout(after);
    result
}

#[async_trait]
impl PageDriver for ChromeDriver {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let tab = &self.tab;
        with_timeout(
            |t| {
                tab.set_default_timeout(t);
            },
            timeout,
            self.config.element_timeout,
            || {
                tab.navigate_to(url)
                    .map_err(|e| driver_error(&format!("cannot navigate to {}", url), e))?;
                tab.wait_until_navigated().map_err(|e| {
                    driver_error(&format!("navigation to {} did not complete", url), e)
                })?;
                Ok(())
            },
        )?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let wrapped = format!("JSON.stringify({})", script);
        let result = self
            .tab
            .evaluate(&wrapped, false)
            .map_err(|e| driver_error("script evaluation failed", e))?;

        match result.value {
            Some(Value::String(json)) => Ok(serde_json::from_str(&json)?),
            _ => Ok(Value::Null),
        }
    }

    async fn click(&self, target: &ClickTarget) -> Result<()> {
        debug!("Clicking {}", target);
        match target {
            ClickTarget::Selector(selector) => {
                let element = self
                    .tab
                    .wait_for_element_with_custom_timeout(selector, self.config.element_timeout)
                    .map_err(|_e| ClaimcheckError::ElementNotFound {
                        selector: selector.clone(),
                    })?;
                element
                    .click()
                    .map_err(|e| ClaimcheckError::Driver(format!("Click failed on {}: {}", selector, e)))?;
            }
            ClickTarget::Text { scope, text } => {
                let clicked = self
                    .evaluate(&probe::click_by_text_script(scope, text))
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                if !clicked {
                    return Err(ClaimcheckError::ElementNotFound {
                        selector: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.config.element_timeout)
            .map_err(|_e| ClaimcheckError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        element
            .type_into(text)
            .map_err(|e| ClaimcheckError::Driver(format!("Typing into {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        visible: bool,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_e| ClaimcheckError::ElementNotFound {
                selector: selector.to_string(),
            })?;

        if !visible {
            return Ok(());
        }

        let script = probe::is_visible_script(selector);
        loop {
            if self.evaluate(&script).await?.as_bool().unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ClaimcheckError::ElementNotFound {
                    selector: selector.to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let data = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| ClaimcheckError::Driver(format!("CDP capture failed: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;

        debug!("Screenshot stored: {} ({} bytes)", path.display(), data.len());
        Ok(())
    }
}
