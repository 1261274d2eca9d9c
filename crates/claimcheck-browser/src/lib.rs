//! Page driving and resilient navigation for claimcheck
//!
//! This crate turns an unreliable single-page application into something a
//! verifier can trust:
//!
//! - **Page driving**: the [`PageDriver`] capability, a Chrome DevTools
//!   Protocol implementation, and a scriptable mock for tests
//! - **Session resolution**: one login per run, then an ordered fallback
//!   chain that discovers the workspace id
//! - **Resilient navigation**: retries with linear backoff, settling on
//!   network quiescence and loader disappearance, global-error and
//!   logged-out detection
//!
//! # Example
//!
//! ```no_run
//! use claimcheck_browser::{ChromeDriver, Credentials, ResilientNavigator, SessionResolver};
//! use claimcheck_core::ClaimcheckConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClaimcheckConfig::default();
//!     let driver = ChromeDriver::launch().await?;
//!
//!     let resolver = SessionResolver::new(&driver, config.session.clone());
//!     let session = resolver
//!         .resolve(Credentials::from_env().as_ref(), &config.base_url, None)
//!         .await?;
//!
//!     let navigator = ResilientNavigator::new(&driver, config.navigation.clone());
//!     let outcome = navigator
//!         .goto_route(&session, "/agents", navigator.default_options())
//!         .await?;
//!     println!("loaded: {} ({})", outcome.ok, outcome.final_url);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`driver`]: the capability trait and click targets
//! - [`browser`]: Chrome implementation
//! - [`mock`]: scriptable test implementation
//! - [`probe`]: page scripts and typed helpers
//! - [`session`]: login and workspace discovery
//! - [`navigator`]: the navigation state machine
//! - [`error`]: error types for browser operations

pub mod browser;
pub mod driver;
pub mod error;
pub mod mock;
pub mod navigator;
pub mod probe;
pub mod session;

// Re-export commonly used types
pub use browser::{ChromeDriver, DriverConfig};
pub use driver::{ClickTarget, PageDriver};
pub use error::{BrowserError, Result};
pub use mock::MockPageDriver;
pub use navigator::{transition, AttemptEvent, GotoOptions, NavState, ResilientNavigator};
pub use session::{Credentials, SessionResolver, SessionSource};
