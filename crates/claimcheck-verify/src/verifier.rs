//! Per-kind claim verification

use crate::pages::PageMap;
use claimcheck_browser::{probe, PageDriver, ResilientNavigator};
use claimcheck_core::config::VerifyConfig;
use claimcheck_core::{Claim, ClaimKind, ClaimcheckError, Session, VerificationResult};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// State of a documentation file's primary page within one run of claims
enum PageContext {
    Unloaded,
    Loaded,
    /// The page could not be restored; carries the failure detail
    Failed(String),
}

/// Checks claims against the filesystem and the live application
///
/// Mismatches come back as failed results, never as errors.
pub struct ClaimVerifier<'a, D: PageDriver + ?Sized> {
    navigator: ResilientNavigator<'a, D>,
    assets_root: PathBuf,
    config: VerifyConfig,
    pages: PageMap,
}

impl<'a, D: PageDriver + ?Sized> ClaimVerifier<'a, D> {
    pub fn new(
        navigator: ResilientNavigator<'a, D>,
        assets_root: impl Into<PathBuf>,
        config: VerifyConfig,
    ) -> Self {
        Self {
            navigator,
            assets_root: assets_root.into(),
            config,
            pages: PageMap::default(),
        }
    }

    pub fn with_pages(mut self, pages: PageMap) -> Self {
        self.pages = pages;
        self
    }

    pub fn navigator(&self) -> &ResilientNavigator<'a, D> {
        &self.navigator
    }

    /// Verify a single claim against the current state of the world
    ///
    /// UiText claims read the page that is currently loaded; use
    /// [`ClaimVerifier::verify_all`] to get page context handled.
    #[instrument(skip(self, session), fields(claim = %claim.label()))]
    pub async fn verify(&self, claim: &Claim, session: &Session) -> VerificationResult {
        let result = match claim.kind {
            ClaimKind::Asset => self.verify_asset(claim).await,
            ClaimKind::Route => self.verify_route(claim, session).await,
            ClaimKind::UiText => self.verify_ui_text(claim).await,
        };

        if result.verified {
            debug!("Verified: {}", result.detail);
        } else {
            info!("Failed {}: {}", claim.label(), result.detail);
        }
        result
    }

    /// Verify claims one at a time against the shared page
    ///
    /// Claims are grouped by source file in order of first appearance and
    /// keep their source order within a file. Each file's primary route is
    /// loaded before its first UiText claim and again after any Route check
    /// has moved the page. Results are returned in verification order.
    pub async fn verify_all(&self, claims: &[Claim], session: &Session) -> Vec<VerificationResult> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&Claim>> = HashMap::new();
        for claim in claims {
            groups
                .entry(claim.source_file.as_str())
                .or_insert_with(|| {
                    order.push(claim.source_file.as_str());
                    Vec::new()
                })
                .push(claim);
        }

        let mut results = Vec::with_capacity(claims.len());
        for file in order {
            let mut group = groups.remove(file).unwrap_or_default();
            group.sort_by_key(|claim| claim.source_line);

            let primary = self.pages.primary_route(file);
            let mut context = PageContext::Unloaded;
            info!("Verifying {} claim(s) from {} (page {})", group.len(), file, primary);

            for claim in group {
                let result = match claim.kind {
                    ClaimKind::UiText => {
                        if let PageContext::Unloaded = context {
                            context = self.load_context(session, &primary).await;
                        }
                        match &context {
                            PageContext::Failed(detail) => {
                                VerificationResult::failed(claim.clone(), detail.clone())
                            }
                            _ => self.verify(claim, session).await,
                        }
                    }
                    ClaimKind::Route => {
                        let result = self.verify(claim, session).await;
                        context = PageContext::Unloaded;
                        result
                    }
                    ClaimKind::Asset => self.verify(claim, session).await,
                };
                results.push(result);
            }
        }

        let failed = results.iter().filter(|r| !r.verified).count();
        info!("Verified {} claim(s), {} failed", results.len(), failed);
        results
    }

    async fn load_context(&self, session: &Session, route: &str) -> PageContext {
        match self.navigator.restore(session, route).await {
            Ok(outcome) if outcome.ok => PageContext::Loaded,
            Ok(outcome) => {
                warn!("Context page {} did not load: {}", route, outcome.describe());
                PageContext::Failed(format!(
                    "context page {} failed to load: {}",
                    route,
                    outcome.describe()
                ))
            }
            Err(e) => PageContext::Failed(format!("context page {} is invalid: {}", route, e)),
        }
    }

    async fn verify_asset(&self, claim: &Claim) -> VerificationResult {
        let path = self.asset_path(&claim.value);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => VerificationResult::failed(
                claim.clone(),
                format!("asset not found: {} is not a file", path.display()),
            ),
            Ok(meta) if meta.len() == 0 => VerificationResult::failed(
                claim.clone(),
                format!("asset is zero bytes: {}", path.display()),
            ),
            Ok(meta) => VerificationResult::passed(
                claim.clone(),
                format!("asset present: {} ({} bytes)", path.display(), meta.len()),
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => VerificationResult::failed(
                claim.clone(),
                format!("asset not found: {}", path.display()),
            ),
            Err(e) => VerificationResult::failed(
                claim.clone(),
                format!("asset unreadable: {}: {}", path.display(), e),
            ),
        }
    }

    fn asset_path(&self, value: &str) -> PathBuf {
        let relative = Path::new(value.trim_start_matches('/'));
        self.assets_root.join(relative)
    }

    async fn verify_route(&self, claim: &Claim, session: &Session) -> VerificationResult {
        let outcome = match self
            .navigator
            .goto_route(session, &claim.value, self.navigator.default_options())
            .await
        {
            Ok(outcome) => outcome,
            Err(ClaimcheckError::InvalidRoute(reason)) => {
                return VerificationResult::failed(claim.clone(), format!("invalid route: {}", reason))
            }
            Err(e) => {
                return VerificationResult::failed(claim.clone(), format!("route check failed: {}", e))
            }
        };

        if !outcome.ok {
            let artifact = outcome.artifact.clone();
            return VerificationResult::failed(
                claim.clone(),
                format!("navigation failed: {}", outcome.describe()),
            )
            .with_artifact(artifact);
        }

        let driver = self.navigator.driver();
        match probe::first_present(driver, &self.config.content_selectors).await {
            Ok(Some(selector)) => VerificationResult::passed(
                claim.clone(),
                format!("loaded with content ({})", selector),
            ),
            Ok(None) => VerificationResult::failed(claim.clone(), "loaded but no content"),
            Err(e) => VerificationResult::failed(
                claim.clone(),
                format!("loaded but content probe failed: {}", e),
            ),
        }
    }

    async fn verify_ui_text(&self, claim: &Claim) -> VerificationResult {
        let text = match probe::visible_text(self.navigator.driver()).await {
            Ok(text) => text,
            Err(e) => {
                return VerificationResult::failed(
                    claim.clone(),
                    format!("ui text check failed: {}", e),
                )
            }
        };

        if text.to_lowercase().contains(&claim.value.to_lowercase()) {
            VerificationResult::passed(claim.clone(), "ui text visible")
        } else {
            VerificationResult::failed(
                claim.clone(),
                format!("ui text not found on page: \"{}\"", claim.value),
            )
        }
    }
}
