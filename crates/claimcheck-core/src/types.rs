//! Core type definitions for claimcheck

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved identity and workspace scope for a verification run
///
/// Created once by the session resolver and passed by reference to every
/// navigation and verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Workspace identifier (UUID-shaped path segment)
    pub session_id: String,
    /// Application base URL without trailing slash
    pub base_url: String,
    /// Whether the login flow completed for this run
    pub authenticated: bool,
}

impl Session {
    pub fn new(session_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authenticated: true,
        }
    }

    /// Build the absolute URL for a workspace-scoped route
    ///
    /// `url_for("/agents")` yields `{base_url}/{session_id}/agents`.
    pub fn url_for(&self, route: &str) -> String {
        let route = route.trim_start_matches('/');
        if route.is_empty() {
            format!("{}/{}", self.base_url, self.session_id)
        } else {
            format!("{}/{}/{}", self.base_url, self.session_id, route)
        }
    }
}

/// Kind of assertion a documentation claim makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// A referenced asset file exists and is non-empty
    Asset,
    /// A referenced route loads with content
    Route,
    /// A referenced UI text is visible on the page
    UiText,
}

impl std::fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset => write!(f, "asset"),
            Self::Route => write!(f, "route"),
            Self::UiText => write!(f, "ui_text"),
        }
    }
}

/// A single testable assertion extracted from documentation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub kind: ClaimKind,
    /// Asset path, route, or literal UI text
    pub value: String,
    pub source_file: String,
    /// 1-based line number in `source_file`
    pub source_line: usize,
}

impl Claim {
    pub fn new(
        kind: ClaimKind,
        value: impl Into<String>,
        source_file: impl Into<String>,
        source_line: usize,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            source_file: source_file.into(),
            source_line,
        }
    }

    /// Human-readable name, used for logs and artifact file names
    pub fn label(&self) -> String {
        format!(
            "{} {} ({}:{})",
            self.kind, self.value, self.source_file, self.source_line
        )
    }
}

/// Why a navigation did not settle on a usable page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationErrorKind {
    #[default]
    None,
    Timeout,
    GlobalErrorBanner,
    LoggedOut,
    Unknown,
}

impl std::fmt::Display for NavigationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Timeout => write!(f, "Timeout"),
            Self::GlobalErrorBanner => write!(f, "GlobalErrorBanner"),
            Self::LoggedOut => write!(f, "LoggedOut"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of a single `goto_route` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    pub ok: bool,
    pub final_url: String,
    pub error_kind: NavigationErrorKind,
    /// Navigation attempts made, including the first
    pub attempts: u32,
    /// Last driver error message or matched error phrase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Diagnostic screenshot captured on the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl NavigationOutcome {
    pub fn settled(final_url: impl Into<String>, attempts: u32) -> Self {
        Self {
            ok: true,
            final_url: final_url.into(),
            error_kind: NavigationErrorKind::None,
            attempts,
            message: None,
            artifact: None,
        }
    }

    pub fn gave_up(
        final_url: impl Into<String>,
        error_kind: NavigationErrorKind,
        attempts: u32,
        message: Option<String>,
    ) -> Self {
        Self {
            ok: false,
            final_url: final_url.into(),
            error_kind,
            attempts,
            message,
            artifact: None,
        }
    }

    /// Short description of a failed outcome, e.g. `Timeout after 3 attempt(s)`
    pub fn describe(&self) -> String {
        match &self.message {
            Some(message) => format!(
                "{} after {} attempt(s): {}",
                self.error_kind, self.attempts, message
            ),
            None => format!("{} after {} attempt(s)", self.error_kind, self.attempts),
        }
    }
}

/// Verdict for one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub claim: Claim,
    pub verified: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

impl VerificationResult {
    pub fn passed(claim: Claim, detail: impl Into<String>) -> Self {
        Self {
            claim,
            verified: true,
            detail: detail.into(),
            artifact: None,
        }
    }

    pub fn failed(claim: Claim, detail: impl Into<String>) -> Self {
        Self {
            claim,
            verified: false,
            detail: detail.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: Option<PathBuf>) -> Self {
        self.artifact = artifact;
        self
    }
}

/// A failed end-to-end test, as read from a test runner's JSON report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub screenshot: Option<PathBuf>,
}

/// Anything the failure classifier accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum FailureSource {
    Verification(VerificationResult),
    Test(TestFailure),
}

impl FailureSource {
    /// Human-readable name of the failure
    pub fn name(&self) -> String {
        match self {
            Self::Verification(result) => result.claim.label(),
            Self::Test(test) => test.name.clone(),
        }
    }

    /// Text the classifier scans
    pub fn detail(&self) -> &str {
        match self {
            Self::Verification(result) => &result.detail,
            Self::Test(test) => &test.message,
        }
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            Self::Verification(result) => result.artifact.as_deref(),
            Self::Test(test) => test.screenshot.as_deref(),
        }
    }
}

impl From<VerificationResult> for FailureSource {
    fn from(result: VerificationResult) -> Self {
        Self::Verification(result)
    }
}

impl From<TestFailure> for FailureSource {
    fn from(test: TestFailure) -> Self {
        Self::Test(test)
    }
}

/// Remediation bucket for a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    DocIssue,
    CodeBug,
    TestIssue,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocIssue => write!(f, "doc_issue"),
            Self::CodeBug => write!(f, "code_bug"),
            Self::TestIssue => write!(f, "test_issue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Failure severity, inferred independently of classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
        }
    }
}

/// A failure with its triage verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub failure: FailureSource,
    pub classification: Classification,
    pub confidence: Confidence,
    pub severity: Severity,
    pub suggested_action: String,
    pub artifact_path: Option<PathBuf>,
}
