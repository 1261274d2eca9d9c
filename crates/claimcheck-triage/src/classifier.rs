//! Rule-based failure classification
//!
//! Rules are evaluated in order against the failure detail and the first
//! match wins. A failure that mentions both a missing selector and a
//! timeout is therefore a documentation issue: the selector vocabulary is
//! checked first. Severity is inferred by a separate scan over the detail,
//! plus the test name for end-to-end failures. A claim label carries the
//! source file path, so it never feeds the severity scan.

use claimcheck_core::{
    Classification, ClassifiedFailure, Confidence, FailureSource, Severity,
};
use tracing::debug;

struct Rule {
    name: &'static str,
    vocabulary: &'static [&'static str],
    /// Also match on an HTTP 5xx status code
    server_errors: bool,
    classification: Classification,
    confidence: Confidence,
    action: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        name: "missing_element",
        vocabulary: &[
            "not found",
            "selector",
            "locator",
            "no element",
            "no such element",
            "unable to find",
            "could not find",
            "text not",
        ],
        server_errors: false,
        classification: Classification::DocIssue,
        confidence: Confidence::High,
        action: "Update the documentation to match the current application",
    },
    Rule {
        name: "infrastructure",
        vocabulary: &[
            "timeout",
            "timed out",
            "disconnect",
            "connection reset",
            "connection refused",
            "network reset",
            "econnreset",
            "net::err",
            "lost session",
            "session lost",
            "loggedout",
            "logged out",
            "target closed",
        ],
        server_errors: false,
        classification: Classification::TestIssue,
        confidence: Confidence::Medium,
        action: "Re-run the check and inspect environment stability",
    },
    Rule {
        name: "application_error",
        vocabulary: &[
            "click failed",
            "failed to click",
            "uncaught",
            "unhandled",
            "exception",
            "error banner",
            "globalerrorbanner",
            "something went wrong",
            "internal server error",
        ],
        server_errors: true,
        classification: Classification::CodeBug,
        confidence: Confidence::Medium,
        action: "File an application bug with the attached artifact",
    },
];

const FALLBACK_ACTION: &str = "Needs manual triage";

/// Matched on word boundaries
const CRITICAL_VOCABULARY: &[&str] = &[
    "auth",
    "authentication",
    "unauthorized",
    "unauthenticated",
    "login",
    "log in",
    "sign in",
    "logged out",
    "loggedout",
    "credential",
    "credentials",
];

const HIGH_VOCABULARY: &[&str] = &[
    "crash",
    "uncaught",
    "panic",
    "internal server error",
];

/// Classifies failures into doc issue, code bug, or test issue
///
/// Pure and total: every failure gets exactly one verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureClassifier;

impl FailureClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, failure: &FailureSource) -> ClassifiedFailure {
        classify(failure)
    }

    pub fn classify_all(&self, failures: &[FailureSource]) -> Vec<ClassifiedFailure> {
        failures.iter().map(classify).collect()
    }
}

/// Classify a single failure
pub fn classify(failure: &FailureSource) -> ClassifiedFailure {
    let detail = failure.detail().to_lowercase();

    let (classification, confidence, action) = match RULES.iter().find(|rule| rule.matches(&detail)) {
        Some(rule) => {
            debug!("{} matched rule {}", failure.name(), rule.name);
            (rule.classification, rule.confidence, rule.action)
        }
        None => (Classification::CodeBug, Confidence::Low, FALLBACK_ACTION),
    };

    let scanned = match failure {
        FailureSource::Verification(_) => detail,
        FailureSource::Test(test) => format!("{} {}", test.name.to_lowercase(), detail),
    };

    ClassifiedFailure {
        classification,
        confidence,
        severity: severity_of(&scanned),
        suggested_action: action.to_string(),
        artifact_path: failure.artifact().map(|path| path.to_path_buf()),
        failure: failure.clone(),
    }
}

impl Rule {
    fn matches(&self, text: &str) -> bool {
        contains_any(text, self.vocabulary) || (self.server_errors && has_server_error(text))
    }
}

fn severity_of(text: &str) -> Severity {
    if CRITICAL_VOCABULARY.iter().any(|word| contains_word(text, word)) {
        Severity::Critical
    } else if contains_any(text, HIGH_VOCABULARY) || has_server_error(text) {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn contains_any(text: &str, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|word| text.contains(word))
}

/// Whether `word` occurs in `text` with no alphanumeric neighbour on either side
fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Whether `text` carries a standalone three-digit 5xx status code
fn has_server_error(text: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token.len() == 3 && token.starts_with('5') && token.bytes().all(|b| b.is_ascii_digit()))
}
