//! # claimcheck-triage
//!
//! Turns failed claims and failed end-to-end tests into actionable buckets.
//!
//! [`FailureClassifier`] decides whether a failure points at stale
//! documentation, a bug in the application, or an unreliable test
//! environment. [`ReportWriter`] persists the verdicts next to the run's
//! other artifacts.

mod classifier;
mod report;

pub use classifier::{classify, FailureClassifier};
pub use report::{ReportPaths, ReportWriter, RunSummary};
