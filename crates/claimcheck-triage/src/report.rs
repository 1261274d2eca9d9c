//! Run summaries and report artifacts

use chrono::{DateTime, Utc};
use claimcheck_core::{
    slugify, ArtifactKind, ArtifactStore, ClassifiedFailure, Result, VerificationResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Totals for one verification or classification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Claims checked; zero for runs that only classify test failures
    pub checked: usize,
    pub verified: usize,
    pub failures: usize,
    pub by_classification: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
}

impl RunSummary {
    pub fn new(
        started_at: DateTime<Utc>,
        results: &[VerificationResult],
        classified: &[ClassifiedFailure],
    ) -> Self {
        let mut by_classification = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for failure in classified {
            *by_classification
                .entry(failure.classification.to_string())
                .or_insert(0) += 1;
            *by_severity.entry(failure.severity.to_string()).or_insert(0) += 1;
        }

        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            checked: results.len(),
            verified: results.iter().filter(|r| r.verified).count(),
            failures: classified.len(),
            by_classification,
            by_severity,
        }
    }

    /// Process exit code: non-zero only in strict mode with failures
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && self.failures > 0 {
            1
        } else {
            0
        }
    }
}

/// Paths written by [`ReportWriter::write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub classifications: Vec<PathBuf>,
    pub json: PathBuf,
    pub markdown: PathBuf,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    summary: &'a RunSummary,
    results: &'a [VerificationResult],
    failures: &'a [ClassifiedFailure],
}

/// Writes per-failure classifications and the run report
pub struct ReportWriter {
    store: ArtifactStore,
}

impl ReportWriter {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub async fn write(
        &self,
        summary: &RunSummary,
        results: &[VerificationResult],
        failures: &[ClassifiedFailure],
    ) -> Result<ReportPaths> {
        let classifications = self.write_classifications(failures).await?;

        let json = self.store.base_dir().join("report.json");
        let document = ReportDocument {
            summary,
            results,
            failures,
        };
        self.store.write_json(&json, &document).await?;

        let markdown = self
            .store
            .write_text("report.md", &render_markdown(summary, failures))
            .await?;

        info!(
            "Wrote report for run {} ({} failure(s)) to {}",
            summary.run_id,
            summary.failures,
            self.store.base_dir().display()
        );

        Ok(ReportPaths {
            classifications,
            json,
            markdown,
        })
    }

    /// One JSON file per failure, named after the failure
    ///
    /// Failures with the same slug get `-2`, `-3`, ... suffixes in order.
    pub async fn write_classifications(&self, failures: &[ClassifiedFailure]) -> Result<Vec<PathBuf>> {
        let dir = self.store.ensure_dir(ArtifactKind::Classification).await?;
        let extension = ArtifactKind::Classification.extension();

        let mut used: HashSet<String> = HashSet::new();
        let mut paths = Vec::with_capacity(failures.len());
        for failure in failures {
            let slug = unique_slug(&slugify(&failure.failure.name()), &mut used);
            let path = dir.join(format!("{}.{}", slug, extension));
            self.store.write_json(&path, failure).await?;
            paths.push(path);
        }
        Ok(paths)
    }
}

fn unique_slug(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn render_markdown(summary: &RunSummary, failures: &[ClassifiedFailure]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# claimcheck report\n");
    let _ = writeln!(out, "Run `{}` finished {}\n", summary.run_id, summary.finished_at.to_rfc3339());
    let _ = writeln!(
        out,
        "- Checked: {}\n- Verified: {}\n- Failures: {}\n",
        summary.checked, summary.verified, summary.failures
    );

    if !summary.by_classification.is_empty() {
        let _ = writeln!(out, "## By classification\n");
        for (classification, count) in &summary.by_classification {
            let _ = writeln!(out, "- {}: {}", classification, count);
        }
        let _ = writeln!(out);
    }

    if !summary.by_severity.is_empty() {
        let _ = writeln!(out, "## By severity\n");
        for (severity, count) in &summary.by_severity {
            let _ = writeln!(out, "- {}: {}", severity, count);
        }
        let _ = writeln!(out);
    }

    if failures.is_empty() {
        let _ = writeln!(out, "No failures.");
        return out;
    }

    let mut ordered: Vec<&ClassifiedFailure> = failures.iter().collect();
    ordered.sort_by_key(|f| f.severity);

    let _ = writeln!(out, "## Failures\n");
    let _ = writeln!(out, "| Severity | Classification | Confidence | Failure | Detail | Action |");
    let _ = writeln!(out, "|---|---|---|---|---|---|");
    for failure in ordered {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            failure.severity,
            failure.classification,
            failure.confidence,
            escape_cell(&failure.failure.name()),
            escape_cell(failure.failure.detail()),
            failure.suggested_action
        );
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
