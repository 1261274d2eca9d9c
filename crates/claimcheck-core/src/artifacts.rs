//! Artifact storage - diagnostic screenshots, classifications, reports
//!
//! Layout under the artifacts directory:
//!
//! ```text
//! {artifacts_dir}/
//!   screenshots/{timestamp}-{slug}.png
//!   classifications/{slug}.json
//!   report.json
//!   report.md
//! ```

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::Result;

/// Types of stored artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Page screenshot captured on a failed navigation
    Screenshot,
    /// Per-failure classification record
    Classification,
}

impl ArtifactKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Screenshot => "screenshots",
            Self::Classification => "classifications",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Screenshot => "png",
            Self::Classification => "json",
        }
    }
}

/// Turn a human-readable name into a file-name-safe slug
///
/// Lowercases, replaces every run of non-alphanumeric characters with a
/// single `-`, and caps the length at 80 characters.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= 80 {
            break;
        }
    }

    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}

/// Manages artifact paths and writes under one base directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Stable path for a named artifact: `{kind_dir}/{slug}.{ext}`
    pub fn path_for(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.base_dir
            .join(kind.dir_name())
            .join(format!("{}.{}", slugify(name), kind.extension()))
    }

    /// Timestamped path for an artifact that may be captured repeatedly
    pub fn timestamped_path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%3f");
        self.base_dir.join(kind.dir_name()).join(format!(
            "{}-{}.{}",
            timestamp,
            slugify(name),
            kind.extension()
        ))
    }

    /// Create the directory holding artifacts of `kind`
    pub async fn ensure_dir(&self, kind: ArtifactKind) -> Result<PathBuf> {
        let dir = self.base_dir.join(kind.dir_name());
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Serialize `value` as pretty JSON to `path`, creating parent directories
    pub async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        fs::write(path, content).await?;
        debug!("Wrote artifact {}", path.display());
        Ok(())
    }

    /// Write text to a path relative to the base directory
    pub async fn write_text(&self, relative: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).await?;
        let path = self.base_dir.join(relative);
        fs::write(&path, content).await?;
        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }
}
