//! Claim extraction from documentation text
//!
//! Extraction works line by line with a fixed set of patterns. Fenced code
//! blocks are skipped entirely, and inline code spans are removed before
//! emphasis is scanned, so command examples never turn into UI claims.

use claimcheck_core::config::ExtractConfig;
use claimcheck_core::{Claim, ClaimKind, ClaimcheckError, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

/// Characters that mark emphasized text as prose rather than a label
const SENTENCE_PUNCTUATION: &[char] = &['.', '!', '?', ';', ':'];

/// Extracts typed claims from markdown documentation
#[derive(Debug, Clone)]
pub struct ClaimExtractor {
    link_target: Regex,
    src_attribute: Regex,
    inline_code: Regex,
    emphasis: Regex,
    action_verb: Option<Regex>,
    asset_prefix: String,
    route_segments: HashSet<String>,
    workspace_placeholders: Vec<String>,
    ui_text_max_len: usize,
}

impl ClaimExtractor {
    /// Compile the extraction patterns for `config`
    ///
    /// Fails only when the configured action verbs do not form a valid
    /// pattern.
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let verbs: Vec<String> = config
            .action_verbs
            .iter()
            .map(|verb| verb.trim())
            .filter(|verb| !verb.is_empty())
            .map(regex::escape)
            .collect();

        let action_verb = if verbs.is_empty() {
            None
        } else {
            Some(compile(&format!(
                r"(?i)\b(?:{})(?:s|es|ed|ing)?\b",
                verbs.join("|")
            ))?)
        };

        Ok(Self {
            link_target: compile(r#"!?\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)?,
            src_attribute: compile(r#"src\s*=\s*["']([^"']+)["']"#)?,
            inline_code: compile(r"`([^`]+)`")?,
            emphasis: compile(r"\*\*([^*]+)\*\*|__([^_]+)__|\*([^*\s][^*]*)\*")?,
            action_verb,
            asset_prefix: config.asset_prefix.clone(),
            route_segments: config.route_segments.iter().cloned().collect(),
            workspace_placeholders: config.workspace_placeholders.clone(),
            ui_text_max_len: config.ui_text_max_len,
        })
    }

    /// Extract every claim in `text`, in source order
    ///
    /// Never fails: lines that match no pattern, or match ambiguously,
    /// produce no claim.
    pub fn extract(&self, text: &str, source_file: &str) -> Vec<Claim> {
        let mut claims = Vec::new();
        let mut in_fence = false;

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            let line_number = index + 1;
            let mut push = |kind: ClaimKind, value: String| {
                claims.push(Claim::new(kind, value, source_file, line_number));
            };

            for asset in self.assets_in(line) {
                push(ClaimKind::Asset, asset);
            }
            for route in self.routes_in(line) {
                push(ClaimKind::Route, route);
            }
            for label in self.ui_text_in(line) {
                push(ClaimKind::UiText, label);
            }
        }

        debug!("Extracted {} claim(s) from {}", claims.len(), source_file);
        claims
    }

    fn assets_in(&self, line: &str) -> Vec<String> {
        let links = self.link_target.captures_iter(line);
        let sources = self.src_attribute.captures_iter(line);

        let mut assets: Vec<String> = Vec::new();
        for captures in links.chain(sources) {
            if let Some(asset) = captures.get(1).and_then(|m| self.asset_path(m.as_str())) {
                if !assets.contains(&asset) {
                    assets.push(asset);
                }
            }
        }
        assets
    }

    fn asset_path(&self, target: &str) -> Option<String> {
        let path = target.split(['?', '#']).next().unwrap_or("");
        if self.asset_prefix.is_empty()
            || !path.starts_with(&self.asset_prefix)
            || path.len() == self.asset_prefix.len()
            || path.contains("://")
        {
            return None;
        }
        Some(path.to_string())
    }

    fn routes_in(&self, line: &str) -> Vec<String> {
        self.inline_code
            .captures_iter(line)
            .filter_map(|captures| captures.get(1))
            .filter_map(|code| self.route_path(code.as_str().trim()))
            .collect()
    }

    /// Normalize an inline-code span into a whitelisted route
    ///
    /// `/{workspace}/agents/` becomes `/agents`. Spans with any other
    /// placeholder left after stripping are ambiguous and yield nothing.
    fn route_path(&self, code: &str) -> Option<String> {
        if !code.starts_with('/') || code.starts_with("//") || code.chars().any(char::is_whitespace) {
            return None;
        }

        let segments: Vec<&str> = code
            .split('/')
            .filter(|segment| !segment.is_empty())
            .filter(|segment| !self.workspace_placeholders.iter().any(|p| p == segment))
            .collect();

        let first = segments.first()?;
        if !self.route_segments.contains(*first) {
            return None;
        }
        if segments.iter().any(|segment| looks_like_placeholder(segment)) {
            return None;
        }

        Some(format!("/{}", segments.join("/")))
    }

    fn ui_text_in(&self, line: &str) -> Vec<String> {
        let Some(action_verb) = &self.action_verb else {
            return Vec::new();
        };

        let prose = self.inline_code.replace_all(line, "");
        if !action_verb.is_match(&prose) {
            return Vec::new();
        }

        self.emphasis
            .captures_iter(&prose)
            .filter_map(|captures| captures.iter().skip(1).flatten().next())
            .map(|m| m.as_str().trim().to_string())
            .filter(|text| self.is_ui_label(text))
            .collect()
    }

    fn is_ui_label(&self, text: &str) -> bool {
        !text.is_empty()
            && text.chars().count() <= self.ui_text_max_len
            && !text.contains(SENTENCE_PUNCTUATION)
    }
}

fn looks_like_placeholder(segment: &str) -> bool {
    segment.starts_with(':') || segment.contains(['{', '}', '<', '>', '[', ']'])
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ClaimcheckError::Config(format!("Invalid pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ClaimExtractor {
        ClaimExtractor::new(&ExtractConfig::default()).unwrap()
    }

    fn values(claims: &[Claim], kind: ClaimKind) -> Vec<&str> {
        claims
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.value.as_str())
            .collect()
    }

    #[test]
    fn test_plain_prose_has_no_claims() {
        let text = "# Overview\n\nThis page explains how things work.\n\nNothing else here.\n";
        assert!(extractor().extract(text, "docs/overview.md").is_empty());
        assert!(extractor().extract("", "docs/empty.md").is_empty());
    }

    #[test]
    fn test_image_asset_with_location() {
        let text = "Intro\n\n![Agent list](/screenshots/agents/list.png)\n";
        let claims = extractor().extract(text, "docs/agents.md");

        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimKind::Asset);
        assert_eq!(claims[0].value, "/screenshots/agents/list.png");
        assert_eq!(claims[0].source_file, "docs/agents.md");
        assert_eq!(claims[0].source_line, 3);
    }

    #[test]
    fn test_asset_query_and_fragment_stripped() {
        let text = r#"<img src="/screenshots/a.png?v=2" /> and [full](/screenshots/b.png#zoom)"#;
        let claims = extractor().extract(text, "a.md");
        assert_eq!(
            values(&claims, ClaimKind::Asset),
            vec!["/screenshots/b.png", "/screenshots/a.png"]
        );
    }

    #[test]
    fn test_assets_outside_prefix_ignored() {
        let text = "![logo](/images/logo.png) ![remote](https://cdn.test/screenshots/x.png)";
        assert!(extractor().extract(text, "a.md").is_empty());
    }

    #[test]
    fn test_route_from_inline_code() {
        let text = "Open `/agents/templates/` to browse templates.";
        let claims = extractor().extract(text, "docs/agents.md");
        assert_eq!(values(&claims, ClaimKind::Route), vec!["/agents/templates"]);
    }

    #[test]
    fn test_route_workspace_placeholder_stripped() {
        let text = "Go to `/{workspace}/settings/members` or `/:workspaceId/billing`.";
        let claims = extractor().extract(text, "docs/settings.md");
        assert_eq!(
            values(&claims, ClaimKind::Route),
            vec!["/settings/members", "/billing"]
        );
    }

    #[test]
    fn test_route_rejects_unknown_and_ambiguous() {
        let text = "`/api/v1/agents` `/agents/{agentId}` `cargo run` `/etc/hosts` `/agents now`";
        assert!(values(&extractor().extract(text, "a.md"), ClaimKind::Route).is_empty());
    }

    #[test]
    fn test_ui_text_requires_action_verb() {
        let text = "Click **Create agent** to start.\nThis is **important** context.\n";
        let claims = extractor().extract(text, "docs/agents.md");
        assert_eq!(values(&claims, ClaimKind::UiText), vec!["Create agent"]);
        assert_eq!(claims[0].source_line, 1);
    }

    #[test]
    fn test_ui_text_bounds() {
        let text = "Select *Members* then press the button labelled **Note: this is a sentence.** \
                    or the **An extremely long emphasized phrase that is not a label** button.";
        let claims = extractor().extract(text, "a.md");
        assert_eq!(values(&claims, ClaimKind::UiText), vec!["Members"]);
    }

    #[test]
    fn test_ui_text_ignores_inline_code() {
        let text = "Click the button after running `echo **not a label**`.";
        assert!(extractor().extract(text, "a.md").is_empty());
    }

    #[test]
    fn test_action_verb_whole_word() {
        let text = "Tablets show **Overview** differently.";
        assert!(extractor().extract(text, "a.md").is_empty());

        let text = "Open the **Overview** tab.";
        assert_eq!(
            values(&extractor().extract(text, "a.md"), ClaimKind::UiText),
            vec!["Overview"]
        );
    }

    #[test]
    fn test_fenced_code_skipped() {
        let text = "\
Before
```bash
curl /screenshots/a.png
echo `/agents`
click **Save**
```
After ![shot](/screenshots/after.png)
";
        let claims = extractor().extract(text, "a.md");
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].value, "/screenshots/after.png");
        assert_eq!(claims[0].source_line, 7);
    }

    #[test]
    fn test_mixed_line_order() {
        let text = "Click **Save** on `/settings` ![s](/screenshots/settings.png)";
        let kinds: Vec<ClaimKind> = extractor()
            .extract(text, "a.md")
            .into_iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![ClaimKind::Asset, ClaimKind::Route, ClaimKind::UiText]);
    }

    #[test]
    fn test_no_action_verbs_disables_ui_text() {
        let config = ExtractConfig {
            action_verbs: Vec::new(),
            ..ExtractConfig::default()
        };
        let extractor = ClaimExtractor::new(&config).unwrap();
        assert!(extractor.extract("Click **Save**", "a.md").is_empty());
    }
}
