//! Mapping from documentation files to the page they describe

use std::collections::BTreeMap;

/// Resolves the primary route a documentation file is about
///
/// Explicit prefix mappings win, longest prefix first. Otherwise the first
/// path component that names a known route segment is used, and `/` when
/// nothing matches.
#[derive(Debug, Clone, Default)]
pub struct PageMap {
    explicit: Vec<(String, String)>,
    route_segments: Vec<String>,
}

impl PageMap {
    pub fn new(pages: &BTreeMap<String, String>, route_segments: &[String]) -> Self {
        let mut explicit: Vec<(String, String)> = pages
            .iter()
            .map(|(prefix, route)| (normalize(prefix), route.clone()))
            .collect();
        explicit.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Self {
            explicit,
            route_segments: route_segments.to_vec(),
        }
    }

    pub fn primary_route(&self, source_file: &str) -> String {
        let path = normalize(source_file);

        if let Some((_, route)) = self
            .explicit
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
        {
            return route.clone();
        }

        path.split('/')
            .map(file_stem)
            .find(|component| self.route_segments.iter().any(|s| s == component))
            .map(|segment| format!("/{}", segment))
            .unwrap_or_else(|| "/".to_string())
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches("./").to_string()
}

fn file_stem(component: &str) -> &str {
    match component.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => component,
    }
}
