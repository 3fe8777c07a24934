//! Shared CLI utilities.

use crate::domain::{Snippet, SnippetSequence};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Parse a comma-separated string into a `Vec<String>`, trimming whitespace and
/// discarding empty segments. Returns `None` when `value` is `None`.
pub fn parse_csv(value: &Option<String>) -> Option<Vec<String>> {
    value.as_ref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
    })
}

#[derive(Deserialize)]
struct RawSnippet {
    content: String,
    #[serde(default)]
    index: Option<usize>,
}

/// Read snippets from a JSON array or a JSONL file of `{content, index}`.
/// A missing `index` falls back to the entry's position.
pub fn load_snippets(path: &Path) -> Result<SnippetSequence> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed reading snippets: {}", path.display()))?;

    let raw: Vec<RawSnippet> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid JSON snippet array: {}", path.display()))?
    } else {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Invalid JSONL entry at {}:{}", path.display(), n + 1))
            })
            .collect::<Result<_>>()?
    };

    let snippets = raw
        .into_iter()
        .enumerate()
        .map(|(position, r)| Snippet::new(r.index.unwrap_or(position), r.content))
        .collect();
    SnippetSequence::new(snippets)
        .with_context(|| format!("Invalid snippet sequence in {}", path.display()))
}
