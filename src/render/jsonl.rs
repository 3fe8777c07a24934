//! Augmented snippet JSONL

use crate::pipeline::AnalysisOutcome;
use serde_json::Value;
use std::collections::BTreeMap;

/// One `{content, index, status}` line per outcome, ascending by index.
pub fn render_augmented_jsonl(outcomes: &[AnalysisOutcome]) -> String {
    let mut sorted: Vec<&AnalysisOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.index);

    let mut lines = Vec::with_capacity(sorted.len());
    for outcome in sorted {
        // BTreeMap keeps keys in alphabetical order
        let mut entry: BTreeMap<&str, Value> = BTreeMap::new();
        entry.insert("content", Value::String(outcome.augmented.clone()));
        entry.insert("index", Value::Number(outcome.index.into()));
        entry.insert("status", Value::String(outcome.result.status.as_str().to_string()));

        if let Ok(line) = serde_json::to_string(&entry) {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}
