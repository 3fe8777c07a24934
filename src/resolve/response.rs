//! Tolerant parsing of model replies into proposed bindings.
//!
//! Models wrap JSON in prose or fences, emit Python literals, single quotes
//! and trailing commas. Parsing tries the raw reply, a fenced block and the
//! outermost brace slice, each with and without repairs, then falls back to
//! pattern extraction.

use crate::error::ResolverError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex"));
static LINE_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?://|#).*$").expect("valid comment regex"));
static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"));
static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'([^'"\\]*)'"#).expect("valid quote regex"));
static TRUE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bTrue\b").expect("valid literal regex"));
static FALSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bFalse\b").expect("valid literal regex"));
static NONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bNone\b").expect("valid literal regex"));
static BINDING_FALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']symbol["']\s*:\s*["'](\w+)["'][^{}]*?["']source_index["']\s*:\s*["']?(\d+)"#)
        .expect("valid binding fallback regex")
});
static LEGACY_FALLBACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'](\w+)["']\s*:\s*\{[^{}]*?["']defined_in_snippet["']\s*:\s*["']?(\d+)"#)
        .expect("valid legacy fallback regex")
});

const LEGACY_CATEGORIES: [&str; 4] = ["variables", "functions", "classes", "imports"];
const DEFAULT_CONFIDENCE: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.4;

/// A binding as the model stated it, before window validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedBinding {
    pub symbol: String,
    pub source_index: usize,
    pub confidence: f64,
}

pub fn parse_bindings(reply: &str) -> Result<Vec<ProposedBinding>, ResolverError> {
    for candidate in json_candidates(reply) {
        if let Some(value) = parse_lenient(&candidate) {
            if let Some(bindings) = bindings_from_value(&value) {
                return Ok(bindings);
            }
        }
    }

    let recovered = regex_fallback(reply);
    if !recovered.is_empty() {
        tracing::debug!(count = recovered.len(), "recovered bindings from unparseable reply");
        return Ok(recovered);
    }

    let preview: String = reply.chars().take(120).collect();
    Err(ResolverError::Malformed(format!("no bindings found in reply: {preview}")))
}

fn json_candidates(reply: &str) -> Vec<String> {
    let mut candidates = vec![reply.trim().to_string()];
    for caps in FENCE_RE.captures_iter(reply) {
        if let Some(body) = caps.get(1) {
            candidates.push(body.as_str().trim().to_string());
        }
    }
    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            candidates.push(reply[start..=end].to_string());
        }
    }
    candidates
}

fn parse_lenient(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text).ok().or_else(|| serde_json::from_str(&repair(text)).ok())
}

fn repair(text: &str) -> String {
    let text = LINE_COMMENT_RE.replace_all(text, "");
    let text = TRUE_RE.replace_all(&text, "true");
    let text = FALSE_RE.replace_all(&text, "false");
    let text = NONE_RE.replace_all(&text, "null");
    let text = SINGLE_QUOTED_RE.replace_all(&text, "\"$1\"");
    TRAILING_COMMA_RE.replace_all(&text, "$1").into_owned()
}

fn bindings_from_value(value: &Value) -> Option<Vec<ProposedBinding>> {
    let object = value.as_object()?;

    if let Some(items) = object.get("bindings").and_then(Value::as_array) {
        let bindings = items
            .iter()
            .filter_map(|item| {
                let symbol = item.get("symbol").or_else(|| item.get("name"))?.as_str()?;
                let source = item
                    .get("source_index")
                    .or_else(|| item.get("defined_in_snippet"))
                    .and_then(as_index)?;
                let confidence = item.get("confidence").and_then(as_confidence);
                Some(ProposedBinding {
                    symbol: symbol.to_string(),
                    source_index: source,
                    confidence: confidence.unwrap_or(DEFAULT_CONFIDENCE),
                })
            })
            .collect();
        return Some(bindings);
    }

    if !LEGACY_CATEGORIES.iter().any(|c| object.contains_key(*c)) {
        return None;
    }
    let overall = object.get("overall_confidence").and_then(as_confidence);
    let mut bindings = Vec::new();
    for category in LEGACY_CATEGORIES {
        let Some(entries) = object.get(category).and_then(Value::as_object) else {
            continue;
        };
        for (symbol, entry) in entries {
            let Some(source) = entry.get("defined_in_snippet").and_then(as_index) else {
                continue;
            };
            let confidence = entry
                .get("confidence")
                .and_then(as_confidence)
                .or(overall)
                .unwrap_or(DEFAULT_CONFIDENCE);
            bindings.push(ProposedBinding {
                symbol: symbol.clone(),
                source_index: source,
                confidence,
            });
        }
    }
    Some(bindings)
}

fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    let normalized = if raw > 1.0 { raw / 100.0 } else { raw };
    Some(normalized.clamp(0.0, 1.0))
}

fn regex_fallback(reply: &str) -> Vec<ProposedBinding> {
    let mut out = Vec::new();
    for re in [&*BINDING_FALLBACK_RE, &*LEGACY_FALLBACK_RE] {
        for caps in re.captures_iter(reply) {
            let (Some(symbol), Some(index)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Ok(source_index) = index.as_str().parse() else {
                continue;
            };
            if LEGACY_CATEGORIES.contains(&symbol.as_str()) {
                continue;
            }
            out.push(ProposedBinding {
                symbol: symbol.as_str().to_string(),
                source_index,
                confidence: FALLBACK_CONFIDENCE,
            });
        }
        if !out.is_empty() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(symbol: &str, source_index: usize, confidence: f64) -> ProposedBinding {
        ProposedBinding { symbol: symbol.into(), source_index, confidence }
    }

    #[test]
    fn parses_plain_bindings() {
        let reply = r#"{"bindings": [{"symbol": "x", "source_index": 3, "confidence": 0.9}]}"#;
        let out = parse_bindings(reply).expect("parse");
        assert_eq!(out, vec![binding("x", 3, 0.9)]);
    }

    #[test]
    fn parses_fenced_reply_with_prose() {
        let reply = "Sure! Here it is:\n```json\n\
                     {\"bindings\": [{\"symbol\": \"y\", \"source_index\": \"7\"}]}\n\
                     ```\nHope that helps.";
        let out = parse_bindings(reply).expect("parse");
        assert_eq!(out[0].source_index, 7);
        assert_eq!(out[0].confidence, 0.5);
    }

    #[test]
    fn repairs_python_style_json() {
        let reply = "{'variables': {'data': {'defined_in_snippet': 2, 'confidence': 80, \
                     'is_local': False},},\n 'functions': {'load': {'defined_in_snippet': None}}, \
                     'overall_confidence': 0.7}";
        let out = parse_bindings(reply).expect("parse");
        assert_eq!(out, vec![binding("data", 2, 0.8)]);
    }

    #[test]
    fn legacy_shape_uses_overall_confidence() {
        let reply =
            r#"{"classes": {"Widget": {"defined_in_snippet": 4}}, "overall_confidence": 0.65}"#;
        let out = parse_bindings(reply).expect("parse");
        assert_eq!(out[0].symbol, "Widget");
        assert_eq!(out[0].confidence, 0.65);
    }

    #[test]
    fn falls_back_to_pattern_extraction() {
        let reply = r#"garbage {"helper": {"defined_in_snippet": 9, "reason": "def helper(): {"#;
        let out = parse_bindings(reply).expect("fallback");
        assert_eq!(out, vec![binding("helper", 9, 0.4)]);
    }

    #[test]
    fn rejects_replies_without_bindings() {
        let err = parse_bindings("I could not determine anything.").unwrap_err();
        assert!(matches!(err, ResolverError::Malformed(_)));
        assert!(parse_bindings(r#"{"answer": 42}"#).is_err());
    }
}
