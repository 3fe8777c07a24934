//! Prompt construction for the chat-completion resolver.

use super::ResolveRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static DECORATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*@[A-Za-z_][\w.]*").expect("valid decorator regex"));
static INHERITANCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*class\s+\w+\s*\(\s*([A-Za-z_][\w.]*)").expect("valid inheritance regex")
});
static WITH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:async\s+)?with\s").expect("valid with regex"));
static COMPREHENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\[{(][^\[\]{}()]*\bfor\b[^\[\]{}()]*\bin\b").expect("valid comprehension regex")
});
static FSTRING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b[fF][rR]?["']"#).expect("valid f-string regex"));

static FRAMEWORKS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("flask", r"from flask import|@app\.route\s*\(|\bFlask\s*\(|\bjsonify\s*\("),
        ("django", r"from django|models\.Model|\bHttpResponse\b"),
        ("fastapi", r"from fastapi|@app\.(?:get|post|put|delete)\b|\bFastAPI\s*\(|\bDepends\s*\("),
        ("pandas", r"import pandas|\bpd\.|\bDataFrame\s*\(|\.read_csv\s*\("),
        ("numpy", r"import numpy|\bnp\."),
        ("sqlalchemy", r"from sqlalchemy|\bColumn\s*\(|\brelationship\s*\("),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid framework regex")))
    .collect()
});

/// Language features in the target that commonly hide dependencies.
pub fn detect_pattern_hints(source: &str) -> Vec<String> {
    let mut hints = Vec::new();
    if DECORATOR_RE.is_match(source) {
        hints.push("decorators: decorator functions may be defined elsewhere".to_string());
    }
    let bases: Vec<&str> = INHERITANCE_RE
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|base| *base != "object")
        .collect();
    if !bases.is_empty() {
        hints.push(format!("inheritance: parent classes {}", bases.join(", ")));
    }
    if WITH_RE.is_match(source) {
        hints.push("context managers: 'with' targets may need setup".to_string());
    }
    if COMPREHENSION_RE.is_match(source) {
        hints.push("comprehensions: check closure variables".to_string());
    }
    if FSTRING_RE.is_match(source) {
        hints.push("f-strings: names embedded in formatted strings".to_string());
    }
    let frameworks: Vec<&str> =
        FRAMEWORKS.iter().filter(|(_, re)| re.is_match(source)).map(|(name, _)| *name).collect();
    if !frameworks.is_empty() {
        hints.push(format!("frameworks: {}", frameworks.join(", ")));
    }
    hints
}

pub const SYSTEM_PROMPT: &str = "You locate where Python names are defined across snippets \
extracted from one source file. Answer with JSON only.";

pub fn build_prompt(request: &ResolveRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "The snippets below come from one Python file, in file order. The target snippet \
         fails to run on its own because some names are not defined in it."
    );
    out.push('\n');

    for snippet in &request.snippets {
        if snippet.index == request.target.index {
            let _ = writeln!(out, "## Snippet {} >>> TARGET <<<", snippet.index);
        } else {
            let offset = snippet.index as i64 - request.target.index as i64;
            let _ = writeln!(out, "## Snippet {} ({:+})", snippet.index, offset);
        }
        let _ = writeln!(out, "```python\n{}\n```\n", snippet.content.trim_end());
    }

    let names: Vec<String> =
        request.unresolved.iter().map(|s| format!("{} ({})", s.name, s.kind)).collect();
    let _ = writeln!(out, "Names to locate: {}", names.join(", "));
    if !request.pattern_hints.is_empty() {
        let _ = writeln!(out, "Observed patterns:");
        for hint in &request.pattern_hints {
            let _ = writeln!(out, "- {hint}");
        }
    }
    let _ = writeln!(
        out,
        "\nReply with a single JSON object:\n\
         {{\"bindings\": [{{\"symbol\": \"<name>\", \"source_index\": <snippet number>, \
         \"confidence\": <0.0-1.0>}}]}}\n\
         Use only snippet numbers shown above ({}..={}). Leave out names you cannot place.",
        request.window.lower, request.window.upper
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Window;
    use crate::domain::{Snippet, SymbolKind, SymbolReference};

    #[test]
    fn detects_language_patterns() {
        let hints = detect_pattern_hints(
            "@app.route('/')\nclass View(Base):\n    def get(self):\n        return f\"{x}\"\n",
        );
        assert!(hints.iter().any(|h| h.starts_with("decorators")));
        assert!(hints.iter().any(|h| h == "inheritance: parent classes Base"));
        assert!(hints.iter().any(|h| h.starts_with("f-strings")));
        assert!(detect_pattern_hints("print(1)").is_empty());
    }

    #[test]
    fn detects_frameworks() {
        let hints = detect_pattern_hints("df = pd.DataFrame(rows)\narr = np.zeros(3)\n");
        assert!(hints.contains(&"frameworks: pandas, numpy".to_string()));
    }

    #[test]
    fn prompt_marks_target_and_offsets() {
        let request = ResolveRequest {
            target: Snippet::new(5, "print(x)"),
            window: Window { lower: 3, upper: 6 },
            snippets: vec![
                Snippet::new(3, "x = 1"),
                Snippet::new(5, "print(x)"),
                Snippet::new(6, "y = 2"),
            ],
            unresolved: vec![SymbolReference::new("x", SymbolKind::Variable)],
            pattern_hints: vec![],
            budget_remaining: 1.0,
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("## Snippet 3 (-2)"));
        assert!(prompt.contains("## Snippet 5 >>> TARGET <<<"));
        assert!(prompt.contains("## Snippet 6 (+1)"));
        assert!(prompt.contains("Names to locate: x (variable)"));
        assert!(prompt.contains("(3..=6)"));
    }
}
