//! Core domain types shared across the pipeline.

use crate::error::{ConfigError, ContractError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// One independently extracted unit of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub content: String,
    pub index: usize,
}

impl Snippet {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self { content: content.into(), index }
    }
}

/// Immutable, index-ordered snippet list as produced by the splitter.
///
/// Indices must be unique but need not be contiguous; lookups are binary
/// searches over the sorted list.
#[derive(Debug, Clone, Default)]
pub struct SnippetSequence {
    snippets: Vec<Snippet>,
}

impl SnippetSequence {
    pub fn new(mut snippets: Vec<Snippet>) -> Result<Self, ContractError> {
        snippets.sort_by_key(|s| s.index);
        if let Some(pair) = snippets.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(ContractError::DuplicateIndex(pair[0].index));
        }
        Ok(Self { snippets })
    }

    pub fn get(&self, index: usize) -> Option<&Snippet> {
        self.snippets
            .binary_search_by_key(&index, |s| s.index)
            .ok()
            .map(|pos| &self.snippets[pos])
    }

    /// Snippets whose index lies in `[lower, upper]`, ascending.
    pub fn range(&self, lower: usize, upper: usize) -> &[Snippet] {
        let start = self.snippets.partition_point(|s| s.index < lower);
        let end = self.snippets.partition_point(|s| s.index <= upper);
        &self.snippets[start..end.max(start)]
    }

    pub fn first_index(&self) -> Option<usize> {
        self.snippets.first().map(|s| s.index)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.snippets.last().map(|s| s.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets.iter()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.snippets.iter().map(|s| s.index).collect()
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Variable,
    Function,
    Class,
    Import,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Import => "import",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolReference {
    pub name: String,
    pub kind: SymbolKind,
}

impl SymbolReference {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self { name: name.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Static,
    External,
}

/// A proposed binding of a symbol to the snippet that defines it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub symbol: String,
    pub kind: SymbolKind,
    pub source_index: usize,
    pub confidence: f64,
    pub origin: Origin,
    /// Snippet whose free name this record satisfies; `None` for the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_by: Option<usize>,
}

impl DependencyRecord {
    pub fn exact(symbol: impl Into<String>, kind: SymbolKind, source_index: usize) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            source_index,
            confidence: 1.0,
            origin: Origin::Static,
            required_by: None,
        }
    }
}

/// Coarse value category used to pick a placeholder generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueCategory {
    Sequence,
    Mapping,
    Text,
    Integer,
    Float,
    Boolean,
    Callable,
    Class,
    Module,
    Object,
}

impl ValueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueCategory::Sequence => "sequence",
            ValueCategory::Mapping => "mapping",
            ValueCategory::Text => "text",
            ValueCategory::Integer => "integer",
            ValueCategory::Float => "float",
            ValueCategory::Boolean => "boolean",
            ValueCategory::Callable => "callable",
            ValueCategory::Class => "class",
            ValueCategory::Module => "module",
            ValueCategory::Object => "object",
        }
    }
}

/// A synthesized stand-in for a symbol with no located definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub symbol: String,
    pub category: ValueCategory,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_by: Option<usize>,
}

/// Everything needed to make a target runnable, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextPlan {
    pub snippet_order: Vec<usize>,
    pub placeholders: Vec<Placeholder>,
    pub imports: Vec<String>,
    /// Assembled source text; empty when the plan is empty.
    pub prelude: String,
}

impl ContextPlan {
    pub fn is_empty(&self) -> bool {
        self.snippet_order.is_empty() && self.placeholders.is_empty() && self.imports.is_empty()
    }

    /// Prelude followed by the target, or the target untouched for an empty plan.
    pub fn augment(&self, target: &str) -> String {
        if self.prelude.trim().is_empty() {
            return target.to_string();
        }
        format!("{}\n\n{}", self.prelude.trim_end(), target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    SyntaxError,
    Unsafe,
    Unresolved,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "ok",
            ValidationStatus::SyntaxError => "syntax_error",
            ValidationStatus::Unsafe => "unsafe",
            ValidationStatus::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub overall: f64,
    pub min: f64,
    pub static_count: usize,
    pub external_count: usize,
    pub placeholder_count: usize,
}

impl ConfidenceSummary {
    /// Mean over resolved records and placeholders; 1.0 when nothing was needed.
    pub fn from_parts(
        records: &[DependencyRecord],
        placeholders: usize,
        placeholder_confidence: f64,
    ) -> Self {
        let static_count = records.iter().filter(|r| r.origin == Origin::Static).count();
        let external_count = records.len() - static_count;
        let total = records.len() + placeholders;
        if total == 0 {
            return Self {
                overall: 1.0,
                min: 1.0,
                static_count,
                external_count,
                placeholder_count: 0,
            };
        }
        let sum: f64 = records.iter().map(|r| r.confidence).sum::<f64>()
            + placeholders as f64 * placeholder_confidence;
        let mut min = records.iter().map(|r| r.confidence).fold(1.0_f64, f64::min);
        if placeholders > 0 {
            min = min.min(placeholder_confidence);
        }
        Self {
            overall: round3(sum / total as f64),
            min: round3(min),
            static_count,
            external_count,
            placeholder_count: placeholders,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Terminal artifact of one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub diagnostics: Vec<String>,
    pub resolved_dependencies: Vec<DependencyRecord>,
    pub unresolved_symbols: Vec<String>,
    pub confidence_summary: ConfidenceSummary,
    pub used_external: bool,
}

/// How much of a covering snippet ends up in the prelude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreludeMode {
    /// Every top-level statement of each covering snippet.
    #[default]
    All,
    /// Imports, definitions and assignments only; bare expressions are dropped.
    Definitions,
}

/// Run-wide analysis settings. Constructed once and shared by every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window_size: usize,
    pub max_window_expansion: usize,
    pub enable_external_resolver: bool,
    #[serde(alias = "external_timeout")]
    pub external_timeout_secs: f64,
    pub external_max_retries: u32,
    pub external_cost_budget: f64,
    pub external_endpoint: String,
    pub external_model: String,
    pub external_api_key_env: String,
    pub external_price_per_1k_tokens: f64,
    pub external_min_confidence: f64,
    pub external_max_concurrency: usize,
    pub external_override_threshold: Option<f64>,
    pub request_deadline_secs: Option<f64>,
    #[serde(deserialize_with = "deserialize_string_or_list")]
    pub deny_list: Vec<String>,
    pub synthesize_placeholders: bool,
    pub placeholder_overrides: BTreeMap<String, String>,
    pub prelude_mode: PreludeMode,
    pub enable_cache: bool,
    pub concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            max_window_expansion: 40,
            enable_external_resolver: true,
            external_timeout_secs: 30.0,
            external_max_retries: 2,
            external_cost_budget: 5.0,
            external_endpoint: "https://api.groq.com/openai".to_string(),
            external_model: "llama-3.1-8b-instant".to_string(),
            external_api_key_env: "GROQ_API_KEY".to_string(),
            external_price_per_1k_tokens: 0.0001,
            external_min_confidence: 0.3,
            external_max_concurrency: 2,
            external_override_threshold: None,
            request_deadline_secs: None,
            deny_list: default_deny_list(),
            synthesize_placeholders: true,
            placeholder_overrides: BTreeMap::new(),
            prelude_mode: PreludeMode::All,
            enable_cache: true,
            concurrency: 4,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.external_timeout_secs <= 0.0 || !self.external_timeout_secs.is_finite() {
            return Err(ConfigError::NotPositive {
                field: "external_timeout_secs",
                value: self.external_timeout_secs,
            });
        }
        if let Some(deadline) = self.request_deadline_secs {
            if deadline <= 0.0 {
                return Err(ConfigError::NotPositive {
                    field: "request_deadline_secs",
                    value: deadline,
                });
            }
        }
        if self.external_cost_budget < 0.0 {
            return Err(ConfigError::Negative {
                field: "external_cost_budget",
                value: self.external_cost_budget,
            });
        }
        if self.external_price_per_1k_tokens < 0.0 {
            return Err(ConfigError::Negative {
                field: "external_price_per_1k_tokens",
                value: self.external_price_per_1k_tokens,
            });
        }
        if !(0.0..=1.0).contains(&self.external_min_confidence) {
            return Err(ConfigError::OutOfUnitRange {
                field: "external_min_confidence",
                value: self.external_min_confidence,
            });
        }
        if let Some(threshold) = self.external_override_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::OutOfUnitRange {
                    field: "external_override_threshold",
                    value: threshold,
                });
            }
        }
        if self.concurrency == 0 {
            return Err(ConfigError::NotPositive { field: "concurrency", value: 0.0 });
        }
        if self.external_max_concurrency == 0 {
            return Err(ConfigError::NotPositive { field: "external_max_concurrency", value: 0.0 });
        }
        Ok(())
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.external_timeout_secs)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_secs.map(Duration::from_secs_f64)
    }

    /// Expansion ceiling, never narrower than the base window.
    pub fn expansion_cap(&self) -> usize {
        self.max_window_expansion.max(self.window_size)
    }

    pub fn to_report_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub fn default_deny_list() -> Vec<String> {
    [
        "eval",
        "exec",
        "compile",
        "__import__",
        "os.system",
        "os.popen",
        "os.remove",
        "os.unlink",
        "os.rmdir",
        "os.removedirs",
        "os.execv",
        "os.spawnl",
        "subprocess",
        "shutil.rmtree",
        "shutil.move",
        "socket",
        "urllib.request",
        "http.client",
        "requests",
        "open(write)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Accept `"a, b"` or `["a", "b"]`, trimming and dropping empties.
fn deserialize_string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let raw = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
        StringOrList::Many(items) => items,
    };
    let mut out: Vec<String> = Vec::new();
    for item in raw {
        let trimmed = item.trim();
        if !trimmed.is_empty() && !out.iter().any(|existing| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    Ok(out)
}
