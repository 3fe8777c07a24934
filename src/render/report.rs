//! Report JSON generation.

use crate::domain::{ValidationStatus, REPORT_SCHEMA_VERSION};
use crate::pipeline::AnalysisOutcome;
use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// External resolver spend for the run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExternalUsage {
    pub calls: u64,
    pub spent_usd: f64,
}

pub fn build_report(
    outcomes: &[AnalysisOutcome],
    config: &Value,
    usage: ExternalUsage,
    include_timestamp: bool,
) -> Value {
    let mut sorted: Vec<&AnalysisOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.index);

    let mut report = Map::new();
    report.insert("schema_version".to_string(), Value::String(REPORT_SCHEMA_VERSION.to_string()));
    if include_timestamp {
        report.insert(
            "generated_at".to_string(),
            Value::String(Utc::now().format("%Y-%m-%dT%H:%M:%S+00:00").to_string()),
        );
    }
    report.insert("config".to_string(), config.clone());
    report.insert("summary".to_string(), summary(&sorted, usage));
    report.insert("entries".to_string(), Value::Array(sorted.iter().map(|o| entry(o)).collect()));
    Value::Object(report)
}

pub fn write_report(
    report_path: &Path,
    outcomes: &[AnalysisOutcome],
    config: &Value,
    usage: ExternalUsage,
    include_timestamp: bool,
) -> Result<()> {
    let report = build_report(outcomes, config, usage, include_timestamp);
    if let Some(parent) = report_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
    Ok(())
}

fn summary(outcomes: &[&AnalysisOutcome], usage: ExternalUsage) -> Value {
    let mut by_status: BTreeMap<&str, usize> = [
        ValidationStatus::Ok,
        ValidationStatus::SyntaxError,
        ValidationStatus::Unsafe,
        ValidationStatus::Unresolved,
    ]
    .iter()
    .map(|s| (s.as_str(), 0))
    .collect();
    for outcome in outcomes {
        *by_status.entry(outcome.result.status.as_str()).or_default() += 1;
    }

    let used_external = outcomes.iter().filter(|o| o.result.used_external).count();
    let placeholders: usize =
        outcomes.iter().map(|o| o.result.confidence_summary.placeholder_count).sum();

    json!({
        "snippets": outcomes.len(),
        "status": by_status,
        "placeholders": placeholders,
        "external": {
            "used_by": used_external,
            "calls": usage.calls,
            "spent_usd": (usage.spent_usd * 1_000_000.0).round() / 1_000_000.0,
        },
    })
}

fn entry(outcome: &AnalysisOutcome) -> Value {
    let result = &outcome.result;
    json!({
        "index": outcome.index,
        "status": result.status,
        "diagnostics": result.diagnostics,
        "resolved_dependencies": result.resolved_dependencies,
        "unresolved_symbols": result.unresolved_symbols,
        "confidence_summary": result.confidence_summary,
        "used_external": result.used_external,
        "plan": {
            "snippet_order": outcome.plan.snippet_order,
            "imports": outcome.plan.imports,
            "placeholders": outcome.plan.placeholders,
        },
        "states": outcome.states,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Window;
    use crate::domain::{
        ConfidenceSummary, ContextPlan, DependencyRecord, SymbolKind, ValidationResult,
    };
    use crate::pipeline::RequestState;
    use std::fs;
    use tempfile::TempDir;

    fn outcome(index: usize, status: ValidationStatus) -> AnalysisOutcome {
        let records = vec![DependencyRecord::exact("x", SymbolKind::Variable, 0)];
        AnalysisOutcome {
            index,
            result: ValidationResult {
                status,
                diagnostics: Vec::new(),
                confidence_summary: ConfidenceSummary::from_parts(&records, 0, 0.2),
                resolved_dependencies: records,
                unresolved_symbols: Vec::new(),
                used_external: false,
            },
            plan: ContextPlan {
                snippet_order: vec![0],
                prelude: "x = 5\n".into(),
                ..Default::default()
            },
            augmented: "x = 5\n\nprint(x)".into(),
            states: vec![RequestState::Pending, RequestState::Validated],
            window: Window { lower: 0, upper: 4 },
            transient_failure: false,
        }
    }

    #[test]
    fn summary_counts_every_status() {
        let report = build_report(
            &[outcome(3, ValidationStatus::Unsafe), outcome(1, ValidationStatus::Ok)],
            &json!({"window_size": 20}),
            ExternalUsage { calls: 2, spent_usd: 0.0012345678 },
            false,
        );
        assert_eq!(report["schema_version"], json!(REPORT_SCHEMA_VERSION));
        assert_eq!(report["summary"]["snippets"], json!(2));
        assert_eq!(report["summary"]["status"]["ok"], json!(1));
        assert_eq!(report["summary"]["status"]["unsafe"], json!(1));
        assert_eq!(report["summary"]["status"]["syntax_error"], json!(0));
        assert_eq!(report["summary"]["external"]["spent_usd"], json!(0.001235));
        assert_eq!(report["entries"][0]["index"], json!(1));
        assert_eq!(report["entries"][0]["plan"]["snippet_order"], json!([0]));
        assert_eq!(report["entries"][0]["states"], json!(["PENDING", "VALIDATED"]));
    }

    #[test]
    fn report_omits_timestamp_when_disabled() {
        let tmp = TempDir::new().expect("tmp");
        let report_path = tmp.path().join("out").join("report.json");

        write_report(
            &report_path,
            &[outcome(0, ValidationStatus::Ok)],
            &json!({}),
            ExternalUsage::default(),
            false,
        )
        .expect("write report");

        let content = fs::read_to_string(report_path).expect("read report");
        let parsed: Value = serde_json::from_str(&content).expect("json");
        assert!(parsed.get("generated_at").is_none());
        assert_eq!(parsed["entries"][0]["confidence_summary"]["overall"], json!(1.0));
    }
}
