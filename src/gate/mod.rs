//! Safety & syntax gate for assembled context.
//!
//! Only the synthesized prelude is checked against the deny list; the target
//! is the subject under test and is trusted as-is. Syntax is checked on the
//! prelude and target together.

pub mod deny;
pub mod syntax;

pub use deny::DenyList;
pub use syntax::check_syntax;

use crate::domain::{ContextPlan, ValidationStatus};
use crate::error::{ParseError, UnresolvedDependency, UnsafeOperation};

#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    pub status: ValidationStatus,
    pub diagnostics: Vec<String>,
    pub violations: Vec<UnsafeOperation>,
    pub syntax_error: Option<ParseError>,
}

impl GateVerdict {
    /// Whether the plan must be dropped from the output.
    pub fn discards_plan(&self) -> bool {
        self.status == ValidationStatus::Unsafe
    }
}

#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    deny: DenyList,
}

impl SafetyGate {
    pub fn new<S: AsRef<str>>(deny_list: &[S]) -> Self {
        Self { deny: DenyList::new(deny_list) }
    }

    /// Judge an assembled plan. `missing` lists residual names that have no
    /// placeholder behind them.
    pub fn check(&self, plan: &ContextPlan, target: &str, missing: &[String]) -> GateVerdict {
        let mut diagnostics = Vec::new();

        let violations = self.deny.scan(&plan.prelude);
        for violation in &violations {
            diagnostics.push(violation.to_string());
        }

        let syntax_error = check_syntax(&plan.augment(target)).err();
        if let Some(err) = &syntax_error {
            diagnostics.push(err.to_string());
        }

        for placeholder in &plan.placeholders {
            let unresolved = UnresolvedDependency { symbol: placeholder.symbol.clone() };
            diagnostics.push(unresolved.to_string());
        }
        for name in missing {
            diagnostics.push(format!("unresolved name '{name}' has no definition or placeholder"));
        }

        let status = if !violations.is_empty() {
            ValidationStatus::Unsafe
        } else if syntax_error.is_some() {
            ValidationStatus::SyntaxError
        } else if !missing.is_empty() {
            ValidationStatus::Unresolved
        } else {
            ValidationStatus::Ok
        };

        if status != ValidationStatus::Ok {
            tracing::debug!(
                status = %status,
                diagnostics = diagnostics.len(),
                "gate rejected plan"
            );
        }
        GateVerdict { status, diagnostics, violations, syntax_error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_deny_list, Placeholder, ValueCategory};

    fn plan(prelude: &str) -> ContextPlan {
        ContextPlan { snippet_order: vec![0], prelude: prelude.to_string(), ..Default::default() }
    }

    #[test]
    fn clean_plan_passes() {
        let gate = SafetyGate::new(&default_deny_list());
        let verdict = gate.check(&plan("x = 5\n"), "print(x)", &[]);
        assert_eq!(verdict.status, ValidationStatus::Ok);
        assert!(verdict.diagnostics.is_empty());
    }

    #[test]
    fn target_content_is_never_deny_scanned() {
        let gate = SafetyGate::new(&default_deny_list());
        let verdict = gate.check(&ContextPlan::default(), "import os\nos.system('ls')", &[]);
        assert_eq!(verdict.status, ValidationStatus::Ok);
    }

    #[test]
    fn unsafe_outranks_syntax_error() {
        let gate = SafetyGate::new(&default_deny_list());
        let verdict = gate.check(&plan("import os\nos.system('rm -rf /')\n"), "print(", &[]);
        assert_eq!(verdict.status, ValidationStatus::Unsafe);
        assert!(verdict.discards_plan());
        assert!(verdict.syntax_error.is_some());
    }

    #[test]
    fn syntax_error_outranks_unresolved() {
        let gate = SafetyGate::new(&default_deny_list());
        let verdict = gate.check(&plan("x = 5\n"), "print(x", &["y".to_string()]);
        assert_eq!(verdict.status, ValidationStatus::SyntaxError);

        let verdict = gate.check(&plan("x = 5\n"), "print(x, y)", &["y".to_string()]);
        assert_eq!(verdict.status, ValidationStatus::Unresolved);
    }

    #[test]
    fn placeholders_are_noted_but_pass() {
        let gate = SafetyGate::new(&default_deny_list());
        let mut plan = plan("unknown_value = \"sample_text\"\n");
        plan.placeholders.push(Placeholder {
            symbol: "unknown_value".into(),
            category: ValueCategory::Text,
            code: "unknown_value = \"sample_text\"".into(),
            required_by: None,
        });
        let verdict = gate.check(&plan, "print(unknown_value)", &[]);
        assert_eq!(verdict.status, ValidationStatus::Ok);
        assert_eq!(verdict.diagnostics.len(), 1);
        assert!(verdict.diagnostics[0].contains("unknown_value"));
    }

    #[test]
    fn custom_deny_list_is_honoured() {
        let gate = SafetyGate::new(&["pickle.loads"]);
        let prelude = plan("import pickle\nobj = pickle.loads(blob)\n");
        let verdict = gate.check(&prelude, "print(obj)", &[]);
        assert_eq!(verdict.status, ValidationStatus::Unsafe);
        assert_eq!(verdict.violations[0].rule, "pickle.loads");
    }
}
