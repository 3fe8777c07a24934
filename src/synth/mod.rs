//! Context synthesis: covering set, ordering, dedup and placeholders.
//!
//! The covering set starts from the merged records' source snippets and is
//! closed transitively: every included snippet's own free names are resolved
//! too (already-included definers first, then the target's search window),
//! so the prelude runs on its own. Whatever stays unresolved is backed by a
//! placeholder.

pub mod order;
pub mod placeholder;

pub use order::dependency_order;
pub use placeholder::{PlaceholderRegistry, PlaceholderRequest, PLACEHOLDER_CONFIDENCE};

use crate::analysis::{window::order_candidates, Window};
use crate::domain::{
    AnalysisConfig, ConfidenceSummary, ContextPlan, DependencyRecord, Placeholder, PreludeMode,
    SymbolReference,
};
use crate::scan::{ScanIndex, SnippetScan, StatementKind, TopLevelStatement};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

pub struct SynthesisInput<'a> {
    pub target: &'a SnippetScan,
    /// Merged records for the target's free names.
    pub records: &'a [DependencyRecord],
    /// Target names the merge could not place.
    pub unresolved: &'a [SymbolReference],
    pub index: &'a ScanIndex,
    /// Bounds for transitive lookups; the target's widest search window.
    pub window: Window,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    pub plan: ContextPlan,
    /// Target records followed by transitive ones (`required_by` set).
    pub records: Vec<DependencyRecord>,
    /// Residual names, target first, each listed once.
    pub unresolved: Vec<String>,
}

impl Synthesis {
    pub fn confidence(&self) -> ConfidenceSummary {
        ConfidenceSummary::from_parts(
            &self.records,
            self.plan.placeholders.len(),
            PLACEHOLDER_CONFIDENCE,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ContextSynthesizer {
    registry: PlaceholderRegistry,
    mode: PreludeMode,
    placeholders: bool,
}

impl Default for ContextSynthesizer {
    fn default() -> Self {
        Self::new(PlaceholderRegistry::default(), PreludeMode::All, true)
    }
}

impl ContextSynthesizer {
    pub fn new(registry: PlaceholderRegistry, mode: PreludeMode, placeholders: bool) -> Self {
        Self { registry, mode, placeholders }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        let registry =
            PlaceholderRegistry::new().with_overrides(config.placeholder_overrides.clone());
        Self::new(registry, config.prelude_mode, config.synthesize_placeholders)
    }

    pub fn registry_mut(&mut self) -> &mut PlaceholderRegistry {
        &mut self.registry
    }

    pub fn synthesize(&self, input: SynthesisInput<'_>) -> Synthesis {
        let target = input.target.index;
        let mut records: Vec<DependencyRecord> = input.records.to_vec();
        let mut included: BTreeSet<usize> = records.iter().map(|r| r.source_index).collect();
        included.remove(&target);

        let mut residual: Vec<(String, Option<usize>)> = Vec::new();
        let mut residual_names: HashSet<String> = HashSet::new();
        for symbol in input.unresolved {
            if residual_names.insert(symbol.name.clone()) {
                residual.push((symbol.name.clone(), None));
            }
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        let mut queue: VecDeque<usize> = included.iter().copied().collect();
        let mut visited: HashSet<usize> = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(scan) = input.index.get(current) else { continue };
            for reference in &scan.free {
                let name = reference.name.as_str();
                let definers: Vec<usize> = input
                    .index
                    .definers(name)
                    .iter()
                    .copied()
                    .filter(|d| *d != target && *d != current)
                    .collect();
                let already: Vec<usize> =
                    definers.iter().copied().filter(|d| included.contains(d)).collect();
                let provider =
                    order_candidates(current, &already, input.window).first().copied().or_else(
                        || order_candidates(current, &definers, input.window).first().copied(),
                    );

                match provider {
                    Some(source) => {
                        edges.push((source, current));
                        records.push(DependencyRecord {
                            required_by: Some(current),
                            ..DependencyRecord::exact(name, reference.kind, source)
                        });
                        if included.insert(source) {
                            tracing::debug!(
                                snippet = current,
                                symbol = name,
                                source,
                                "pulled in transitive dependency"
                            );
                            queue.push_back(source);
                        }
                    }
                    None => {
                        if residual_names.insert(name.to_string()) {
                            residual.push((name.to_string(), Some(current)));
                        }
                    }
                }
            }
        }

        let snippet_order = dependency_order(&included, &edges);

        let placeholders: Vec<Placeholder> = if self.placeholders {
            residual
                .iter()
                .map(|(name, required_by)| {
                    let owner = required_by.and_then(|i| input.index.get(i)).map(|s| s.as_ref());
                    let hints = owner
                        .unwrap_or(input.target)
                        .hints
                        .get(name)
                        .cloned()
                        .unwrap_or_default();
                    self.registry.synthesize(name, &hints, *required_by)
                })
                .collect()
        } else {
            Vec::new()
        };

        let (imports, body) = self.collect_statements(&snippet_order, input.index, &records);
        let prelude = render_prelude(&imports, &placeholders, &body);

        Synthesis {
            plan: ContextPlan { snippet_order, placeholders, imports, prelude },
            records,
            unresolved: residual.into_iter().map(|(name, _)| name).collect(),
        }
    }

    /// Hoisted imports and body statements for `order`.
    ///
    /// A statement that rebinds a symbol whose record names another, already
    /// emitted source is skipped unless it also binds something its own
    /// snippet was pulled in for.
    fn collect_statements(
        &self,
        order: &[usize],
        index: &ScanIndex,
        records: &[DependencyRecord],
    ) -> (Vec<String>, Vec<String>) {
        let mut chosen: HashMap<&str, HashSet<usize>> = HashMap::new();
        for record in records {
            chosen.entry(record.symbol.as_str()).or_default().insert(record.source_index);
        }

        let mut imports: Vec<String> = Vec::new();
        let mut seen_imports: HashSet<String> = HashSet::new();
        let mut seen_definitions: HashSet<String> = HashSet::new();
        let mut body: Vec<String> = Vec::new();
        let mut emitted: HashSet<usize> = HashSet::new();

        for scan in order.iter().filter_map(|i| index.get(*i)) {
            let wanted: HashSet<&str> = records
                .iter()
                .filter(|r| r.source_index == scan.index)
                .map(|r| r.symbol.as_str())
                .collect();

            for statement in &scan.statements {
                if statement.kind != StatementKind::Import
                    && overrides_choice(statement, scan.index, &wanted, &chosen, &emitted)
                {
                    tracing::debug!(
                        snippet = scan.index,
                        binds = ?statement.binds,
                        "skipped statement rebinding a symbol chosen from another snippet"
                    );
                    continue;
                }
                match statement.kind {
                    StatementKind::Import => {
                        if seen_imports.insert(statement.normalized()) {
                            imports.push(statement.text.clone());
                        }
                    }
                    StatementKind::Definition => {
                        if seen_definitions.insert(statement.normalized()) {
                            body.push(statement.text.clone());
                        }
                    }
                    StatementKind::Assignment => body.push(statement.text.clone()),
                    StatementKind::Other => {
                        if self.mode == PreludeMode::All {
                            body.push(statement.text.clone());
                        }
                    }
                }
            }
            emitted.insert(scan.index);
        }
        (imports, body)
    }
}

fn overrides_choice(
    statement: &TopLevelStatement,
    source: usize,
    wanted: &HashSet<&str>,
    chosen: &HashMap<&str, HashSet<usize>>,
    emitted: &HashSet<usize>,
) -> bool {
    if statement.binds.iter().any(|name| wanted.contains(name.as_str())) {
        return false;
    }
    statement.binds.iter().any(|name| {
        chosen.get(name.as_str()).is_some_and(|sources| {
            !sources.contains(&source) && sources.iter().any(|s| emitted.contains(s))
        })
    })
}

fn render_prelude(imports: &[String], placeholders: &[Placeholder], body: &[String]) -> String {
    let sections: Vec<String> = [
        imports.join("\n"),
        placeholders.iter().map(|p| p.code.as_str()).collect::<Vec<_>>().join("\n"),
        body.join("\n"),
    ]
    .into_iter()
    .filter(|section| !section.trim().is_empty())
    .collect();

    if sections.is_empty() {
        String::new()
    } else {
        format!("{}\n", sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Snippet, SnippetSequence, SymbolKind};

    fn index(snippets: &[(usize, &str)]) -> (SnippetSequence, ScanIndex) {
        let seq = SnippetSequence::new(snippets.iter().map(|(i, s)| Snippet::new(*i, *s)).collect())
            .expect("sequence");
        let index = ScanIndex::build(&seq);
        (seq, index)
    }

    fn run(
        synth: &ContextSynthesizer,
        index: &ScanIndex,
        target: usize,
        records: &[DependencyRecord],
        unresolved: &[SymbolReference],
    ) -> Synthesis {
        let scan = index.get(target).expect("target scanned");
        synth.synthesize(SynthesisInput {
            target: scan,
            records,
            unresolved,
            index,
            window: Window { lower: 0, upper: 100 },
        })
    }

    #[test]
    fn empty_input_yields_empty_plan() {
        let (_, idx) = index(&[(0, "print(1)")]);
        let out = run(&ContextSynthesizer::default(), &idx, 0, &[], &[]);
        assert!(out.plan.is_empty());
        assert_eq!(out.plan.prelude, "");
        assert_eq!(out.confidence().overall, 1.0);
    }

    #[test]
    fn single_definition_prelude() {
        let (_, idx) = index(&[(10, "x = 5"), (12, "print(x)")]);
        let records = vec![DependencyRecord::exact("x", SymbolKind::Variable, 10)];
        let out = run(&ContextSynthesizer::default(), &idx, 12, &records, &[]);
        assert_eq!(out.plan.snippet_order, vec![10]);
        assert_eq!(out.plan.prelude, "x = 5\n");
    }

    #[test]
    fn transitive_dependencies_are_ordered_first() {
        let (_, idx) = index(&[
            (1, "import math\nrate = 0.5"),
            (4, "import math\ndef grow(v):\n    return math.floor(v * rate)"),
            (7, "print(grow(10))"),
        ]);
        let records = vec![DependencyRecord::exact("grow", SymbolKind::Function, 4)];
        let out = run(&ContextSynthesizer::default(), &idx, 7, &records, &[]);
        assert_eq!(out.plan.snippet_order, vec![1, 4]);
        assert_eq!(out.plan.imports, vec!["import math".to_string()]);
        assert!(out.records.iter().any(|r| r.symbol == "rate" && r.required_by == Some(4)));
        assert_eq!(
            out.plan.prelude,
            "import math\n\nrate = 0.5\ndef grow(v):\n    return math.floor(v * rate)\n"
        );
    }

    #[test]
    fn forward_provider_still_precedes_consumer() {
        let (_, idx) =
            index(&[(2, "def show():\n    print(LABEL)"), (5, "show()"), (8, "LABEL = 'x'")]);
        let records = vec![DependencyRecord::exact("show", SymbolKind::Function, 2)];
        let out = run(&ContextSynthesizer::default(), &idx, 5, &records, &[]);
        assert_eq!(out.plan.snippet_order, vec![8, 2]);
    }

    #[test]
    fn residual_names_get_placeholders() {
        let (_, idx) = index(&[(0, "print(unknown_value)")]);
        let unresolved = vec![SymbolReference::new("unknown_value", SymbolKind::Variable)];
        let out = run(&ContextSynthesizer::default(), &idx, 0, &[], &unresolved);
        assert_eq!(out.unresolved, vec!["unknown_value".to_string()]);
        assert_eq!(out.plan.placeholders.len(), 1);
        assert_eq!(out.plan.prelude, "unknown_value = \"sample_text\"\n");
        assert_eq!(out.confidence().overall, 0.2);
    }

    #[test]
    fn disabled_placeholders_leave_names_residual() {
        let (_, idx) = index(&[(0, "print(unknown_value)")]);
        let unresolved = vec![SymbolReference::new("unknown_value", SymbolKind::Variable)];
        let synth = ContextSynthesizer::new(PlaceholderRegistry::new(), PreludeMode::All, false);
        let out = run(&synth, &idx, 0, &[], &unresolved);
        assert!(out.plan.placeholders.is_empty());
        assert_eq!(out.unresolved, vec!["unknown_value".to_string()]);
    }

    #[test]
    fn definitions_mode_drops_bare_expressions() {
        let (_, idx) = index(&[(0, "x = 5\nprint('setup')"), (1, "print(x)")]);
        let records = vec![DependencyRecord::exact("x", SymbolKind::Variable, 0)];
        let synth =
            ContextSynthesizer::new(PlaceholderRegistry::new(), PreludeMode::Definitions, true);
        assert_eq!(run(&synth, &idx, 1, &records, &[]).plan.prelude, "x = 5\n");
        let all = run(&ContextSynthesizer::default(), &idx, 1, &records, &[]);
        assert_eq!(all.plan.prelude, "x = 5\nprint('setup')\n");
    }

    #[test]
    fn identical_definitions_are_emitted_once() {
        let (_, idx) = index(&[
            (0, "def helper():\n    return 1\na = helper()"),
            (1, "def helper():\n    return 1\nb = helper()"),
            (2, "print(a, b)"),
        ]);
        let records = vec![
            DependencyRecord::exact("a", SymbolKind::Variable, 0),
            DependencyRecord::exact("b", SymbolKind::Variable, 1),
        ];
        let out = run(&ContextSynthesizer::default(), &idx, 2, &records, &[]);
        assert_eq!(out.plan.prelude.matches("def helper").count(), 1);
    }

    #[test]
    fn covering_snippet_cannot_rebind_a_symbol_chosen_elsewhere() {
        let (_, idx) = index(&[(10, "x = 5"), (12, "print(x, y)"), (14, "x = 99\ny = 1")]);
        let records = vec![
            DependencyRecord::exact("x", SymbolKind::Variable, 10),
            DependencyRecord::exact("y", SymbolKind::Variable, 14),
        ];
        let out = run(&ContextSynthesizer::default(), &idx, 12, &records, &[]);
        assert_eq!(out.plan.snippet_order, vec![10, 14]);
        assert_eq!(out.plan.prelude, "x = 5\ny = 1\n");
    }

    #[test]
    fn rebinding_before_the_chosen_definer_is_kept() {
        let (_, idx) = index(&[(4, "x = 1\ny = x + 1"), (6, "x = 7"), (8, "print(x, y)")]);
        let records = vec![
            DependencyRecord::exact("x", SymbolKind::Variable, 6),
            DependencyRecord::exact("y", SymbolKind::Variable, 4),
        ];
        let out = run(&ContextSynthesizer::default(), &idx, 8, &records, &[]);
        assert_eq!(out.plan.snippet_order, vec![4, 6]);
        assert_eq!(out.plan.prelude, "x = 1\ny = x + 1\nx = 7\n");
    }
}
