//! Reconcile static candidates with external proposals.
//!
//! Static matches are exact within their window and win by default. External
//! proposals only fill gaps static analysis cannot explain, unless the policy
//! lets a sufficiently confident proposal override a contradicting match.

use super::window::{Selection, Window};
use crate::domain::{DependencyRecord, Origin, SymbolReference};
use crate::error::IndexMismatch;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConflictPolicy {
    #[default]
    StaticWins,
    /// External proposals at or above `threshold` replace a differing static match.
    PreferConfidentExternal { threshold: f64 },
}

impl ConflictPolicy {
    pub fn from_threshold(threshold: Option<f64>) -> Self {
        match threshold {
            Some(threshold) => ConflictPolicy::PreferConfidentExternal { threshold },
            None => ConflictPolicy::StaticWins,
        }
    }

    /// Whether external proposals can matter for statically resolved symbols.
    pub fn consults_external_for_resolved(&self) -> bool {
        matches!(self, ConflictPolicy::PreferConfidentExternal { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    IndexMismatch(IndexMismatch),
    PointsAtTarget,
    UnparseableSource,
    LowConfidence,
    UnknownSymbol,
    Outranked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Discarded {
    pub record: DependencyRecord,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// One record per resolvable symbol, in the target's first-use order.
    pub records: Vec<DependencyRecord>,
    pub unresolved: Vec<SymbolReference>,
    pub discarded: Vec<Discarded>,
}

/// Everything the merger needs for one target.
pub struct MergeInput<'a> {
    pub target: usize,
    pub symbols: &'a [SymbolReference],
    pub static_candidates: &'a BTreeMap<String, Selection>,
    pub external: &'a [DependencyRecord],
    /// Window the external resolver was shown.
    pub external_window: Window,
    pub unparseable: &'a HashSet<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct DependencyMerger {
    policy: ConflictPolicy,
    min_external_confidence: f64,
}

impl DependencyMerger {
    pub fn new(policy: ConflictPolicy, min_external_confidence: f64) -> Self {
        Self { policy, min_external_confidence }
    }

    pub fn merge(&self, input: MergeInput<'_>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let wanted: HashSet<&str> = input.symbols.iter().map(|s| s.name.as_str()).collect();

        let mut best_external: BTreeMap<&str, DependencyRecord> = BTreeMap::new();
        for proposal in input.external {
            let reason = if !wanted.contains(proposal.symbol.as_str()) {
                Some(DiscardReason::UnknownSymbol)
            } else if !input.external_window.contains(proposal.source_index) {
                Some(DiscardReason::IndexMismatch(IndexMismatch {
                    symbol: proposal.symbol.clone(),
                    source_index: proposal.source_index,
                    lower: input.external_window.lower,
                    upper: input.external_window.upper,
                }))
            } else if proposal.source_index == input.target {
                Some(DiscardReason::PointsAtTarget)
            } else if input.unparseable.contains(&proposal.source_index) {
                Some(DiscardReason::UnparseableSource)
            } else if proposal.confidence < self.min_external_confidence {
                Some(DiscardReason::LowConfidence)
            } else {
                None
            };

            if let Some(reason) = reason {
                log_discard(proposal, &reason);
                outcome.discarded.push(Discarded { record: proposal.clone(), reason });
                continue;
            }

            let Some(symbol) = wanted.get(proposal.symbol.as_str()).copied() else {
                continue;
            };
            match best_external.get(symbol) {
                Some(current) if current.confidence >= proposal.confidence => {
                    outcome.discarded.push(Discarded {
                        record: proposal.clone(),
                        reason: DiscardReason::Outranked,
                    });
                }
                _ => {
                    if let Some(previous) = best_external.insert(symbol, proposal.clone()) {
                        outcome
                            .discarded
                            .push(Discarded { record: previous, reason: DiscardReason::Outranked });
                    }
                }
            }
        }

        for symbol in input.symbols {
            let static_pick = input
                .static_candidates
                .get(&symbol.name)
                .and_then(Selection::chosen)
                .map(|source| DependencyRecord::exact(symbol.name.clone(), symbol.kind, source));
            let external_pick = best_external.remove(symbol.name.as_str()).map(|mut record| {
                record.origin = Origin::External;
                record.kind = symbol.kind;
                record.required_by = None;
                record
            });

            let chosen = match (static_pick, external_pick) {
                (Some(exact), Some(proposal)) => {
                    if self.external_overrides(&exact, &proposal) {
                        tracing::debug!(
                            symbol = %symbol.name,
                            static_source = exact.source_index,
                            external_source = proposal.source_index,
                            confidence = proposal.confidence,
                            "confident external proposal overrides static match"
                        );
                        Some(proposal)
                    } else {
                        if proposal.source_index != exact.source_index {
                            outcome.discarded.push(Discarded {
                                record: proposal,
                                reason: DiscardReason::Outranked,
                            });
                        }
                        Some(exact)
                    }
                }
                (Some(exact), None) => Some(exact),
                (None, Some(proposal)) => Some(proposal),
                (None, None) => None,
            };

            match chosen {
                Some(record) => outcome.records.push(record),
                None => outcome.unresolved.push(symbol.clone()),
            }
        }

        outcome
    }

    fn external_overrides(&self, exact: &DependencyRecord, proposal: &DependencyRecord) -> bool {
        match self.policy {
            ConflictPolicy::StaticWins => false,
            ConflictPolicy::PreferConfidentExternal { threshold } => {
                proposal.source_index != exact.source_index && proposal.confidence >= threshold
            }
        }
    }
}

fn log_discard(proposal: &DependencyRecord, reason: &DiscardReason) {
    match reason {
        DiscardReason::IndexMismatch(mismatch) => {
            tracing::warn!(error = %mismatch, "discarding external proposal");
        }
        other => {
            tracing::debug!(
                symbol = %proposal.symbol,
                source = proposal.source_index,
                confidence = proposal.confidence,
                reason = ?other,
                "discarding external proposal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SymbolKind;

    fn external(symbol: &str, source: usize, confidence: f64) -> DependencyRecord {
        DependencyRecord {
            symbol: symbol.to_string(),
            kind: SymbolKind::Variable,
            source_index: source,
            confidence,
            origin: Origin::External,
            required_by: None,
        }
    }

    fn selection(candidates: Vec<usize>) -> Selection {
        Selection { candidates, window: Window { lower: 0, upper: 20 } }
    }

    struct Fixture {
        symbols: Vec<SymbolReference>,
        statics: BTreeMap<String, Selection>,
        unparseable: HashSet<usize>,
    }

    impl Fixture {
        fn new(names: &[&str]) -> Self {
            Self {
                symbols: names
                    .iter()
                    .map(|n| SymbolReference::new(*n, SymbolKind::Variable))
                    .collect(),
                statics: BTreeMap::new(),
                unparseable: HashSet::new(),
            }
        }

        fn run(&self, merger: DependencyMerger, proposals: &[DependencyRecord]) -> MergeOutcome {
            merger.merge(MergeInput {
                target: 10,
                symbols: &self.symbols,
                static_candidates: &self.statics,
                external: proposals,
                external_window: Window { lower: 5, upper: 15 },
                unparseable: &self.unparseable,
            })
        }
    }

    #[test]
    fn static_wins_over_contradicting_external() {
        let mut fx = Fixture::new(&["x"]);
        fx.statics.insert("x".into(), selection(vec![8, 12]));
        let merger = DependencyMerger::new(ConflictPolicy::StaticWins, 0.3);
        let out = fx.run(merger, &[external("x", 6, 0.99)]);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].source_index, 8);
        assert_eq!(out.records[0].origin, Origin::Static);
        assert_eq!(out.records[0].confidence, 1.0);
    }

    #[test]
    fn confident_external_overrides_when_policy_allows() {
        let mut fx = Fixture::new(&["x"]);
        fx.statics.insert("x".into(), selection(vec![8]));
        let merger =
            DependencyMerger::new(ConflictPolicy::PreferConfidentExternal { threshold: 0.9 }, 0.3);
        let out = fx.run(merger, &[external("x", 6, 0.95)]);
        assert_eq!(out.records[0].source_index, 6);
        assert_eq!(out.records[0].origin, Origin::External);

        let out = fx.run(merger, &[external("x", 6, 0.5)]);
        assert_eq!(out.records[0].source_index, 8);
    }

    #[test]
    fn highest_confidence_external_is_kept() {
        let fx = Fixture::new(&["y"]);
        let merger = DependencyMerger::new(ConflictPolicy::StaticWins, 0.3);
        let proposals = [external("y", 6, 0.4), external("y", 7, 0.8), external("y", 9, 0.6)];
        let out = fx.run(merger, &proposals);
        assert_eq!(out.records[0].source_index, 7);
        let outranked =
            out.discarded.iter().filter(|d| d.reason == DiscardReason::Outranked).count();
        assert_eq!(outranked, 2);
    }

    #[test]
    fn invalid_proposals_are_discarded_not_fatal() {
        let mut fx = Fixture::new(&["a", "b", "c", "d"]);
        fx.unparseable.insert(7);
        let merger = DependencyMerger::new(ConflictPolicy::StaticWins, 0.3);
        let out = fx.run(
            merger,
            &[
                external("a", 40, 0.9),
                external("b", 10, 0.9),
                external("c", 7, 0.9),
                external("d", 6, 0.1),
                external("zzz", 6, 0.9),
            ],
        );
        assert!(out.records.is_empty());
        assert_eq!(out.unresolved.len(), 4);
        assert!(matches!(out.discarded[0].reason, DiscardReason::IndexMismatch(_)));
        assert_eq!(out.discarded[1].reason, DiscardReason::PointsAtTarget);
        assert_eq!(out.discarded[2].reason, DiscardReason::UnparseableSource);
        assert_eq!(out.discarded[3].reason, DiscardReason::LowConfidence);
        assert_eq!(out.discarded[4].reason, DiscardReason::UnknownSymbol);
    }

    #[test]
    fn records_follow_first_use_order() {
        let mut fx = Fixture::new(&["b", "a"]);
        fx.statics.insert("a".into(), selection(vec![3]));
        fx.statics.insert("b".into(), selection(vec![4]));
        let out = fx.run(DependencyMerger::new(ConflictPolicy::StaticWins, 0.3), &[]);
        let names: Vec<&str> = out.records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
