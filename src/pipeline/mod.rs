//! Fallback controller: one analysis request from static scan to verdict.
//!
//! The static path always runs to completion. The external resolver is
//! consulted only when it can add something, and any failure, timeout or
//! deadline on that path degrades recall without failing the request.

pub mod cache;
pub mod state;

pub use cache::{CacheKey, CacheStats, SingleFlightCache};
pub use state::{RequestState, StateTrail};

use crate::analysis::{
    ConflictPolicy, DependencyMerger, MergeInput, Selection, Window, WindowSelector,
};
use crate::domain::{
    AnalysisConfig, ContextPlan, Snippet, SnippetSequence, SymbolReference, ValidationResult,
};
use crate::error::{ContractError, ResolverError};
use crate::gate::SafetyGate;
use crate::resolve::prompt::detect_pattern_hints;
use crate::resolve::{
    ChatCompletionResolver, CostLedger, ExternalResolver, ResolveRequest, ResolverAdapter,
    ResolverReply, RetryPolicy,
};
use crate::scan::{ScanIndex, SnippetScan};
use crate::synth::{ContextSynthesizer, SynthesisInput};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Terminal artifact of one request plus what produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub index: usize,
    pub result: ValidationResult,
    /// Empty when the gate discarded the plan.
    pub plan: ContextPlan,
    /// Prelude followed by the target, or the target unchanged.
    pub augmented: String,
    pub states: Vec<RequestState>,
    /// Widest window searched for definitions.
    pub window: Window,
    /// The external step failed in a way a later request might not repeat:
    /// cancellation, the request deadline, a timeout or a retryable error.
    #[serde(skip)]
    pub transient_failure: bool,
}

impl AnalysisOutcome {
    pub fn external_state(&self) -> Option<RequestState> {
        self.states.iter().copied().find(|s| {
            matches!(
                s,
                RequestState::ExternalDone
                    | RequestState::ExternalFailed
                    | RequestState::ExternalSkipped
            )
        })
    }
}

/// Everything shared by the requests of one run.
pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    sequence: Arc<SnippetSequence>,
    index: Arc<ScanIndex>,
    selector: WindowSelector,
    merger: DependencyMerger,
    synthesizer: ContextSynthesizer,
    gate: SafetyGate,
    resolver: Option<ResolverAdapter>,
    cache: Option<SingleFlightCache<CacheKey, AnalysisOutcome>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("snippets", &self.sequence.len())
            .field("selector", &self.selector)
            .field("resolver", &self.resolver)
            .field("cache", &self.cache.as_ref().map(SingleFlightCache::stats))
            .finish()
    }
}

impl Analyzer {
    /// Scan the sequence and wire the stages. `resolver` is ignored when the
    /// external path is disabled in `config`.
    pub fn new(
        config: impl Into<Arc<AnalysisConfig>>,
        sequence: SnippetSequence,
        resolver: Option<Arc<dyn ExternalResolver>>,
    ) -> Self {
        let config: Arc<AnalysisConfig> = config.into();
        let index = ScanIndex::build(&sequence);

        let resolver = resolver.filter(|_| config.enable_external_resolver).map(|resolver| {
            ResolverAdapter::new(
                resolver,
                RetryPolicy::from_config(&config),
                Arc::new(CostLedger::new(config.external_cost_budget)),
                config.external_max_concurrency,
            )
        });

        info!(
            snippets = sequence.len(),
            window = config.window_size,
            expansion = config.expansion_cap(),
            external = resolver.is_some(),
            cache = config.enable_cache,
            "analyzer ready"
        );

        Self {
            selector: WindowSelector::new(config.window_size, config.expansion_cap()),
            merger: DependencyMerger::new(
                ConflictPolicy::from_threshold(config.external_override_threshold),
                config.external_min_confidence,
            ),
            synthesizer: ContextSynthesizer::from_config(&config),
            gate: SafetyGate::new(&config.deny_list),
            cache: config.enable_cache.then(SingleFlightCache::new),
            resolver,
            index: Arc::new(index),
            sequence: Arc::new(sequence),
            config,
        }
    }

    /// Build with the chat-completion resolver when an API key is available.
    pub fn from_config(
        config: AnalysisConfig,
        sequence: SnippetSequence,
    ) -> Result<Self, ResolverError> {
        let resolver: Option<Arc<dyn ExternalResolver>> = if config.enable_external_resolver {
            ChatCompletionResolver::from_config(&config)?
                .map(|r| Arc::new(r) as Arc<dyn ExternalResolver>)
        } else {
            None
        };
        Ok(Self::new(config, sequence, resolver))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn sequence(&self) -> &SnippetSequence {
        &self.sequence
    }

    pub fn scans(&self) -> &ScanIndex {
        &self.index
    }

    pub fn cost_ledger(&self) -> Option<&Arc<CostLedger>> {
        self.resolver.as_ref().map(ResolverAdapter::ledger)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(SingleFlightCache::stats)
    }

    pub async fn analyze(&self, index: usize) -> Result<AnalysisOutcome, ContractError> {
        self.analyze_with_cancel(index, &CancellationToken::new()).await
    }

    /// Analyze one target. Cancelling `cancel` abandons only the external call.
    pub async fn analyze_with_cancel(
        &self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, ContractError> {
        let target = self.sequence.get(index).ok_or(ContractError::UnknownIndex(index))?;
        let window = self.selector.max_window(index, &self.sequence);

        let Some(cache) = &self.cache else {
            return Ok(self.compute(target, cancel).await);
        };
        let key = CacheKey::new(&target.content, window, index);
        let outcome = cache.get_or_compute(key.clone(), || self.compute(target, cancel)).await;
        if outcome.transient_failure && cache.evict_if(&key, |cached| cached.transient_failure) {
            debug!(snippet = index, "degraded outcome evicted from cache");
        }
        Ok(outcome)
    }

    /// Analyze several targets, at most `concurrency` at a time, yielding
    /// results as they finish.
    pub fn analyze_stream<'a>(
        &'a self,
        indices: Vec<usize>,
    ) -> impl Stream<Item = (usize, Result<AnalysisOutcome, ContractError>)> + 'a {
        stream::iter(indices)
            .map(move |index| async move { (index, self.analyze(index).await) })
            .buffer_unordered(self.config.concurrency.max(1))
    }

    /// Like [`Analyzer::analyze_stream`], collected back into input order.
    pub async fn analyze_many(
        &self,
        indices: &[usize],
    ) -> Vec<Result<AnalysisOutcome, ContractError>> {
        let mut done: Vec<(usize, Result<AnalysisOutcome, ContractError>)> =
            stream::iter(indices.iter().copied().enumerate())
                .map(|(position, index)| async move { (position, self.analyze(index).await) })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;
        done.sort_by_key(|(position, _)| *position);
        done.into_iter().map(|(_, result)| result).collect()
    }

    async fn compute(&self, target: &Snippet, cancel: &CancellationToken) -> AnalysisOutcome {
        let started = Instant::now();
        let index = target.index;
        let mut trail = StateTrail::new(index);

        let scan: Arc<SnippetScan> = match self.index.get(index) {
            Some(scan) => Arc::clone(scan),
            None => Arc::new(SnippetScan { index, ..Default::default() }),
        };
        let mut static_candidates: BTreeMap<String, Selection> = BTreeMap::new();
        for symbol in &scan.free {
            let definers = self.index.definers(&symbol.name);
            if let Some(selection) = self.selector.select(index, definers, &self.sequence) {
                static_candidates.insert(symbol.name.clone(), selection);
            }
        }
        trail.advance(RequestState::StaticScanned);

        let base_window = self.selector.base_window(index, &self.sequence);
        let max_window = self.selector.max_window(index, &self.sequence);

        let ask: Vec<SymbolReference> = if self.merger_consults_resolved() {
            scan.free.clone()
        } else {
            scan.free.iter().filter(|s| !static_candidates.contains_key(&s.name)).cloned().collect()
        };

        let mut used_external = false;
        let mut transient_failure = false;
        let mut external = Vec::new();
        match &self.resolver {
            Some(adapter) if !ask.is_empty() => {
                trail.advance(RequestState::ExternalRequested);
                let request = self.resolve_request(target, base_window, ask);
                match self.call_external(adapter, request, cancel, started).await {
                    Ok(reply) => {
                        trail.advance(RequestState::ExternalDone);
                        used_external = true;
                        external = reply.proposals;
                    }
                    Err(err) => {
                        trail.advance(RequestState::ExternalFailed);
                        transient_failure =
                            err.is_retryable() || matches!(err, ResolverError::Cancelled);
                        warn!(
                            snippet = index,
                            error = %err,
                            "external resolver failed; using static results"
                        );
                    }
                }
            }
            Some(_) => {
                debug!(snippet = index, "nothing for the external resolver to do");
                trail.advance(RequestState::ExternalSkipped);
            }
            None => trail.advance(RequestState::ExternalSkipped),
        }

        let unparseable: HashSet<usize> = self
            .sequence
            .range(max_window.lower, max_window.upper)
            .iter()
            .map(|s| s.index)
            .filter(|i| self.index.get(*i).is_some_and(|s| !s.is_candidate_source()))
            .collect();
        let merged = self.merger.merge(MergeInput {
            target: index,
            symbols: &scan.free,
            static_candidates: &static_candidates,
            external: &external,
            external_window: base_window,
            unparseable: &unparseable,
        });
        trail.advance(RequestState::Merged);

        let synthesis = self.synthesizer.synthesize(SynthesisInput {
            target: &scan,
            records: &merged.records,
            unresolved: &merged.unresolved,
            index: &self.index,
            window: max_window,
        });
        trail.advance(RequestState::Synthesized);

        let missing: Vec<String> = if synthesis.plan.placeholders.is_empty() {
            synthesis.unresolved.clone()
        } else {
            Vec::new()
        };
        let verdict = self.gate.check(&synthesis.plan, &target.content, &missing);
        trail.advance(RequestState::Validated);

        let confidence_summary = synthesis.confidence();
        let (plan, augmented) = if verdict.discards_plan() {
            warn!(
                snippet = index,
                violations = verdict.violations.len(),
                "unsafe prelude; plan discarded"
            );
            (ContextPlan::default(), target.content.clone())
        } else {
            let augmented = synthesis.plan.augment(&target.content);
            (synthesis.plan, augmented)
        };

        debug!(
            snippet = index,
            status = %verdict.status,
            resolved = synthesis.records.len(),
            unresolved = synthesis.unresolved.len(),
            used_external,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        AnalysisOutcome {
            index,
            result: ValidationResult {
                status: verdict.status,
                diagnostics: verdict.diagnostics,
                resolved_dependencies: synthesis.records,
                unresolved_symbols: synthesis.unresolved,
                confidence_summary,
                used_external,
            },
            plan,
            augmented,
            states: trail.into_states(),
            window: max_window,
            transient_failure,
        }
    }

    fn merger_consults_resolved(&self) -> bool {
        ConflictPolicy::from_threshold(self.config.external_override_threshold)
            .consults_external_for_resolved()
    }

    fn resolve_request(
        &self,
        target: &Snippet,
        window: Window,
        unresolved: Vec<SymbolReference>,
    ) -> ResolveRequest {
        let snippets = self
            .sequence
            .range(window.lower, window.upper)
            .iter()
            .filter(|s| {
                s.index == target.index
                    || self.index.get(s.index).is_some_and(|scan| scan.is_candidate_source())
            })
            .cloned()
            .collect();
        ResolveRequest {
            target: target.clone(),
            window,
            snippets,
            unresolved,
            pattern_hints: detect_pattern_hints(&target.content),
            budget_remaining: 0.0,
        }
    }

    /// The adapter call bounded by the request deadline, if any.
    async fn call_external(
        &self,
        adapter: &ResolverAdapter,
        request: ResolveRequest,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<ResolverReply, ResolverError> {
        let Some(deadline) = self.config.request_deadline() else {
            return adapter.resolve(request, cancel).await;
        };
        let scoped = cancel.child_token();
        tokio::select! {
            result = adapter.resolve(request, &scoped) => result,
            _ = tokio::time::sleep_until(started + deadline) => {
                scoped.cancel();
                warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "request deadline elapsed; abandoning external call"
                );
                Err(ResolverError::Cancelled)
            }
        }
    }
}
