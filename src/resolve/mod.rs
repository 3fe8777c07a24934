//! External (LLM-backed) dependency resolution
//!
//! The external path is a recall aid only. Every failure it can produce is a
//! typed [`ResolverError`] that the pipeline absorbs by falling back to the
//! static-only merge.

use crate::analysis::Window;
use crate::domain::{DependencyRecord, Snippet, SymbolReference};
use crate::error::ResolverError;
use async_trait::async_trait;

pub mod adapter;
pub mod budget;
pub mod llm;
pub mod prompt;
pub mod response;
pub mod retry;

pub use adapter::ResolverAdapter;
pub use budget::{CostLedger, Reservation};
pub use llm::ChatCompletionResolver;
pub use retry::RetryPolicy;

/// Input for one external resolution call.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub target: Snippet,
    pub window: Window,
    /// Parseable snippets inside `window`, ascending, target included.
    pub snippets: Vec<Snippet>,
    pub unresolved: Vec<SymbolReference>,
    pub pattern_hints: Vec<String>,
    /// Remaining run budget in USD at the time of the attempt.
    pub budget_remaining: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverReply {
    pub proposals: Vec<DependencyRecord>,
    pub cost_usd: f64,
}

/// A reasoning backend that proposes symbol to snippet bindings.
#[async_trait]
pub trait ExternalResolver: Send + Sync {
    async fn propose(&self, request: &ResolveRequest) -> Result<ResolverReply, ResolverError>;

    /// Expected cost of answering `request`, held against the run budget
    /// while the call is in flight.
    fn estimate_cost(&self, _request: &ResolveRequest) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "external"
    }
}
