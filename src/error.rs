//! Typed failures for the analysis pipeline.
//!
//! Only [`ContractError`] ever escapes `Analyzer::analyze` as an `Err`. Every
//! other variant describes an expected failure mode that is folded into the
//! request's `ValidationResult` as a diagnostic.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Violations of the input contract handed over by the snippet splitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("duplicate snippet index {0}")]
    DuplicateIndex(usize),

    #[error("no snippet with index {0}")]
    UnknownIndex(usize),
}

/// A snippet or assembled context failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column }
    }
}

/// A symbol no candidate snippet defines; handled with a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved dependency '{symbol}' replaced by a placeholder")]
pub struct UnresolvedDependency {
    pub symbol: String,
}

/// A deny-listed operation found in synthesized context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deny-listed operation '{operation}' (matched '{rule}') at prelude line {line}")]
pub struct UnsafeOperation {
    pub operation: String,
    pub rule: String,
    pub line: usize,
}

/// An external proposal pointing outside the window it was given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("proposal for '{symbol}' points at snippet {source_index}, outside window [{lower}, {upper}]")]
pub struct IndexMismatch {
    pub symbol: String,
    pub source_index: usize,
    pub lower: usize,
    pub upper: usize,
}

/// Failure modes of the external resolver path.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ResolverError {
    #[error("external resolver timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("malformed resolver response: {0}")]
    Malformed(String),

    #[error("resolver rate limited{}", RetryHint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("resolver transport error: {0}")]
    Transport(String),

    #[error("resolver returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("cost budget exhausted (needed ${needed:.6}, remaining ${remaining:.6})")]
    BudgetExhausted { needed: f64, remaining: f64 },

    #[error("resolver call cancelled")]
    Cancelled,
}

impl ResolverError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolverError::Timeout { .. }
                | ResolverError::RateLimited { .. }
                | ResolverError::Transport(_)
                | ResolverError::Malformed(_)
        ) || matches!(self, ResolverError::Http { status, .. } if *status >= 500)
    }
}

struct RetryHint<'a>(&'a Option<Duration>);

impl fmt::Display for RetryHint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(wait) => write!(f, " (retry after {:.1}s)", wait.as_secs_f64()),
            None => Ok(()),
        }
    }
}

/// Invalid values in an `AnalysisConfig`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be between 0 and 1, got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_message_includes_retry_hint() {
        let err = ResolverError::RateLimited { retry_after: Some(Duration::from_millis(2500)) };
        assert_eq!(err.to_string(), "resolver rate limited (retry after 2.5s)");
        let bare = ResolverError::RateLimited { retry_after: None };
        assert_eq!(bare.to_string(), "resolver rate limited");
    }

    #[test]
    fn budget_and_cancellation_are_not_retried() {
        assert!(!ResolverError::Cancelled.is_retryable());
        assert!(!ResolverError::BudgetExhausted { needed: 1.0, remaining: 0.0 }.is_retryable());
        assert!(ResolverError::Timeout { attempts: 1 }.is_retryable());
        assert!(ResolverError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!ResolverError::Http { status: 401, body: String::new() }.is_retryable());
    }
}
