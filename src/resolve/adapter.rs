//! Bounded, cancellable, retrying wrapper around an [`ExternalResolver`].

use super::budget::CostLedger;
use super::retry::RetryPolicy;
use super::{ExternalResolver, ResolveRequest, ResolverReply};
use crate::error::ResolverError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ResolverAdapter {
    resolver: Arc<dyn ExternalResolver>,
    policy: RetryPolicy,
    ledger: Arc<CostLedger>,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for ResolverAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverAdapter")
            .field("resolver", &self.resolver.name())
            .field("policy", &self.policy)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl ResolverAdapter {
    pub fn new(
        resolver: Arc<dyn ExternalResolver>,
        policy: RetryPolicy,
        ledger: Arc<CostLedger>,
        max_concurrency: usize,
    ) -> Self {
        Self { resolver, policy, ledger, permits: Arc::new(Semaphore::new(max_concurrency.max(1))) }
    }

    pub fn ledger(&self) -> &Arc<CostLedger> {
        &self.ledger
    }

    /// Run the call under the timeout/retry policy.
    ///
    /// Every outcome is a value: cancellation, exhausted retries and budget
    /// exhaustion all come back as typed errors.
    pub async fn resolve(
        &self,
        mut request: ResolveRequest,
        cancel: &CancellationToken,
    ) -> Result<ResolverReply, ResolverError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| ResolverError::Cancelled)?,
        };

        let attempts = self.policy.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reservation = self.ledger.reserve(self.resolver.estimate_cost(&request))?;
            request.budget_remaining = reservation.available();

            let call =
                tokio::time::timeout(self.policy.attempt_timeout, self.resolver.propose(&request));
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                outcome = call => outcome,
            };

            let err = match outcome {
                Ok(Ok(reply)) => {
                    reservation.settle(reply.cost_usd);
                    debug!(
                        snippet = request.target.index,
                        attempt,
                        proposals = reply.proposals.len(),
                        "external resolver answered"
                    );
                    return Ok(reply);
                }
                Ok(Err(err)) => err,
                Err(_elapsed) => ResolverError::Timeout { attempts: attempt },
            };
            drop(reservation);

            if !err.is_retryable() || attempt >= attempts {
                warn!(
                    snippet = request.target.index,
                    attempt,
                    attempts,
                    error = %err,
                    "external resolver gave up"
                );
                return Err(match err {
                    ResolverError::Timeout { .. } => ResolverError::Timeout { attempts: attempt },
                    other => other,
                });
            }

            let delay = self.policy.delay_after(attempt, &err);
            warn!(
                snippet = request.target.index,
                attempt,
                attempts,
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "external resolver attempt failed; retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolverError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
