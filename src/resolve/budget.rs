//! Run-wide cost accounting for external calls.
//!
//! A call reserves its estimated cost before it starts and settles the
//! actual cost when it answers, so concurrent calls never plan against the
//! same unspent budget.

use crate::error::ResolverError;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct CostLedger {
    budget: f64,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    spent: f64,
    reserved: f64,
    calls: u64,
}

impl LedgerState {
    fn available(&self, budget: f64) -> f64 {
        (budget - self.spent - self.reserved).max(0.0)
    }
}

impl CostLedger {
    pub fn new(budget: f64) -> Self {
        Self { budget: budget.max(0.0), state: Mutex::new(LedgerState::default()) }
    }

    /// Budget not yet spent or held by an in-flight call.
    pub fn remaining(&self) -> f64 {
        self.state.lock().available(self.budget)
    }

    pub fn spent(&self) -> f64 {
        self.state.lock().spent
    }

    pub fn calls(&self) -> u64 {
        self.state.lock().calls
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() <= 0.0
    }

    /// Hold `estimate` against the budget until the returned reservation is
    /// settled or dropped.
    pub fn reserve(&self, estimate: f64) -> Result<Reservation<'_>, ResolverError> {
        let estimate = estimate.max(0.0);
        let mut state = self.state.lock();
        let available = state.available(self.budget);
        if available <= 0.0 || estimate > available {
            return Err(ResolverError::BudgetExhausted { needed: estimate, remaining: available });
        }
        state.reserved += estimate;
        Ok(Reservation { ledger: self, amount: estimate, available, settled: false })
    }

    fn record(&self, state: &mut LedgerState, cost: f64) {
        state.spent += cost.max(0.0);
        state.calls += 1;
        if state.spent >= self.budget {
            tracing::warn!(
                spent = state.spent,
                budget = self.budget,
                "external resolver cost budget exhausted"
            );
        }
    }

    fn release(&self, state: &mut LedgerState, amount: f64) {
        state.reserved = (state.reserved - amount).max(0.0);
    }
}

/// Budget held for one in-flight call. Dropping it unsettled returns the
/// hold to the ledger.
#[derive(Debug)]
pub struct Reservation<'a> {
    ledger: &'a CostLedger,
    amount: f64,
    available: f64,
    settled: bool,
}

impl Reservation<'_> {
    /// Budget that was free for this call, its own hold included.
    pub fn available(&self) -> f64 {
        self.available
    }

    /// Replace the hold with the call's actual cost.
    pub fn settle(mut self, actual: f64) {
        let mut state = self.ledger.state.lock();
        self.ledger.release(&mut state, self.amount);
        self.ledger.record(&mut state, actual);
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut state = self.ledger.state.lock();
            self.ledger.release(&mut state, self.amount);
        }
    }
}
