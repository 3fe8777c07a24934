//! Per-request state machine.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,
    StaticScanned,
    ExternalRequested,
    ExternalDone,
    ExternalFailed,
    ExternalSkipped,
    Merged,
    Synthesized,
    Validated,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::StaticScanned => "STATIC_SCANNED",
            RequestState::ExternalRequested => "EXTERNAL_REQUESTED",
            RequestState::ExternalDone => "EXTERNAL_DONE",
            RequestState::ExternalFailed => "EXTERNAL_FAILED",
            RequestState::ExternalSkipped => "EXTERNAL_SKIPPED",
            RequestState::Merged => "MERGED",
            RequestState::Synthesized => "SYNTHESIZED",
            RequestState::Validated => "VALIDATED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Validated)
    }

    pub fn can_advance_to(&self, next: RequestState) -> bool {
        use self::RequestState::*;
        matches!(
            (self, next),
            (Pending, StaticScanned)
                | (StaticScanned, ExternalRequested)
                | (StaticScanned, ExternalSkipped)
                | (ExternalRequested, ExternalDone)
                | (ExternalRequested, ExternalFailed)
                | (ExternalDone, Merged)
                | (ExternalFailed, Merged)
                | (ExternalSkipped, Merged)
                | (Merged, Synthesized)
                | (Synthesized, Validated)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visited states of one request, starting at `PENDING`.
#[derive(Debug, Clone)]
pub struct StateTrail {
    snippet: usize,
    states: Vec<RequestState>,
}

impl StateTrail {
    pub fn new(snippet: usize) -> Self {
        Self { snippet, states: vec![RequestState::Pending] }
    }

    pub fn current(&self) -> RequestState {
        self.states.last().copied().unwrap_or(RequestState::Pending)
    }

    pub fn advance(&mut self, next: RequestState) {
        let from = self.current();
        debug_assert!(from.can_advance_to(next), "invalid transition {from} -> {next}");
        if !from.can_advance_to(next) {
            tracing::error!(
                snippet = self.snippet,
                %from,
                to = %next,
                "invalid request state transition"
            );
        }
        tracing::trace!(snippet = self.snippet, %from, to = %next, "request state");
        self.states.push(next);
    }

    pub fn into_states(self) -> Vec<RequestState> {
        self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::RequestState::*;

    #[test]
    fn external_branches_converge_on_merged() {
        for branch in [ExternalDone, ExternalFailed] {
            assert!(ExternalRequested.can_advance_to(branch));
            assert!(branch.can_advance_to(Merged));
        }
        assert!(StaticScanned.can_advance_to(ExternalSkipped));
        assert!(ExternalSkipped.can_advance_to(Merged));
    }

    #[test]
    fn failure_never_returns_to_pending() {
        assert!(!ExternalFailed.can_advance_to(Pending));
        assert!(!ExternalSkipped.can_advance_to(Pending));
        assert!(!ExternalFailed.can_advance_to(ExternalRequested));
        assert!(!Validated.can_advance_to(Pending));
        assert!(Validated.is_terminal());
    }

    #[test]
    fn trail_records_the_path() {
        let mut trail = StateTrail::new(3);
        for next in [StaticScanned, ExternalSkipped, Merged, Synthesized, Validated] {
            trail.advance(next);
        }
        assert_eq!(trail.current(), Validated);
        assert_eq!(trail.into_states().len(), 6);
        assert_eq!(serde_json::to_string(&ExternalSkipped).expect("json"), "\"EXTERNAL_SKIPPED\"");
    }
}
