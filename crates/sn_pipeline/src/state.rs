use sn_core::RunState;
use tracing::debug;

/// Tracks the run state. Transitions only move forward; stages may be skipped.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    state: RunState,
    history: Vec<RunState>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Moves to `next`. Returns false and stays put when `next` is not ahead of the current state.
    pub fn advance(&mut self, next: RunState) -> bool {
        if next <= self.state {
            debug!(from = ?self.state, to = ?next, "Ignoring backward state transition");
            return false;
        }
        debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
        self.history.push(next);
        true
    }
}
