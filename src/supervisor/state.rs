//! Invocation lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one tool invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationState {
    #[default]
    Created,
    Running,
    Completed,
    Cancelled,
    Killed,
}

impl InvocationState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Killed)
    }
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitState {
    /// The process exited on its own.
    NaturalExit,
    /// Cancellation was observed and the process stopped when asked.
    Cancelled,
    /// Cancellation was observed and the process had to be killed.
    Killed,
}

impl From<ExitState> for InvocationState {
    fn from(state: ExitState) -> Self {
        match state {
            ExitState::NaturalExit => Self::Completed,
            ExitState::Cancelled => Self::Cancelled,
            ExitState::Killed => Self::Killed,
        }
    }
}

/// State machine for tracking one invocation.
///
/// Terminal states are sticky: transitions out of them are ignored.
#[derive(Debug, Clone, Default)]
pub struct InvocationStateMachine {
    state: InvocationState,
}

impl InvocationStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Move to `new_state`. Returns `false` if the machine was already terminal.
    pub fn transition(&mut self, new_state: InvocationState) -> bool {
        if self.state.is_terminal() {
            tracing::warn!(
                from = ?self.state,
                to = ?new_state,
                "Ignoring transition out of terminal state"
            );
            return false;
        }
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
        true
    }
}
