//! Decision phase state machine: phases, transitions and run tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Phase of one decision run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPhase {
    /// Collecting reports from participants.
    Gathering,
    /// A voting session is open.
    Voting,
    /// Turning the majority into decision text and rationale.
    Synthesizing,
    /// Building the implementation plan.
    Planning,
    /// Decision stored and distributed.
    Done,
    /// Quorum failed; no decision.
    Deferred,
    /// The run stopped on an error.
    Failed,
}

impl DecisionPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Deferred | Self::Failed)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [DecisionPhase] {
        match self {
            Self::Gathering => &[Self::Voting, Self::Failed],
            Self::Voting => &[Self::Synthesizing, Self::Deferred, Self::Failed],
            Self::Synthesizing => &[Self::Planning, Self::Failed],
            Self::Planning => &[Self::Done, Self::Failed],
            Self::Done | Self::Deferred | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for DecisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gathering => write!(f, "gathering"),
            Self::Voting => write!(f, "voting"),
            Self::Synthesizing => write!(f, "synthesizing"),
            Self::Planning => write!(f, "planning"),
            Self::Done => write!(f, "done"),
            Self::Deferred => write!(f, "deferred"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: DecisionPhase,
    pub to: DecisionPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DecisionPhase,
    pub to: DecisionPhase,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// Tracks the phase of one decision run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRun {
    pub phase: DecisionPhase,
    pub transitions: Vec<PhaseTransition>,
    pub started_at: DateTime<Utc>,
}

impl DecisionRun {
    /// Start a run in `Gathering`.
    pub fn start() -> Self {
        Self {
            phase: DecisionPhase::Gathering,
            transitions: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Move to `to`, recording why.
    pub fn advance(&mut self, to: DecisionPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
            });
        }

        debug!(from = %self.phase, to = %to, reason, "Decision phase transition");
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    /// Mark the run failed unless it already ended.
    pub fn fail(&mut self, reason: &str) {
        if !self.phase.is_terminal() {
            let _ = self.advance(DecisionPhase::Failed, reason);
        }
    }
}
