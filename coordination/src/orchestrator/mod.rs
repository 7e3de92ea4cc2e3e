//! Decision orchestrator
//!
//! Drives the end-to-end decision pipeline on top of the voting engine:
//!
//! ```text
//! GATHERING ──▶ VOTING ──▶ SYNTHESIZING ──▶ PLANNING ──▶ DONE
//!                  │
//!                  └──▶ DEFERRED (quorum not met)
//! ```
//!
//! - `coordinator`: `DecisionOrchestrator`, strategic decisions and health
//! - `emergency`: the compressed, action-biased path
//! - `options`: ballot derivation from reports
//! - `synthesis`: decision text and rationale
//! - `planning`: steps, assignments, timeline
//! - `learner`: weight recalibration from history
//! - `health`: swarm health assessment
//! - `phase`: per-run phase state machine

pub mod coordinator;
pub mod emergency;
pub mod health;
pub mod learner;
pub mod options;
pub mod phase;
pub mod planning;
pub mod synthesis;

pub use coordinator::{
    DecisionOrchestrator, DecisionOutcome, OrchestratorError, OrchestratorResult,
    SharedDecisionOrchestrator,
};
pub use emergency::EmergencyAction;
pub use health::{HealthReport, SwarmHealth};
pub use learner::LearningSummary;
pub use phase::{DecisionPhase, DecisionRun, TransitionError};
