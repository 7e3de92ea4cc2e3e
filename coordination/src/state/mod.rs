//! Shared data model for hive decision making
//!
//! Everything that crosses a module boundary lives here: voting topics and
//! options, ballots and recorded votes, majority results, agent reports, and
//! the durable `QueenDecision` with its implementation plan.
//!
//! # Usage
//!
//! ```ignore
//! use hive_coordination::state::{Ballot, TopicKind, VotingOption, VotingTopic};
//! use serde_json::json;
//!
//! let topic = VotingTopic::new(
//!     TopicKind::Decision,
//!     "Which region first?",
//!     vec![
//!         VotingOption::new("eu", json!("eu-west"), "Europe"),
//!         VotingOption::new("us", json!("us-east"), "North America"),
//!     ],
//!     json!({}),
//! );
//! let ballot = Ballot::new("scout-1", "eu").with_confidence(0.8);
//! ```

pub mod canonical;
pub mod types;

// Re-export core types
pub use canonical::{canonical_key, canonicalize};
pub use types::{
    clamp_confidence, clamp_weight, AgentAssignment, AgentId, AgentReport, AgentStatus, Ballot,
    ConsensusStrength, DecisionId, DecisionKind, ExecutionStep, ImplementationPlan,
    MajorityResult, OptionId, Participation, QueenDecision, Severity, TieResolution, Timeline,
    TimelineEntry, TopicKind, Urgency, Vote, VotingId, VotingOption, VotingStats, VotingTopic,
    DEFAULT_WEIGHT, MAX_WEIGHT, MIN_WEIGHT,
};
