//! Event types for hive coordination
//!
//! These notifications are the observable side effects of the voting engine
//! and the decision orchestrator, consumed by operators and dashboards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::health::SwarmHealth;
use crate::state::{
    AgentId, DecisionId, DecisionKind, MajorityResult, OptionId, Severity, TieResolution,
    VotingId,
};

/// Unique identifier for events
pub type EventId = String;

/// All hive coordination events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HiveEvent {
    /// A voting session was opened
    VotingStarted {
        voting_id: VotingId,
        question: String,
        option_ids: Vec<OptionId>,
        eligible_voters: usize,
        deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A vote was recorded (or replaced an earlier vote from the same agent)
    VoteCast {
        voting_id: VotingId,
        agent_id: AgentId,
        option_id: OptionId,
        weight: f64,
        replaced: bool,
        timestamp: DateTime<Utc>,
    },

    /// A voting session reached its terminal result
    VotingClosed {
        voting_id: VotingId,
        winner: Option<OptionId>,
        vote_summary: VoteSummary,
        timestamp: DateTime<Utc>,
    },

    /// Quorum failed; no decision was made
    DecisionDeferred {
        voting_id: VotingId,
        participation_rate: f64,
        quorum_required: f64,
        timestamp: DateTime<Utc>,
    },

    /// Options are tied and the coordinator is asked to pick one
    TieBreakNeeded {
        voting_id: VotingId,
        tied_options: Vec<OptionId>,
        timestamp: DateTime<Utc>,
    },

    /// A tie was settled
    TieBreakResolved {
        voting_id: VotingId,
        option_id: OptionId,
        resolution: TieResolution,
        timestamp: DateTime<Utc>,
    },

    /// The orchestrator produced a decision
    DecisionMade {
        decision_id: DecisionId,
        voting_id: VotingId,
        kind: DecisionKind,
        decision: String,
        timestamp: DateTime<Utc>,
    },

    /// The emergency path produced and executed a decision
    EmergencyHandled {
        decision_id: DecisionId,
        severity: Severity,
        action: OptionId,
        responders: usize,
        timestamp: DateTime<Utc>,
    },

    /// Periodic swarm health snapshot
    HealthReport {
        overall: SwarmHealth,
        healthy_agents: usize,
        total_agents: usize,
        recommendations: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An agent failed to deliver a report and was left out
    ReportFailed {
        agent_id: AgentId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl HiveEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HiveEvent::VotingStarted { timestamp, .. } => *timestamp,
            HiveEvent::VoteCast { timestamp, .. } => *timestamp,
            HiveEvent::VotingClosed { timestamp, .. } => *timestamp,
            HiveEvent::DecisionDeferred { timestamp, .. } => *timestamp,
            HiveEvent::TieBreakNeeded { timestamp, .. } => *timestamp,
            HiveEvent::TieBreakResolved { timestamp, .. } => *timestamp,
            HiveEvent::DecisionMade { timestamp, .. } => *timestamp,
            HiveEvent::EmergencyHandled { timestamp, .. } => *timestamp,
            HiveEvent::HealthReport { timestamp, .. } => *timestamp,
            HiveEvent::ReportFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            HiveEvent::VotingStarted { .. } => "voting_started",
            HiveEvent::VoteCast { .. } => "vote_cast",
            HiveEvent::VotingClosed { .. } => "voting_closed",
            HiveEvent::DecisionDeferred { .. } => "decision_deferred",
            HiveEvent::TieBreakNeeded { .. } => "tie_break_needed",
            HiveEvent::TieBreakResolved { .. } => "tie_break_resolved",
            HiveEvent::DecisionMade { .. } => "decision_made",
            HiveEvent::EmergencyHandled { .. } => "emergency_handled",
            HiveEvent::HealthReport { .. } => "health_report",
            HiveEvent::ReportFailed { .. } => "report_failed",
        }
    }

    /// Get the voting session ID if this event is session-scoped
    pub fn voting_id(&self) -> Option<&str> {
        match self {
            HiveEvent::VotingStarted { voting_id, .. } => Some(voting_id),
            HiveEvent::VoteCast { voting_id, .. } => Some(voting_id),
            HiveEvent::VotingClosed { voting_id, .. } => Some(voting_id),
            HiveEvent::DecisionDeferred { voting_id, .. } => Some(voting_id),
            HiveEvent::TieBreakNeeded { voting_id, .. } => Some(voting_id),
            HiveEvent::TieBreakResolved { voting_id, .. } => Some(voting_id),
            HiveEvent::DecisionMade { voting_id, .. } => Some(voting_id),
            _ => None,
        }
    }

    /// Get the decision ID if this event is decision-scoped
    pub fn decision_id(&self) -> Option<&str> {
        match self {
            HiveEvent::DecisionMade { decision_id, .. } => Some(decision_id),
            HiveEvent::EmergencyHandled { decision_id, .. } => Some(decision_id),
            _ => None,
        }
    }

    /// Create a new unique event ID
    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Summary of voting results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSummary {
    /// Total votes counted
    pub total_votes: usize,
    /// Fraction of eligible voters that voted
    pub participation_rate: f64,
    /// Weight lead of the winner over the runner-up
    pub margin: f64,
    pub tie: bool,
    pub deferred: bool,
}

impl VoteSummary {
    /// Summarize a closed session
    pub fn from_result(result: &MajorityResult) -> Self {
        let mut sums: Vec<f64> = result
            .voting_stats
            .weight_per_option
            .values()
            .copied()
            .collect();
        sums.sort_by(|a, b| b.total_cmp(a));
        let margin = match sums.as_slice() {
            [first, second, ..] => first - second,
            [only] => *only,
            [] => 0.0,
        };

        Self {
            total_votes: result.voting_stats.total_votes,
            participation_rate: result.participation.participation_rate,
            margin,
            tie: result.tie,
            deferred: result.deferred,
        }
    }
}
