//! Core types for hive decision making
//!
//! These types flow between the voting engine, the decision orchestrator and
//! the external memory collaborator, and are serialized for storage and for
//! operator dashboards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a participating agent
pub type AgentId = String;

/// Unique identifier for voting sessions
pub type VotingId = String;

/// Identifier of an option within a voting topic
pub type OptionId = String;

/// Unique identifier for queen decisions
pub type DecisionId = String;

/// Lowest weight an agent can carry
pub const MIN_WEIGHT: f64 = 0.0;

/// Highest weight an agent can carry, reserved for the coordinator's emergency override
pub const MAX_WEIGHT: f64 = 1.5;

/// Weight of an agent the weight table has never seen
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Clamp a weight into the `[MIN_WEIGHT, MAX_WEIGHT]` range. NaN collapses to zero.
pub fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        return MIN_WEIGHT;
    }
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

/// Clamp a confidence into `[0.0, 1.0]`. NaN collapses to zero.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// One choice on a voting topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingOption {
    /// Option identifier, unique within its topic
    pub id: OptionId,
    /// Opaque recommendation payload
    pub value: Value,
    /// Human-readable description
    pub description: String,
    /// Agent that first proposed this option
    pub proposed_by: Option<AgentId>,
}

impl VotingOption {
    /// Create a new option
    pub fn new(id: impl Into<OptionId>, value: Value, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value,
            description: description.into(),
            proposed_by: None,
        }
    }

    /// Tag the proposing agent
    pub fn proposed_by(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.proposed_by = Some(agent_id.into());
        self
    }
}

/// What kind of question a topic asks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    /// Choose among strategic alternatives
    Decision,
    /// Choose an action to take now
    Action,
}

/// The question a voting session decides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingTopic {
    /// Unique topic identifier
    pub id: String,
    /// Topic kind
    pub kind: TopicKind,
    /// The question being decided
    pub question: String,
    /// Options on the ballot, in ballot order
    pub options: Vec<VotingOption>,
    /// Free-form context passed along with the question
    pub context: Value,
}

impl VotingTopic {
    /// Create a fresh topic
    pub fn new(
        kind: TopicKind,
        question: impl Into<String>,
        options: Vec<VotingOption>,
        context: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            question: question.into(),
            options,
            context,
        }
    }

    /// Look up an option by id
    pub fn option(&self, option_id: &str) -> Option<&VotingOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Position of an option on the ballot
    pub fn position(&self, option_id: &str) -> Option<usize> {
        self.options.iter().position(|o| o.id == option_id)
    }
}

/// A vote as submitted by a caller, before the engine resolves its weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub agent_id: AgentId,
    pub option_id: OptionId,
    /// Confidence in the choice (0.0 to 1.0)
    pub confidence: f64,
    pub reasoning: String,
    /// Explicit weight, accepted only from the coordinator
    pub weight_override: Option<f64>,
}

impl Ballot {
    /// Create a ballot with full confidence and no reasoning
    pub fn new(agent_id: impl Into<AgentId>, option_id: impl Into<OptionId>) -> Self {
        Self {
            agent_id: agent_id.into(),
            option_id: option_id.into(),
            confidence: 1.0,
            reasoning: String::new(),
            weight_override: None,
        }
    }

    /// Set confidence (clamped to 0.0..=1.0)
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Set reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Request an explicit weight
    pub fn with_weight_override(mut self, weight: f64) -> Self {
        self.weight_override = Some(weight);
        self
    }
}

/// A vote recorded in a session, with its resolved weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub agent_id: AgentId,
    pub option_id: OptionId,
    pub weight: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate tally figures of a closed session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VotingStats {
    /// Number of votes counted
    pub total_votes: usize,
    /// Share of the total weight received by each option (0.0 to 1.0)
    pub percentage_per_option: BTreeMap<OptionId, f64>,
    /// Summed weight received by each option
    pub weight_per_option: BTreeMap<OptionId, f64>,
}

/// Turnout of a closed session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub eligible_voters: usize,
    pub actual_voters: usize,
    pub participation_rate: f64,
}

impl Participation {
    /// Compute turnout; an empty electorate has zero participation
    pub fn new(eligible_voters: usize, actual_voters: usize) -> Self {
        let participation_rate = if eligible_voters == 0 {
            0.0
        } else {
            actual_voters as f64 / eligible_voters as f64
        };
        Self {
            eligible_voters,
            actual_voters,
            participation_rate,
        }
    }
}

/// How a tie was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieResolution {
    /// The coordinator picked the winner
    Coordinator,
    /// No coordinator answer arrived in time; the configured fallback applied
    Fallback,
    /// Uniform random choice among the tied options
    Random,
}

impl std::fmt::Display for TieResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TieResolution::Coordinator => write!(f, "coordinator"),
            TieResolution::Fallback => write!(f, "fallback"),
            TieResolution::Random => write!(f, "random"),
        }
    }
}

/// Terminal result of a voting session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorityResult {
    pub voting_id: VotingId,
    /// Winning option; `None` when the session was deferred
    pub winner: Option<VotingOption>,
    pub voting_stats: VotingStats,
    pub participation: Participation,
    /// Whether two or more options shared the greatest weighted sum
    pub tie: bool,
    /// Options that shared the greatest weighted sum, in ballot order
    pub tied_options: Vec<OptionId>,
    pub tie_resolution: Option<TieResolution>,
    /// Quorum was not met; no winner was resolved
    pub deferred: bool,
    /// Winner's share reached the configured voting threshold
    pub threshold_met: bool,
    /// Votes counted at close, ordered by agent id
    pub votes: Vec<Vote>,
    pub closed_at: DateTime<Utc>,
}

impl MajorityResult {
    /// Share of the total weight held by the winner
    pub fn winning_share(&self) -> Option<f64> {
        let winner = self.winner.as_ref()?;
        Some(
            self.voting_stats
                .percentage_per_option
                .get(&winner.id)
                .copied()
                .unwrap_or(0.0),
        )
    }

    /// Strength of the winning margin
    pub fn strength(&self) -> Option<ConsensusStrength> {
        self.winning_share().map(ConsensusStrength::from_share)
    }

    /// Vote cast by a given agent, if any
    pub fn vote_of(&self, agent_id: &str) -> Option<&Vote> {
        self.votes.iter().find(|v| v.agent_id == agent_id)
    }
}

/// How convincingly the winner won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrength {
    /// Below 50% of the weight
    Weak,
    /// 50% to 75% of the weight
    Moderate,
    /// Above 75% of the weight
    Strong,
}

impl ConsensusStrength {
    pub fn from_share(share: f64) -> Self {
        if share < 0.5 {
            ConsensusStrength::Weak
        } else if share <= 0.75 {
            ConsensusStrength::Moderate
        } else {
            ConsensusStrength::Strong
        }
    }
}

impl std::fmt::Display for ConsensusStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusStrength::Weak => write!(f, "weak"),
            ConsensusStrength::Moderate => write!(f, "moderate"),
            ConsensusStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Availability of an agent as reported by the agent itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Ready for work
    Active,
    /// Working, still responsive
    Busy,
    /// Responsive but not currently engaged
    Idle,
    /// Responding with errors or slowly
    Degraded,
    /// Not responding
    Offline,
}

impl AgentStatus {
    /// Whether the agent counts towards swarm health
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Active | Self::Busy | Self::Idle)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Busy => write!(f, "busy"),
            Self::Idle => write!(f, "idle"),
            Self::Degraded => write!(f, "degraded"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// A participant's recommendation, as gathered by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub agent_id: AgentId,
    pub agent_type: String,
    pub status: AgentStatus,
    pub recommendation: Value,
    /// Confidence (0.0 to 1.0)
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// Whether a decision was deliberated or fast-pathed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Strategic,
    Emergency,
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionKind::Strategic => write!(f, "strategic"),
            DecisionKind::Emergency => write!(f, "emergency"),
        }
    }
}

/// One unit of work in an implementation plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: String,
    pub description: String,
    pub estimated_minutes: u32,
}

/// Step-to-agent assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssignment {
    pub step_id: String,
    pub agent_id: AgentId,
}

/// Scheduled window of one step, relative to plan start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub step_id: String,
    pub start_minute: u32,
    pub end_minute: u32,
}

/// Sequential schedule of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub total_minutes: u32,
}

/// Executable plan derived from a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    pub steps: Vec<ExecutionStep>,
    pub assignments: Vec<AgentAssignment>,
    pub timeline: Timeline,
    pub success_criteria: Vec<String>,
}

impl ImplementationPlan {
    /// Steps assigned to one agent
    pub fn steps_for(&self, agent_id: &str) -> Vec<&ExecutionStep> {
        self.assignments
            .iter()
            .filter(|a| a.agent_id == agent_id)
            .filter_map(|a| self.steps.iter().find(|s| s.id == a.step_id))
            .collect()
    }
}

/// The durable output of the decision pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueenDecision {
    pub id: DecisionId,
    pub kind: DecisionKind,
    /// The question that was decided
    pub topic: String,
    /// Synthesized decision text
    pub decision: String,
    pub rationale: String,
    pub majority: MajorityResult,
    pub implementation: ImplementationPlan,
    pub timestamp: DateTime<Utc>,
}

impl QueenDecision {
    /// Value of the winning option, if the majority produced one
    pub fn winning_value(&self) -> Option<&Value> {
        self.majority.winner.as_ref().map(|w| &w.value)
    }
}

/// How pressing a strategic decision is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Urgency {
    /// Multiplier applied to step duration estimates
    pub fn duration_factor(self) -> f64 {
        match self {
            Urgency::Low | Urgency::Normal => 1.0,
            Urgency::High => 0.5,
            Urgency::Critical => 0.25,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Normal => write!(f, "normal"),
            Urgency::High => write!(f, "high"),
            Urgency::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "normal" => Ok(Urgency::Normal),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            _ => Err(format!(
                "Unknown urgency: {}. Valid: low, normal, high, critical",
                s
            )),
        }
    }
}

/// Severity of an emergency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!(
                "Unknown severity: {}. Valid: low, medium, high, critical",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_weight() {
        assert_eq!(clamp_weight(-3.0), 0.0);
        assert_eq!(clamp_weight(0.7), 0.7);
        assert_eq!(clamp_weight(1.5), 1.5);
        assert_eq!(clamp_weight(42.0), 1.5);
        assert_eq!(clamp_weight(f64::NAN), 0.0);
        assert_eq!(clamp_weight(f64::INFINITY), 1.5);
    }

    #[test]
    fn test_participation_rate() {
        let p = Participation::new(4, 1);
        assert_eq!(p.participation_rate, 0.25);

        let empty = Participation::new(0, 0);
        assert_eq!(empty.participation_rate, 0.0);
    }

    #[test]
    fn test_consensus_strength_bands() {
        assert_eq!(ConsensusStrength::from_share(0.49), ConsensusStrength::Weak);
        assert_eq!(ConsensusStrength::from_share(0.5), ConsensusStrength::Moderate);
        assert_eq!(ConsensusStrength::from_share(0.75), ConsensusStrength::Moderate);
        assert_eq!(ConsensusStrength::from_share(0.76), ConsensusStrength::Strong);
    }

    #[test]
    fn test_ballot_builder_clamps_confidence() {
        let ballot = Ballot::new("a1", "opt-1")
            .with_confidence(1.7)
            .with_reasoning("sure");
        assert_eq!(ballot.confidence, 1.0);
        assert_eq!(ballot.reasoning, "sure");
        assert!(ballot.weight_override.is_none());
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(-0.3), 0.0);
        assert_eq!(clamp_confidence(0.4), 0.4);
        assert_eq!(clamp_confidence(12.0), 1.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(Ballot::new("a1", "opt-1").with_confidence(f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_topic_lookup() {
        let topic = VotingTopic::new(
            TopicKind::Decision,
            "Which region?",
            vec![
                VotingOption::new("a", json!("eu"), "EU"),
                VotingOption::new("b", json!("us"), "US"),
            ],
            Value::Null,
        );
        assert_eq!(topic.position("b"), Some(1));
        assert!(topic.option("c").is_none());
    }

    #[test]
    fn test_parse_urgency_and_severity() {
        assert_eq!("HIGH".parse::<Urgency>().ok(), Some(Urgency::High));
        assert!("soon".parse::<Urgency>().is_err());
        assert_eq!("critical".parse::<Severity>().ok(), Some(Severity::Critical));
        assert_eq!(Urgency::default(), Urgency::Normal);
    }

    #[test]
    fn test_status_health() {
        assert!(AgentStatus::Busy.is_healthy());
        assert!(!AgentStatus::Degraded.is_healthy());
        assert!(!AgentStatus::Offline.is_healthy());
    }
}
