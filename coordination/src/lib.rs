//! Hive Coordination Library
//!
//! Collective decision-making for an agent swarm:
//! - Weighted, quorum-gated voting sessions with deadlines and tie-breaking
//! - A decision orchestrator that turns agent reports into executable plans
//! - An emergency fast path that always yields an action
//! - Weight recalibration from the outcome history of past decisions
//!
//! # Modules
//!
//! - `voting`: `VotingEngine`, sessions, tallies, tie-breaks, metrics
//! - `orchestrator`: `DecisionOrchestrator` and its pipeline stages
//! - `ports`: collaborator traits (participants, memory, communication)
//! - `memory`: journaled in-process decision store
//! - `events`: broadcast event bus and bounded history
//! - `simulation`: scripted participants loaded from TOML
//!
//! # Usage
//!
//! ```bash
//! # Strategic decision over a scripted swarm
//! hive-coordination --swarm swarm.toml decide "Which region next?"
//!
//! # Emergency with a persistent decision journal
//! hive-coordination --swarm swarm.toml --store decisions.jsonl emergency "db outage" --severity high
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod events;
pub mod memory;
pub mod orchestrator;
pub mod ports;
pub mod simulation;
pub mod state;
pub mod voting;

// Re-export configuration
pub use config::{
    ConfigError, ConfigResult, HiveConfig, OrchestratorConfig, TieBreaker, TieFallback,
    VotingConfig,
};

// Re-export key state types
pub use state::{
    AgentId, AgentReport, AgentStatus, Ballot, ConsensusStrength, DecisionKind, ImplementationPlan,
    MajorityResult, QueenDecision, Severity, TopicKind, Urgency, Vote, VotingId, VotingOption,
    VotingTopic,
};

// Re-export key event types
pub use events::{EventBus, EventBusExt, EventFilter, EventHistory, HiveEvent, SharedEventBus};

// Re-export voting types
pub use voting::{SharedVotingEngine, VotingEngine, VotingError, VotingMetrics, VotingStatus};

// Re-export orchestrator types
pub use orchestrator::{
    DecisionOrchestrator, DecisionOutcome, EmergencyAction, HealthReport, OrchestratorError,
    SharedDecisionOrchestrator, SwarmHealth,
};

// Re-export collaborator ports
pub use ports::{
    Communicator, DecisionMemory, MemoryError, Participant, ParticipantError, Recommendation,
    RecordingCommunicator, SharedCommunicator, SharedDecisionMemory, SharedParticipant,
};

pub use memory::InMemoryDecisionStore;
pub use simulation::{ScriptedParticipant, SwarmSpec};
