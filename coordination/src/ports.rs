//! Collaborator interfaces consumed by the orchestrator
//!
//! Participants produce recommendations, the decision memory stores and
//! analyses past decisions, and the communicator delivers plan assignments.
//! None of them are implemented by the core beyond the reference adapters in
//! `memory` and `simulation` and the `RecordingCommunicator` below.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::state::{
    clamp_confidence, AgentId, AgentStatus, DecisionId, DecisionKind, QueenDecision, Urgency,
};

// =============================================================================
// Participants
// =============================================================================

/// Errors a participant may return instead of a report
#[derive(Debug, Clone, Error)]
pub enum ParticipantError {
    #[error("Participant unavailable: {0}")]
    Unavailable(String),

    #[error("Report generation failed: {0}")]
    Failed(String),
}

/// What a participant recommends for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation: Value,
    /// Confidence (0.0 to 1.0)
    pub confidence: f64,
    pub reasoning: String,
}

impl Recommendation {
    pub fn new(recommendation: Value, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            recommendation,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }
}

/// An agent that can be polled for a recommendation
///
/// Implementations must tolerate concurrent calls, including calls that the
/// emergency path abandons after its own shorter timeout.
#[async_trait]
pub trait Participant: Send + Sync {
    fn id(&self) -> &str;

    fn agent_type(&self) -> &str;

    fn status(&self) -> AgentStatus;

    async fn generate_report(
        &self,
        topic: &str,
        context: &Value,
    ) -> Result<Recommendation, ParticipantError>;
}

/// Shared reference to a participant
pub type SharedParticipant = Arc<dyn Participant>;

// =============================================================================
// Decision memory
// =============================================================================

/// Errors from the decision memory
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decision not found: {0}")]
    NotFound(DecisionId),
}

/// Historical track record of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: AgentId,
    /// Fraction of decisions with a known outcome the agent called right
    pub success_rate: Option<f64>,
    /// Decisions with a known outcome the agent voted in
    pub decisions: usize,
}

/// A past decision structurally similar to a new one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarDecision {
    pub decision_id: DecisionId,
    pub decision: String,
    pub successful: bool,
    pub timestamp: DateTime<Utc>,
}

/// Health of the memory collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHealth {
    pub healthy: bool,
    pub stored_decisions: usize,
    /// Fraction of capacity in use (0.0 to 1.0)
    pub usage: f64,
    pub detail: String,
}

/// Persistence and learning collaborator
#[async_trait]
pub trait DecisionMemory: Send + Sync {
    async fn store_decision(&self, decision: &QueenDecision) -> Result<(), MemoryError>;

    async fn get_decision_history(&self) -> Result<Vec<QueenDecision>, MemoryError>;

    /// Success rate per agent over the given history
    async fn analyze_decision_patterns(
        &self,
        history: &[QueenDecision],
    ) -> Result<Vec<AgentPerformance>, MemoryError>;

    /// Past decisions of the same kind whose winning value matches `value`
    async fn find_similar_decisions(
        &self,
        kind: DecisionKind,
        value: &Value,
    ) -> Result<Vec<SimilarDecision>, MemoryError>;

    async fn health(&self) -> Result<MemoryHealth, MemoryError>;
}

/// Shared reference to a decision memory
pub type SharedDecisionMemory = Arc<dyn DecisionMemory>;

// =============================================================================
// Communication
// =============================================================================

/// Errors from the communication collaborator
#[derive(Debug, Clone, Error)]
pub enum CommunicationError {
    #[error("Recipient unreachable: {0}")]
    Unreachable(AgentId),

    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Kind of message sent to agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plan step to schedule
    Assignment,
    /// Plan step to execute now
    Execute,
    Broadcast,
}

/// Delivery priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl From<Urgency> for Priority {
    fn from(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Low => Priority::Low,
            Urgency::Normal => Priority::Normal,
            Urgency::High => Priority::High,
            Urgency::Critical => Priority::Critical,
        }
    }
}

/// A message from the coordinator to an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmMessage {
    pub id: String,
    pub from: AgentId,
    pub to: AgentId,
    pub message_type: MessageType,
    pub priority: Priority,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

impl SwarmMessage {
    pub fn new(
        from: impl Into<AgentId>,
        to: impl Into<AgentId>,
        message_type: MessageType,
        priority: Priority,
        content: Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            message_type,
            priority,
            content,
            timestamp: Utc::now(),
        }
    }
}

/// Delivery collaborator for plan assignments
#[async_trait]
pub trait Communicator: Send + Sync {
    async fn send_message(&self, message: SwarmMessage) -> Result<(), CommunicationError>;
}

/// Shared reference to a communicator
pub type SharedCommunicator = Arc<dyn Communicator>;

/// Communicator that logs and keeps every message it is handed
#[derive(Default)]
pub struct RecordingCommunicator {
    sent: Mutex<Vec<SwarmMessage>>,
    unreachable: HashSet<AgentId>,
}

impl RecordingCommunicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail deliveries to the given agents
    pub fn with_unreachable(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.unreachable.extend(agents);
        self
    }

    /// Messages delivered so far, in send order
    pub async fn messages(&self) -> Vec<SwarmMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn messages_to(&self, agent_id: &str) -> Vec<SwarmMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.to == agent_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Communicator for RecordingCommunicator {
    async fn send_message(&self, message: SwarmMessage) -> Result<(), CommunicationError> {
        if self.unreachable.contains(&message.to) {
            warn!(to = %message.to, "Recipient unreachable");
            return Err(CommunicationError::Unreachable(message.to));
        }

        debug!(
            to = %message.to,
            message_type = ?message.message_type,
            priority = ?message.priority,
            "Message sent"
        );
        self.sent.lock().await.push(message);
        Ok(())
    }
}
