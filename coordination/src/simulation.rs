//! Scripted participants for drills, demos and tests
//!
//! A swarm file lists agents with a canned recommendation, confidence,
//! latency and failure mode:
//!
//! ```toml
//! [[agent]]
//! id = "scout-1"
//! agent_type = "scout"
//! recommendation = { action = "expand", region = "eu" }
//! confidence = 0.8
//! latency_ms = 200
//! emergency_action = "contain"
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::ports::{Participant, ParticipantError, Recommendation, SharedParticipant};
use crate::state::AgentStatus;

/// Errors loading a swarm file
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Failed to read swarm file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse swarm file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),
}

fn default_agent_type() -> String {
    "worker".to_string()
}

fn default_status() -> AgentStatus {
    AgentStatus::Active
}

fn default_confidence() -> f64 {
    0.5
}

/// One scripted agent as written in a swarm file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentScript {
    pub id: String,
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    #[serde(default = "default_status")]
    pub status: AgentStatus,
    pub recommendation: Value,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub latency_ms: u64,
    /// Fail every report request
    #[serde(default)]
    pub fail: bool,
    /// Recommendation used when the context is flagged as an emergency
    #[serde(default)]
    pub emergency_action: Option<String>,
}

/// A whole scripted swarm
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmSpec {
    #[serde(rename = "agent", default)]
    pub agents: Vec<AgentScript>,
}

impl SwarmSpec {
    pub fn from_toml_str(content: &str) -> Result<Self, SimulationError> {
        let spec: SwarmSpec = toml::from_str(content)?;
        let mut seen = std::collections::HashSet::new();
        for agent in &spec.agents {
            if !seen.insert(agent.id.as_str()) {
                return Err(SimulationError::DuplicateAgent(agent.id.clone()));
            }
        }
        Ok(spec)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Build a participant per scripted agent
    pub fn participants(&self) -> Vec<SharedParticipant> {
        self.agents
            .iter()
            .map(|script| Arc::new(ScriptedParticipant::from_script(script.clone())) as SharedParticipant)
            .collect()
    }
}

/// Participant that answers from a script
pub struct ScriptedParticipant {
    script: AgentScript,
    calls: AtomicUsize,
}

impl ScriptedParticipant {
    pub fn new(id: impl Into<String>, recommendation: Value, confidence: f64) -> Self {
        Self::from_script(AgentScript {
            id: id.into(),
            agent_type: default_agent_type(),
            status: AgentStatus::Active,
            recommendation,
            confidence,
            reasoning: String::new(),
            latency_ms: 0,
            fail: false,
            emergency_action: None,
        })
    }

    pub fn from_script(script: AgentScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.script.status = status;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.script.latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.script.reasoning = reasoning.into();
        self
    }

    pub fn with_emergency_action(mut self, action: impl Into<String>) -> Self {
        self.script.emergency_action = Some(action.into());
        self
    }

    pub fn failing(mut self) -> Self {
        self.script.fail = true;
        self
    }

    pub fn shared(self) -> SharedParticipant {
        Arc::new(self)
    }

    /// How many report requests this participant has received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Participant for ScriptedParticipant {
    fn id(&self) -> &str {
        &self.script.id
    }

    fn agent_type(&self) -> &str {
        &self.script.agent_type
    }

    fn status(&self) -> AgentStatus {
        self.script.status
    }

    async fn generate_report(
        &self,
        topic: &str,
        context: &Value,
    ) -> Result<Recommendation, ParticipantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.script.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.latency_ms)).await;
        }
        if self.script.fail {
            return Err(ParticipantError::Failed(format!(
                "{} scripted to fail",
                self.script.id
            )));
        }

        let emergency = context
            .get("emergency")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let recommendation = match (&self.script.emergency_action, emergency) {
            (Some(action), true) => Value::String(action.clone()),
            _ => self.script.recommendation.clone(),
        };

        debug!(agent_id = %self.script.id, topic, "Scripted report");
        Ok(Recommendation::new(
            recommendation,
            self.script.confidence,
            self.script.reasoning.clone(),
        ))
    }
}
