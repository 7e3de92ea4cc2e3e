//! Swarm health assessment

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::MemoryHealth;
use crate::state::{AgentId, AgentStatus};
use crate::voting::VotingMetrics;

/// Share of healthy agents above which the swarm is healthy
const HEALTHY_SHARE: f64 = 0.8;
/// Share of healthy agents above which the swarm is degraded rather than critical
const DEGRADED_SHARE: f64 = 0.5;
/// Deferral rate above which sessions are flagged
const DEFERRAL_WARNING: f64 = 0.25;

/// Overall health of the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmHealth {
    Healthy,
    Degraded,
    Critical,
}

impl SwarmHealth {
    /// Classify by the share of healthy agents; an empty swarm is critical
    pub fn from_counts(healthy: usize, total: usize) -> Self {
        if total == 0 {
            return SwarmHealth::Critical;
        }
        let share = healthy as f64 / total as f64;
        if share > HEALTHY_SHARE {
            SwarmHealth::Healthy
        } else if share > DEGRADED_SHARE {
            SwarmHealth::Degraded
        } else {
            SwarmHealth::Critical
        }
    }
}

impl std::fmt::Display for SwarmHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SwarmHealth::Healthy => write!(f, "healthy"),
            SwarmHealth::Degraded => write!(f, "degraded"),
            SwarmHealth::Critical => write!(f, "critical"),
        }
    }
}

/// Snapshot produced by `monitor_swarm_health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: SwarmHealth,
    pub healthy_agents: usize,
    pub total_agents: usize,
    pub agent_statuses: BTreeMap<AgentId, AgentStatus>,
    /// `None` when the memory collaborator could not be reached
    pub memory: Option<MemoryHealth>,
    pub voting: VotingMetrics,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Limits the assessment compares against
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub memory_usage_warning: f64,
    pub quorum_required: f64,
}

/// Combine agent, memory and voting signals into a report
pub fn assess(
    agent_statuses: BTreeMap<AgentId, AgentStatus>,
    memory: Result<MemoryHealth, String>,
    voting: VotingMetrics,
    thresholds: HealthThresholds,
) -> HealthReport {
    let total_agents = agent_statuses.len();
    let healthy_agents = agent_statuses.values().filter(|s| s.is_healthy()).count();
    let overall = SwarmHealth::from_counts(healthy_agents, total_agents);

    let mut recommendations = Vec::new();
    if total_agents == 0 {
        recommendations.push("No agents registered; register participants".to_string());
    } else if healthy_agents < total_agents {
        let unhealthy: Vec<&str> = agent_statuses
            .iter()
            .filter(|(_, s)| !s.is_healthy())
            .map(|(id, _)| id.as_str())
            .collect();
        recommendations.push(format!(
            "{} unhealthy agent(s): {}; investigate or replace",
            unhealthy.len(),
            unhealthy.join(", ")
        ));
    }

    let memory = match memory {
        Ok(health) => {
            if health.usage > thresholds.memory_usage_warning {
                recommendations.push(format!(
                    "Memory usage high ({:.0}%); archive old decisions",
                    health.usage * 100.0
                ));
            }
            if !health.healthy {
                recommendations.push(format!("Memory collaborator unhealthy: {}", health.detail));
            }
            Some(health)
        }
        Err(error) => {
            recommendations.push(format!("Memory collaborator unreachable: {}", error));
            None
        }
    };

    if voting.sessions_closed > 0 && voting.average_participation < thresholds.quorum_required {
        recommendations.push(format!(
            "Average participation {:.0}% is below quorum; check agent responsiveness",
            voting.average_participation * 100.0
        ));
    }
    if voting.deferral_rate() > DEFERRAL_WARNING {
        recommendations.push(format!(
            "{:.0}% of sessions deferred; consider longer voting windows",
            voting.deferral_rate() * 100.0
        ));
    }

    HealthReport {
        overall,
        healthy_agents,
        total_agents,
        agent_statuses,
        memory,
        voting,
        recommendations,
        timestamp: Utc::now(),
    }
}
