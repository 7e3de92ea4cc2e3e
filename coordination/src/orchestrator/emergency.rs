//! Emergency path - compressed, action-biased decision pipeline
//!
//! Only active agents are polled, each under a hard per-agent timeout. The
//! session runs over a fixed ballot for a fixed window and is closed when the
//! window ends, whatever is still in flight. The resulting plan is executed
//! immediately.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::TieBreaker;
use crate::events::HiveEvent;
use crate::ports::{MessageType, Priority};
use crate::state::{
    clamp_confidence, AgentId, AgentReport, AgentStatus, Ballot, DecisionKind, QueenDecision,
    Severity, TopicKind, Urgency, VotingOption, VotingTopic,
};

use super::coordinator::{DecisionOrchestrator, OrchestratorResult};
use super::planning::{assignees_by_confidence, build_plan, StepDraft};

/// Minutes budgeted for each emergency step
const EMERGENCY_STEP_MINUTES: u32 = 5;

/// The fixed emergency ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyAction {
    ImmediateAction,
    Escalate,
    Contain,
}

impl EmergencyAction {
    pub const ALL: [EmergencyAction; 3] = [
        EmergencyAction::ImmediateAction,
        EmergencyAction::Escalate,
        EmergencyAction::Contain,
    ];

    pub fn id(self) -> &'static str {
        match self {
            EmergencyAction::ImmediateAction => "immediate-action",
            EmergencyAction::Escalate => "escalate",
            EmergencyAction::Contain => "contain",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EmergencyAction::ImmediateAction => "Act immediately to resolve the situation",
            EmergencyAction::Escalate => "Escalate to operators for intervention",
            EmergencyAction::Contain => "Contain the impact and stabilize",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    /// Action named by a recommendation: the id itself or an `action` field
    pub fn from_recommendation(value: &Value) -> Option<Self> {
        let id = match value {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("action")?.as_str()?,
            _ => return None,
        };
        Self::from_id(id)
    }

    /// Step templates executed for this action
    pub fn steps(self, situation: &str) -> Vec<StepDraft> {
        let lines: Vec<String> = match self {
            EmergencyAction::ImmediateAction => vec![
                format!("Apply immediate remediation for: {}", situation),
                "Verify the remediation took effect".to_string(),
                "Report status to the coordinator".to_string(),
            ],
            EmergencyAction::Escalate => vec![
                format!("Notify operators about: {}", situation),
                "Collect diagnostics for the escalation".to_string(),
                "Hold changes until operators respond".to_string(),
            ],
            EmergencyAction::Contain => vec![
                format!("Isolate components affected by: {}", situation),
                "Redirect load away from affected components".to_string(),
                "Monitor for spread".to_string(),
            ],
        };
        lines
            .into_iter()
            .map(|l| StepDraft::new(l, EMERGENCY_STEP_MINUTES))
            .collect()
    }

    /// Ballot options in fixed order
    pub fn options() -> Vec<VotingOption> {
        Self::ALL
            .into_iter()
            .map(|a| VotingOption::new(a.id(), json!(a.id()), a.description()))
            .collect()
    }
}

impl DecisionOrchestrator {
    /// Fast-path a decision under a short fixed deadline
    ///
    /// Always produces a decision: a deferred or winnerless vote falls back to
    /// `immediate-action`.
    pub async fn handle_emergency(
        &self,
        situation: &str,
        severity: Severity,
        context: Value,
    ) -> OrchestratorResult<QueenDecision> {
        let coordinator = self.config.voting.coordinator_id.clone();
        let report_timeout = self.config.orchestrator.emergency_report_timeout();
        let window = self.config.orchestrator.emergency_voting_timeout();

        let responders: Vec<_> = self
            .participants
            .iter()
            .filter(|p| p.status() == AgentStatus::Active)
            .cloned()
            .collect();
        let mut eligible: Vec<AgentId> = responders.iter().map(|p| p.id().to_string()).collect();
        if eligible.is_empty() {
            eligible.push(coordinator.clone());
        }

        warn!(
            situation,
            %severity,
            responders = responders.len(),
            "Handling emergency"
        );

        let question = format!("Emergency: {}", situation);
        let emergency_context = match context {
            Value::Object(mut map) => {
                map.insert("emergency".to_string(), json!(true));
                map.insert("severity".to_string(), json!(severity));
                Value::Object(map)
            }
            other => json!({
                "emergency": true,
                "severity": severity,
                "details": other,
            }),
        };

        let topic = VotingTopic::new(
            TopicKind::Action,
            question.clone(),
            EmergencyAction::options(),
            emergency_context.clone(),
        );
        let deadline = Instant::now() + window;
        let voting_id = self
            .engine
            .start_voting_with_timeout(topic, eligible, window)
            .await?;

        // Bias ties towards action before any agent can vote
        if self.config.voting.tie_breaker == TieBreaker::Queen {
            let ballot = Ballot::new(coordinator.clone(), EmergencyAction::ImmediateAction.id())
                .with_weight_override(self.config.orchestrator.coordinator_emergency_weight)
                .with_reasoning("Coordinator emergency vote");
            self.engine.cast_vote(&voting_id, ballot).await?;
        }

        let mut pending: FuturesUnordered<_> = responders
            .iter()
            .map(|participant| {
                let question = question.as_str();
                let ctx = &emergency_context;
                async move {
                    let outcome = tokio::time::timeout(
                        report_timeout,
                        participant.generate_report(question, ctx),
                    )
                    .await;
                    (participant, outcome)
                }
            })
            .collect();

        let mut reports: Vec<AgentReport> = Vec::new();
        let gather = async {
            while let Some((participant, outcome)) = pending.next().await {
                let mut rec = match outcome {
                    Ok(Ok(rec)) => rec,
                    Ok(Err(e)) => {
                        self.report_failed(participant.id(), e.to_string());
                        continue;
                    }
                    Err(_) => {
                        self.report_failed(
                            participant.id(),
                            format!("no report within {}ms", report_timeout.as_millis()),
                        );
                        continue;
                    }
                };
                rec.confidence = clamp_confidence(rec.confidence);

                match EmergencyAction::from_recommendation(&rec.recommendation) {
                    Some(action) => {
                        let ballot = Ballot::new(participant.id(), action.id())
                            .with_confidence(rec.confidence)
                            .with_reasoning(rec.reasoning.clone());
                        if let Err(e) = self.engine.cast_vote(&voting_id, ballot).await {
                            warn!(voting_id = %voting_id, agent_id = participant.id(), error = %e, "Emergency vote dropped");
                        }
                    }
                    None => debug!(agent_id = participant.id(), "Recommendation is not an emergency action"),
                }

                reports.push(AgentReport {
                    agent_id: participant.id().to_string(),
                    agent_type: participant.agent_type().to_string(),
                    status: participant.status(),
                    recommendation: rec.recommendation,
                    confidence: rec.confidence,
                    reasoning: rec.reasoning,
                    timestamp: Utc::now(),
                });
            }
        };
        if tokio::time::timeout_at(deadline, gather).await.is_err() {
            debug!(voting_id = %voting_id, "Emergency window ended with reports outstanding");
        }
        // Stragglers are abandoned; the window always runs to its end
        drop(pending);
        tokio::time::sleep_until(deadline).await;

        let result = self.engine.close_voting(&voting_id).await?;
        let action = match (&result.winner, result.deferred) {
            (Some(winner), false) => {
                EmergencyAction::from_id(&winner.id).unwrap_or(EmergencyAction::ImmediateAction)
            }
            _ => EmergencyAction::ImmediateAction,
        };

        let p = &result.participation;
        let mut rationale = format!(
            "{} severity. {} of {} responders voted; {} carried {:.0}% of weighted votes.",
            severity,
            p.actual_voters,
            p.eligible_voters,
            action.id(),
            result
                .voting_stats
                .percentage_per_option
                .get(action.id())
                .copied()
                .unwrap_or(0.0)
                * 100.0
        );
        if result.deferred || result.winner.is_none() {
            rationale.push_str(" No quorum; defaulting to immediate action.");
        }

        let plan = build_plan(
            action.steps(situation),
            &assignees_by_confidence(&reports),
            &coordinator,
            Urgency::Critical,
            &["situation contained"],
        );

        let decision = QueenDecision {
            id: uuid::Uuid::new_v4().to_string(),
            kind: DecisionKind::Emergency,
            topic: question,
            decision: format!("Emergency response to '{}': {}", situation, action.description()),
            rationale,
            majority: result,
            implementation: plan,
            timestamp: Utc::now(),
        };

        self.memory.store_decision(&decision).await?;
        let executed = self
            .distribute(&decision, MessageType::Execute, Priority::Critical)
            .await;

        info!(
            decision_id = %decision.id,
            action = action.id(),
            responders = reports.len(),
            executed,
            "Emergency handled"
        );
        self.event_bus.publish(HiveEvent::EmergencyHandled {
            decision_id: decision.id.clone(),
            severity,
            action: action.id().to_string(),
            responders: reports.len(),
            timestamp: decision.timestamp,
        });

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_recommendation() {
        assert_eq!(
            EmergencyAction::from_recommendation(&json!("escalate")),
            Some(EmergencyAction::Escalate)
        );
        assert_eq!(
            EmergencyAction::from_recommendation(&json!({"action": "contain", "why": "spread"})),
            Some(EmergencyAction::Contain)
        );
        assert_eq!(EmergencyAction::from_recommendation(&json!("panic")), None);
        assert_eq!(EmergencyAction::from_recommendation(&json!(3)), None);
    }

    #[test]
    fn test_fixed_ballot_order() {
        let ids: Vec<_> = EmergencyAction::options().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["immediate-action", "escalate", "contain"]);
    }

    #[test]
    fn test_step_templates_mention_situation() {
        let steps = EmergencyAction::Contain.steps("db outage");
        assert_eq!(steps.len(), 3);
        assert!(steps[0].description.contains("db outage"));
        assert!(steps.iter().all(|s| s.minutes == EMERGENCY_STEP_MINUTES));
    }
}
