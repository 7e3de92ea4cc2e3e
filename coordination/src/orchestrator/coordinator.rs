//! Decision orchestrator - central pipeline from reports to executable plans
//!
//! The orchestrator polls participants, derives a ballot from their
//! recommendations, runs a voting session, and turns the majority into a
//! `QueenDecision` that is stored and distributed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::HiveConfig;
use crate::events::{HiveEvent, SharedEventBus};
use crate::ports::{
    CommunicationError, MemoryError, MessageType, Priority, SharedCommunicator,
    SharedDecisionMemory, SharedParticipant, SwarmMessage,
};
use crate::state::{
    clamp_confidence, AgentId, AgentReport, Ballot, DecisionKind, MajorityResult, QueenDecision,
    TopicKind, Urgency, VotingId, VotingTopic,
};
use crate::voting::{SharedVotingEngine, VotingEngine, VotingError};

use super::health::{self, HealthReport, HealthThresholds};
use super::learner::{self, LearningSummary};
use super::options::derive_options;
use super::phase::{DecisionPhase, DecisionRun, TransitionError};
use super::planning::{assignees_by_confidence, build_plan, plan_steps};
use super::synthesis::synthesize;

/// Error type for orchestrator operations
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("No agent delivered a report")]
    NoAgentsAvailable,

    #[error("Voting error: {0}")]
    Voting(#[from] VotingError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Phase error: {0}")]
    Transition(#[from] TransitionError),
}

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Shared reference to DecisionOrchestrator
pub type SharedDecisionOrchestrator = Arc<DecisionOrchestrator>;

/// Terminal outcome of a strategic decision
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    /// A decision was made, stored and distributed
    Decided(Box<QueenDecision>),
    /// Quorum failed; the caller decides whether to re-poll or escalate
    Deferred {
        voting_id: VotingId,
        result: Box<MajorityResult>,
    },
}

impl DecisionOutcome {
    pub fn decision(&self) -> Option<&QueenDecision> {
        match self {
            DecisionOutcome::Decided(decision) => Some(&**decision),
            DecisionOutcome::Deferred { .. } => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, DecisionOutcome::Deferred { .. })
    }

    /// Phase the run ended in
    pub fn phase(&self) -> DecisionPhase {
        match self {
            DecisionOutcome::Decided(_) => DecisionPhase::Done,
            DecisionOutcome::Deferred { .. } => DecisionPhase::Deferred,
        }
    }
}

/// Central decision pipeline
pub struct DecisionOrchestrator {
    pub(super) config: HiveConfig,
    pub(super) engine: SharedVotingEngine,
    pub(super) participants: Vec<SharedParticipant>,
    pub(super) memory: SharedDecisionMemory,
    pub(super) communicator: SharedCommunicator,
    pub(super) event_bus: SharedEventBus,
}

impl DecisionOrchestrator {
    /// Create an orchestrator with its own voting engine
    pub fn new(
        config: HiveConfig,
        participants: Vec<SharedParticipant>,
        memory: SharedDecisionMemory,
        communicator: SharedCommunicator,
        event_bus: SharedEventBus,
    ) -> Self {
        let engine = VotingEngine::new(config.voting.clone(), event_bus.clone()).shared();
        Self {
            config,
            engine,
            participants,
            memory,
            communicator,
            event_bus,
        }
    }

    /// Create a shared reference to this orchestrator
    pub fn shared(self) -> SharedDecisionOrchestrator {
        Arc::new(self)
    }

    pub fn engine(&self) -> &SharedVotingEngine {
        &self.engine
    }

    pub fn config(&self) -> &HiveConfig {
        &self.config
    }

    /// Ids of all registered participants
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.participants.iter().map(|p| p.id().to_string()).collect()
    }

    /// Calibrate vote weights from history before the first decision
    pub async fn initialize(&self) -> OrchestratorResult<LearningSummary> {
        info!(
            agents = self.participants.len(),
            coordinator = %self.config.voting.coordinator_id,
            "Initializing decision orchestrator"
        );
        self.analyze_historical_patterns().await
    }

    /// Run the pattern learner against the memory collaborator
    pub async fn analyze_historical_patterns(&self) -> OrchestratorResult<LearningSummary> {
        Ok(learner::analyze_historical_patterns(self.memory.as_ref(), &self.engine).await?)
    }

    // =========================================================================
    // Strategic Decisions
    // =========================================================================

    /// Gather, vote, synthesize, plan, store and distribute
    pub async fn make_strategic_decision(
        &self,
        topic: &str,
        context: Value,
        urgency: Urgency,
    ) -> OrchestratorResult<DecisionOutcome> {
        let mut run = DecisionRun::start();
        info!(topic, %urgency, agents = self.participants.len(), "Strategic decision started");

        let reports = self.gather_reports(topic, &context).await;
        if reports.is_empty() {
            run.fail("no reports");
            warn!(topic, "No agent delivered a report");
            return Err(OrchestratorError::NoAgentsAvailable);
        }

        run.advance(DecisionPhase::Voting, "reports gathered")?;
        let options = derive_options(&reports, self.config.orchestrator.max_options);
        let voting_topic = VotingTopic::new(TopicKind::Decision, topic, options, context.clone());
        let result = match self.vote_on_reports(voting_topic, &reports).await {
            Ok(result) => result,
            Err(e) => {
                run.fail("voting failed");
                return Err(e.into());
            }
        };

        let winner = match result.winner.clone() {
            Some(winner) if !result.deferred => winner,
            _ => {
                run.advance(DecisionPhase::Deferred, "quorum not met")?;
                info!(
                    topic,
                    voting_id = %result.voting_id,
                    participation = result.participation.participation_rate,
                    "Strategic decision deferred"
                );
                return Ok(DecisionOutcome::Deferred {
                    voting_id: result.voting_id.clone(),
                    result: Box::new(result),
                });
            }
        };

        run.advance(DecisionPhase::Synthesizing, "majority reached")?;
        let similar = match self
            .memory
            .find_similar_decisions(DecisionKind::Strategic, &winner.value)
            .await
        {
            Ok(similar) => similar,
            Err(e) => {
                warn!(error = %e, "Similar-decision lookup failed, continuing without history");
                Vec::new()
            }
        };
        let synthesis = synthesize(
            topic,
            &winner,
            &result,
            &similar,
            self.config.voting.voting_threshold,
        );

        run.advance(DecisionPhase::Planning, "decision synthesized")?;
        let drafts = plan_steps(
            &winner.value,
            &synthesis.decision,
            self.config.orchestrator.default_step_minutes,
        );
        let plan = build_plan(
            drafts,
            &assignees_by_confidence(&reports),
            &self.config.voting.coordinator_id,
            urgency,
            &[],
        );

        let decision = QueenDecision {
            id: uuid::Uuid::new_v4().to_string(),
            kind: DecisionKind::Strategic,
            topic: topic.to_string(),
            decision: synthesis.decision,
            rationale: synthesis.rationale,
            majority: result,
            implementation: plan,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.memory.store_decision(&decision).await {
            run.fail("store failed");
            return Err(e.into());
        }
        let delivered = self
            .distribute(&decision, MessageType::Assignment, Priority::from(urgency))
            .await;
        run.advance(DecisionPhase::Done, "decision distributed")?;

        info!(
            decision_id = %decision.id,
            voting_id = %decision.majority.voting_id,
            strength = %synthesis.strength,
            steps = decision.implementation.steps.len(),
            delivered,
            "Strategic decision made"
        );
        self.event_bus.publish(HiveEvent::DecisionMade {
            decision_id: decision.id.clone(),
            voting_id: decision.majority.voting_id.clone(),
            kind: decision.kind,
            decision: decision.decision.clone(),
            timestamp: decision.timestamp,
        });

        if self.config.orchestrator.learn_after_decisions {
            if let Err(e) = self.analyze_historical_patterns().await {
                warn!(error = %e, "Post-decision learning failed");
            }
        }

        Ok(DecisionOutcome::Decided(Box::new(decision)))
    }

    /// Poll every participant concurrently; failures are dropped
    ///
    /// A participant that never answers is cut off at the voting timeout.
    async fn gather_reports(&self, topic: &str, context: &Value) -> Vec<AgentReport> {
        let window = self.config.voting.voting_timeout();
        let requests = self.participants.iter().map(|participant| async move {
            let outcome =
                tokio::time::timeout(window, participant.generate_report(topic, context)).await;
            (participant, outcome)
        });

        let mut reports = Vec::with_capacity(self.participants.len());
        for (participant, outcome) in join_all(requests).await {
            let error = match outcome {
                Ok(Ok(rec)) => {
                    reports.push(AgentReport {
                        agent_id: participant.id().to_string(),
                        agent_type: participant.agent_type().to_string(),
                        status: participant.status(),
                        recommendation: rec.recommendation,
                        confidence: clamp_confidence(rec.confidence),
                        reasoning: rec.reasoning,
                        timestamp: Utc::now(),
                    });
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("no report within {}ms", window.as_millis()),
            };
            self.report_failed(participant.id(), error);
        }

        debug!(
            topic,
            reports = reports.len(),
            agents = self.participants.len(),
            "Reports gathered"
        );
        reports
    }

    /// Open a session over all agents, cast each report's vote, close
    async fn vote_on_reports(
        &self,
        topic: VotingTopic,
        reports: &[AgentReport],
    ) -> Result<MajorityResult, VotingError> {
        let voting_id = self.engine.start_voting(topic, self.agent_ids()).await?;
        let status = self.engine.get_voting_status(&voting_id).await?;

        for report in reports {
            let Some(option) = status.option_for_value(&report.recommendation) else {
                debug!(agent_id = %report.agent_id, "Recommendation not on the ballot");
                continue;
            };
            let ballot = Ballot::new(report.agent_id.clone(), option.id.clone())
                .with_confidence(report.confidence)
                .with_reasoning(report.reasoning.clone());
            if let Err(e) = self.engine.cast_vote(&voting_id, ballot).await {
                warn!(voting_id = %voting_id, agent_id = %report.agent_id, error = %e, "Vote dropped");
            }
        }

        self.engine.close_voting(&voting_id).await
    }

    pub(super) fn report_failed(&self, agent_id: &str, error: String) {
        warn!(agent_id, error = %error, "Agent report failed, excluding");
        self.event_bus.publish(HiveEvent::ReportFailed {
            agent_id: agent_id.to_string(),
            error,
            timestamp: Utc::now(),
        });
    }

    /// Send one message per assignment; returns how many were delivered
    pub(super) async fn distribute(
        &self,
        decision: &QueenDecision,
        message_type: MessageType,
        priority: Priority,
    ) -> usize {
        let plan = &decision.implementation;
        let mut delivered = 0;

        for assignment in &plan.assignments {
            let step = plan.steps.iter().find(|s| s.id == assignment.step_id);
            let content = json!({
                "decision_id": decision.id,
                "decision": decision.decision,
                "step_id": assignment.step_id,
                "description": step.map(|s| s.description.as_str()),
                "estimated_minutes": step.map(|s| s.estimated_minutes),
                "success_criteria": plan.success_criteria,
            });
            let message = SwarmMessage::new(
                self.config.voting.coordinator_id.clone(),
                assignment.agent_id.clone(),
                message_type,
                priority,
                content,
            );

            match self.communicator.send_message(message).await {
                Ok(()) => delivered += 1,
                Err(CommunicationError::Unreachable(agent)) => {
                    warn!(decision_id = %decision.id, agent_id = %agent, "Assignment undeliverable")
                }
                Err(e) => warn!(decision_id = %decision.id, error = %e, "Assignment rejected"),
            }
        }
        delivered
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Combine agent status, memory health and voting metrics
    pub async fn monitor_swarm_health(&self) -> HealthReport {
        let statuses: BTreeMap<AgentId, _> = self
            .participants
            .iter()
            .map(|p| (p.id().to_string(), p.status()))
            .collect();
        let memory = self.memory.health().await.map_err(|e| e.to_string());

        let report = health::assess(
            statuses,
            memory,
            self.engine.get_metrics(),
            HealthThresholds {
                memory_usage_warning: self.config.orchestrator.memory_usage_warning,
                quorum_required: self.config.voting.quorum_required,
            },
        );

        info!(
            overall = %report.overall,
            healthy = report.healthy_agents,
            total = report.total_agents,
            recommendations = report.recommendations.len(),
            "Swarm health assessed"
        );
        self.event_bus.publish(HiveEvent::HealthReport {
            overall: report.overall,
            healthy_agents: report.healthy_agents,
            total_agents: report.total_agents,
            recommendations: report.recommendations.clone(),
            timestamp: report.timestamp,
        });
        report
    }
}
