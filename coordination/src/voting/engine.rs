//! Voting engine - weighted-majority sessions with quorum and tie-breaking
//!
//! The engine owns the session table and the per-agent weight table. Both are
//! guarded by async locks that are never held across an await, so vote casts
//! and closes racing near a deadline serialize cleanly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{TieBreaker, TieFallback, VotingConfig};
use crate::events::{HiveEvent, SharedEventBus, VoteSummary};
use crate::state::canonical::canonical_key;
use crate::state::{
    clamp_weight, AgentId, Ballot, MajorityResult, OptionId, Participation, TieResolution, Vote,
    VotingId, VotingOption, VotingStats, VotingTopic, DEFAULT_WEIGHT,
};

use super::metrics::{MetricsRecorder, VotingMetrics};
use super::session::{SessionStatus, Tally, VotingSession};
use super::tie_break::{pick_random, ResolveRefusal, TieBreakRegistry};

/// Error type for voting operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VotingError {
    #[error("Invalid voting session {voting_id}: {reason}")]
    InvalidSession { voting_id: VotingId, reason: String },

    #[error("Voting session already closed: {0}")]
    SessionAlreadyClosed(VotingId),

    #[error("No eligible voters")]
    NoEligibleVoters,

    #[error("Topic has no options")]
    EmptyTopic,

    #[error("Agent {agent_id} is not eligible in session {voting_id}")]
    IneligibleVoter { voting_id: VotingId, agent_id: AgentId },

    #[error("Unknown option {option_id} in session {voting_id}")]
    UnknownOption { voting_id: VotingId, option_id: OptionId },

    #[error("Weight override refused for {0}: only the coordinator may override")]
    OverrideNotPermitted(AgentId),

    #[error("No tie-break pending for session {0}")]
    NoTieBreakPending(VotingId),
}

impl VotingError {
    fn invalid(voting_id: &str, reason: &str) -> Self {
        Self::InvalidSession {
            voting_id: voting_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for voting operations
pub type VotingResult<T> = Result<T, VotingError>;

/// Shared reference to VotingEngine
pub type SharedVotingEngine = Arc<VotingEngine>;

/// Read-only snapshot of a session's current tally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingStatus {
    pub voting_id: VotingId,
    pub status: SessionStatus,
    pub question: String,
    pub options: Vec<VotingOption>,
    pub eligible_voters: usize,
    pub votes_cast: usize,
    pub stats: VotingStats,
    /// Options currently sharing the greatest weighted sum
    pub leading: Vec<OptionId>,
    pub deadline: chrono::DateTime<Utc>,
}

impl VotingStatus {
    /// Option whose value structurally equals `value`
    pub fn option_for_value(&self, value: &serde_json::Value) -> Option<&VotingOption> {
        let key = canonical_key(value);
        self.options.iter().find(|o| canonical_key(&o.value) == key)
    }
}

/// Weighted-majority voting engine
pub struct VotingEngine {
    config: VotingConfig,
    sessions: Mutex<HashMap<VotingId, VotingSession>>,
    weights: RwLock<HashMap<AgentId, f64>>,
    tie_breaks: TieBreakRegistry,
    metrics: MetricsRecorder,
    event_bus: SharedEventBus,
}

impl VotingEngine {
    /// Create an engine with empty session and weight tables
    pub fn new(config: VotingConfig, event_bus: SharedEventBus) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            weights: RwLock::new(HashMap::new()),
            tie_breaks: TieBreakRegistry::new(),
            metrics: MetricsRecorder::new(),
            event_bus,
        }
    }

    /// Create a shared reference to this engine
    pub fn shared(self) -> SharedVotingEngine {
        Arc::new(self)
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Open a session with the configured timeout
    pub async fn start_voting(
        &self,
        topic: VotingTopic,
        eligible_voters: impl IntoIterator<Item = AgentId>,
    ) -> VotingResult<VotingId> {
        self.start_voting_with_timeout(topic, eligible_voters, self.config.voting_timeout())
            .await
    }

    /// Open a session with an explicit timeout
    pub async fn start_voting_with_timeout(
        &self,
        topic: VotingTopic,
        eligible_voters: impl IntoIterator<Item = AgentId>,
        timeout: Duration,
    ) -> VotingResult<VotingId> {
        let eligible: HashSet<AgentId> = eligible_voters.into_iter().collect();
        if eligible.is_empty() {
            return Err(VotingError::NoEligibleVoters);
        }
        if topic.options.is_empty() {
            return Err(VotingError::EmptyTopic);
        }

        let session = VotingSession::open(topic, eligible, timeout);
        let voting_id = session.id.clone();
        let event = HiveEvent::VotingStarted {
            voting_id: voting_id.clone(),
            question: session.topic.question.clone(),
            option_ids: session.topic.options.iter().map(|o| o.id.clone()).collect(),
            eligible_voters: session.eligible_voters.len(),
            deadline: session.deadline,
            timestamp: Utc::now(),
        };

        info!(
            voting_id = %voting_id,
            question = %session.topic.question,
            options = session.topic.options.len(),
            eligible = session.eligible_voters.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Voting started"
        );

        {
            let mut sessions = self.sessions.lock().await;
            self.prune_stale(&mut sessions);
            sessions.insert(voting_id.clone(), session);
        }
        self.metrics.session_opened();
        self.event_bus.publish(event);

        Ok(voting_id)
    }

    /// Record a vote, replacing any earlier vote from the same agent
    pub async fn cast_vote(&self, voting_id: &str, ballot: Ballot) -> VotingResult<Vote> {
        let is_coordinator = ballot.agent_id == self.config.coordinator_id;
        if ballot.weight_override.is_some() && !is_coordinator {
            warn!(voting_id, agent_id = %ballot.agent_id, "Weight override refused");
            return Err(VotingError::OverrideNotPermitted(ballot.agent_id));
        }

        let weight = match ballot.weight_override {
            Some(w) => clamp_weight(w),
            None if self.config.weighted_voting => self.agent_weight(&ballot.agent_id).await,
            None => DEFAULT_WEIGHT,
        };

        let vote = Vote {
            agent_id: ballot.agent_id,
            option_id: ballot.option_id,
            weight,
            confidence: ballot.confidence,
            reasoning: ballot.reasoning,
            timestamp: Utc::now(),
        };

        let replaced = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(voting_id)
                .ok_or_else(|| VotingError::invalid(voting_id, "unknown session"))?;

            if session.status != SessionStatus::Open {
                return Err(VotingError::invalid(voting_id, "session is not open"));
            }
            if !session.accepts_votes(Instant::now()) {
                return Err(VotingError::invalid(voting_id, "deadline passed"));
            }
            if !is_coordinator && !session.eligible_voters.contains(&vote.agent_id) {
                return Err(VotingError::IneligibleVoter {
                    voting_id: voting_id.to_string(),
                    agent_id: vote.agent_id,
                });
            }
            if session.topic.option(&vote.option_id).is_none() {
                return Err(VotingError::UnknownOption {
                    voting_id: voting_id.to_string(),
                    option_id: vote.option_id,
                });
            }

            session
                .votes
                .insert(vote.agent_id.clone(), vote.clone())
                .is_some()
        };

        debug!(
            voting_id,
            agent_id = %vote.agent_id,
            option_id = %vote.option_id,
            weight = vote.weight,
            replaced,
            "Vote cast"
        );

        self.event_bus.publish(HiveEvent::VoteCast {
            voting_id: voting_id.to_string(),
            agent_id: vote.agent_id.clone(),
            option_id: vote.option_id.clone(),
            weight: vote.weight,
            replaced,
            timestamp: vote.timestamp,
        });

        Ok(vote)
    }

    /// Snapshot the current tally without touching session state
    pub async fn get_voting_status(&self, voting_id: &str) -> VotingResult<VotingStatus> {
        let sessions = self.sessions.lock().await;
        let session = sessions
            .get(voting_id)
            .ok_or_else(|| VotingError::invalid(voting_id, "unknown session"))?;

        let votes = session.sorted_votes();
        let tally = Tally::count(&session.topic, &votes);

        Ok(VotingStatus {
            voting_id: session.id.clone(),
            status: session.status,
            question: session.topic.question.clone(),
            options: session.topic.options.clone(),
            eligible_voters: session.eligible_voters.len(),
            votes_cast: votes.len(),
            stats: tally.stats(),
            leading: tally.leaders(),
            deadline: session.deadline,
        })
    }

    /// Close a session and resolve its result
    ///
    /// Only the first call succeeds; later calls fail with
    /// `SessionAlreadyClosed` and leave the stored result untouched. A queen
    /// tie-break may suspend until the session deadline.
    pub async fn close_voting(&self, voting_id: &str) -> VotingResult<MajorityResult> {
        let (topic, votes, participation, deadline_at, opened_at) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions
                .get_mut(voting_id)
                .ok_or_else(|| VotingError::invalid(voting_id, "unknown session"))?;

            if session.status != SessionStatus::Open {
                return Err(VotingError::SessionAlreadyClosed(voting_id.to_string()));
            }
            session.status = SessionStatus::Closing;

            let participation =
                Participation::new(session.eligible_voters.len(), session.eligible_votes());
            (
                session.topic.clone(),
                session.sorted_votes(),
                participation,
                session.deadline_at,
                session.opened_at,
            )
        };

        let tally = Tally::count(&topic, &votes);
        let deferred =
            participation.participation_rate < self.config.quorum_required || votes.is_empty();

        let mut tied_options = Vec::new();
        let mut tie_resolution = None;
        let winner_id = if deferred {
            info!(
                voting_id,
                participation = participation.participation_rate,
                quorum = self.config.quorum_required,
                "Quorum not met, decision deferred"
            );
            None
        } else {
            let leaders = tally.leaders();
            if leaders.len() > 1 {
                tied_options = leaders.clone();
                let (pick, resolution) = self.break_tie(voting_id, leaders, deadline_at).await;
                tie_resolution = Some(resolution);
                pick
            } else {
                leaders.into_iter().next()
            }
        };

        let winner = winner_id.and_then(|id| topic.option(&id).cloned());
        let stats = tally.stats();
        let threshold_met = winner
            .as_ref()
            .and_then(|w| stats.percentage_per_option.get(&w.id))
            .map(|share| *share >= self.config.voting_threshold)
            .unwrap_or(false);

        let result = MajorityResult {
            voting_id: voting_id.to_string(),
            winner,
            voting_stats: stats,
            participation,
            tie: !tied_options.is_empty(),
            tied_options,
            tie_resolution,
            deferred,
            threshold_met,
            votes,
            closed_at: Utc::now(),
        };

        {
            let mut sessions = self.sessions.lock().await;
            if let Some(session) = sessions.get_mut(voting_id) {
                session.status = SessionStatus::Closed;
                session.closed_at = Some(Instant::now());
                session.result = Some(result.clone());
            }
        }

        self.metrics.session_closed(
            participation.participation_rate,
            opened_at.elapsed(),
            result.deferred,
            result.tie,
        );

        info!(
            voting_id,
            winner = ?result.winner.as_ref().map(|w| w.id.as_str()),
            total_votes = result.voting_stats.total_votes,
            participation = participation.participation_rate,
            tie = result.tie,
            deferred = result.deferred,
            "Voting closed"
        );

        let now = Utc::now();
        if let (Some(resolution), Some(winner)) = (result.tie_resolution, result.winner.as_ref()) {
            self.event_bus.publish(HiveEvent::TieBreakResolved {
                voting_id: voting_id.to_string(),
                option_id: winner.id.clone(),
                resolution,
                timestamp: now,
            });
        }
        self.event_bus.publish(HiveEvent::VotingClosed {
            voting_id: voting_id.to_string(),
            winner: result.winner.as_ref().map(|w| w.id.clone()),
            vote_summary: VoteSummary::from_result(&result),
            timestamp: now,
        });
        if result.deferred {
            self.event_bus.publish(HiveEvent::DecisionDeferred {
                voting_id: voting_id.to_string(),
                participation_rate: participation.participation_rate,
                quorum_required: self.config.quorum_required,
                timestamp: now,
            });
        }

        Ok(result)
    }

    /// Close every open session whose deadline has passed
    ///
    /// Closed sessions past their retention window are pruned on the way.
    pub async fn close_expired_sessions(&self) -> Vec<MajorityResult> {
        let now = Instant::now();
        let expired: Vec<VotingId> = {
            let mut sessions = self.sessions.lock().await;
            self.prune_stale(&mut sessions);
            sessions
                .values()
                .filter(|s| s.status == SessionStatus::Open && s.is_expired(now))
                .map(|s| s.id.clone())
                .collect()
        };

        let mut results = Vec::with_capacity(expired.len());
        for voting_id in expired {
            match self.close_voting(&voting_id).await {
                Ok(result) => results.push(result),
                // Someone else closed it in between
                Err(e) => debug!(voting_id = %voting_id, error = %e, "Skipped expired session"),
            }
        }
        results
    }

    /// Drop closed sessions older than the retention window
    pub async fn prune_closed_sessions(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.prune_stale(&mut sessions)
    }

    fn prune_stale(&self, sessions: &mut HashMap<VotingId, VotingSession>) -> usize {
        let now = Instant::now();
        let retention = self.config.closed_session_retention();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_stale(now, retention));
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, remaining = sessions.len(), "Pruned closed sessions");
        }
        pruned
    }

    /// Number of sessions currently held, open or closed
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Stored result of a closed session, while it is retained
    pub async fn result(&self, voting_id: &str) -> Option<MajorityResult> {
        self.sessions
            .lock()
            .await
            .get(voting_id)
            .and_then(|s| s.result.clone())
    }

    // =========================================================================
    // Tie Resolution
    // =========================================================================

    /// Coordinator's pick for a session waiting on a queen tie-break
    pub fn resolve_tie(&self, voting_id: &str, option_id: &str) -> VotingResult<()> {
        match self.tie_breaks.resolve(voting_id, option_id) {
            Ok(()) => {
                info!(voting_id, option_id, "Tie resolved by coordinator");
                Ok(())
            }
            Err(ResolveRefusal::NotPending) => {
                Err(VotingError::NoTieBreakPending(voting_id.to_string()))
            }
            Err(ResolveRefusal::NotTied) => Err(VotingError::UnknownOption {
                voting_id: voting_id.to_string(),
                option_id: option_id.to_string(),
            }),
        }
    }

    async fn break_tie(
        &self,
        voting_id: &str,
        tied: Vec<OptionId>,
        deadline_at: Instant,
    ) -> (Option<OptionId>, TieResolution) {
        match self.config.tie_breaker {
            TieBreaker::Random => {
                let pick = pick_random(&tied);
                debug!(voting_id, ?tied, ?pick, "Tie broken at random");
                (pick, TieResolution::Random)
            }
            TieBreaker::Queen => {
                let receiver = self.tie_breaks.register(voting_id, tied.clone());
                warn!(voting_id, ?tied, "Tie-break needed from coordinator");
                self.event_bus.publish(HiveEvent::TieBreakNeeded {
                    voting_id: voting_id.to_string(),
                    tied_options: tied.clone(),
                    timestamp: Utc::now(),
                });

                let wait = deadline_at.saturating_duration_since(Instant::now());
                let answer = tokio::time::timeout(wait, receiver).await;
                self.tie_breaks.forget(voting_id);

                match answer {
                    Ok(Ok(option_id)) => (Some(option_id), TieResolution::Coordinator),
                    _ => {
                        let pick = match self.config.queen_tie_fallback {
                            TieFallback::FirstTied => tied.first().cloned(),
                            TieFallback::Random => pick_random(&tied),
                        };
                        warn!(
                            voting_id,
                            ?pick,
                            "No coordinator resolution before deadline, using fallback"
                        );
                        (pick, TieResolution::Fallback)
                    }
                }
            }
        }
    }

    // =========================================================================
    // Weights & Metrics
    // =========================================================================

    /// Set an agent's vote weight, clamped to `[0, 1.5]`
    pub async fn set_agent_weight(&self, agent_id: &str, weight: f64) -> f64 {
        let clamped = clamp_weight(weight);
        self.weights
            .write()
            .await
            .insert(agent_id.to_string(), clamped);
        debug!(agent_id, requested = weight, weight = clamped, "Agent weight set");
        clamped
    }

    /// Current vote weight of an agent
    pub async fn agent_weight(&self, agent_id: &str) -> f64 {
        self.weights
            .read()
            .await
            .get(agent_id)
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Snapshot of the weight table
    pub async fn weights(&self) -> HashMap<AgentId, f64> {
        self.weights.read().await.clone()
    }

    pub fn get_metrics(&self) -> VotingMetrics {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::state::TopicKind;
    use serde_json::{json, Value};

    fn topic(ids: &[&str]) -> VotingTopic {
        VotingTopic::new(
            TopicKind::Decision,
            "Which way?",
            ids.iter()
                .map(|id| VotingOption::new(*id, json!(id), *id))
                .collect(),
            Value::Null,
        )
    }

    fn voters(n: usize) -> Vec<AgentId> {
        (1..=n).map(|i| format!("agent-{}", i)).collect()
    }

    fn engine(config: VotingConfig) -> VotingEngine {
        VotingEngine::new(config, EventBus::new().shared())
    }

    #[tokio::test]
    async fn test_start_rejects_empty_electorate() {
        let engine = engine(VotingConfig::default());
        let err = engine
            .start_voting(topic(&["a"]), Vec::<AgentId>::new())
            .await
            .unwrap_err();
        assert_eq!(err, VotingError::NoEligibleVoters);

        let err = engine.start_voting(topic(&[]), voters(2)).await.unwrap_err();
        assert_eq!(err, VotingError::EmptyTopic);
    }

    #[tokio::test]
    async fn test_cast_vote_validation() {
        let engine = engine(VotingConfig::default());
        let id = engine.start_voting(topic(&["a", "b"]), voters(2)).await.unwrap();

        let err = engine
            .cast_vote("missing", Ballot::new("agent-1", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::InvalidSession { .. }));

        let err = engine
            .cast_vote(&id, Ballot::new("stranger", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::IneligibleVoter { .. }));

        let err = engine
            .cast_vote(&id, Ballot::new("agent-1", "z"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::UnknownOption { .. }));

        let err = engine
            .cast_vote(&id, Ballot::new("agent-1", "a").with_weight_override(1.5))
            .await
            .unwrap_err();
        assert_eq!(err, VotingError::OverrideNotPermitted("agent-1".to_string()));
    }

    #[tokio::test]
    async fn test_later_vote_overwrites() {
        let engine = engine(VotingConfig::default());
        let id = engine.start_voting(topic(&["a", "b"]), voters(2)).await.unwrap();

        engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();
        engine.cast_vote(&id, Ballot::new("agent-1", "b")).await.unwrap();
        engine.cast_vote(&id, Ballot::new("agent-2", "b")).await.unwrap();

        let status = engine.get_voting_status(&id).await.unwrap();
        assert_eq!(status.votes_cast, 2);
        assert_eq!(status.leading, vec!["b".to_string()]);
        assert_eq!(status.status, SessionStatus::Open);

        let result = engine.close_voting(&id).await.unwrap();
        assert_eq!(result.voting_stats.total_votes, 2);
        assert_eq!(result.winner.unwrap().id, "b");
    }

    #[tokio::test]
    async fn test_weights_resolved_at_cast_time() {
        let engine = engine(VotingConfig::default());
        engine.set_agent_weight("agent-1", 0.4).await;
        let id = engine.start_voting(topic(&["a", "b"]), voters(3)).await.unwrap();

        let vote = engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();
        assert_eq!(vote.weight, 0.4);
        let vote = engine.cast_vote(&id, Ballot::new("agent-2", "b")).await.unwrap();
        assert_eq!(vote.weight, DEFAULT_WEIGHT);
    }

    #[tokio::test]
    async fn test_unweighted_mode_ignores_table_but_not_override() {
        let config = VotingConfig {
            weighted_voting: false,
            ..Default::default()
        };
        let engine = engine(config);
        engine.set_agent_weight("agent-1", 0.2).await;
        let id = engine.start_voting(topic(&["a"]), voters(1)).await.unwrap();

        let vote = engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();
        assert_eq!(vote.weight, 1.0);

        let vote = engine
            .cast_vote(&id, Ballot::new("queen", "a").with_weight_override(9.0))
            .await
            .unwrap();
        assert_eq!(vote.weight, 1.5);
    }

    #[tokio::test]
    async fn test_coordinator_vote_does_not_count_as_participation() {
        let engine = engine(VotingConfig::default());
        let id = engine.start_voting(topic(&["a"]), voters(4)).await.unwrap();

        engine.cast_vote(&id, Ballot::new("queen", "a")).await.unwrap();
        engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();

        let result = engine.close_voting(&id).await.unwrap();
        assert_eq!(result.participation.actual_voters, 1);
        assert!(result.deferred);
        assert!(result.winner.is_none());
    }

    #[tokio::test]
    async fn test_second_close_fails_and_keeps_result() {
        let engine = engine(VotingConfig::default());
        let id = engine.start_voting(topic(&["a"]), voters(1)).await.unwrap();
        engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();

        let first = engine.close_voting(&id).await.unwrap();
        let err = engine.close_voting(&id).await.unwrap_err();
        assert_eq!(err, VotingError::SessionAlreadyClosed(id.clone()));
        assert_eq!(engine.result(&id).await.unwrap(), first);

        let err = engine
            .cast_vote(&id, Ballot::new("agent-1", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::InvalidSession { .. }));
    }

    #[tokio::test]
    async fn test_no_votes_is_deferred_even_without_quorum() {
        let config = VotingConfig {
            quorum_required: 0.0,
            ..Default::default()
        };
        let engine = engine(config);
        let id = engine.start_voting(topic(&["a"]), voters(3)).await.unwrap();

        let result = engine.close_voting(&id).await.unwrap();
        assert!(result.deferred);
        assert!(!result.threshold_met);
    }

    #[tokio::test]
    async fn test_threshold_flag() {
        let config = VotingConfig {
            voting_threshold: 0.7,
            ..Default::default()
        };
        let engine = engine(config);
        let id = engine
            .start_voting(topic(&["a", "b"]), voters(5))
            .await
            .unwrap();
        for (agent, option) in [
            ("agent-1", "a"),
            ("agent-2", "a"),
            ("agent-3", "a"),
            ("agent-4", "b"),
            ("agent-5", "b"),
        ] {
            engine.cast_vote(&id, Ballot::new(agent, option)).await.unwrap();
        }

        let result = engine.close_voting(&id).await.unwrap();
        assert_eq!(result.winner.unwrap().id, "a");
        assert!(!result.threshold_met);
    }

    #[tokio::test]
    async fn test_set_agent_weight_clamps() {
        let engine = engine(VotingConfig::default());
        assert_eq!(engine.set_agent_weight("a", 12.0).await, 1.5);
        assert_eq!(engine.set_agent_weight("b", -1.0).await, 0.0);
        assert_eq!(engine.agent_weight("a").await, 1.5);
        assert_eq!(engine.agent_weight("unseen").await, DEFAULT_WEIGHT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_expired_sessions() {
        let engine = engine(VotingConfig::default());
        let short = engine
            .start_voting_with_timeout(topic(&["a"]), voters(1), Duration::from_secs(1))
            .await
            .unwrap();
        let long = engine
            .start_voting_with_timeout(topic(&["a"]), voters(1), Duration::from_secs(60))
            .await
            .unwrap();
        engine.cast_vote(&short, Ballot::new("agent-1", "a")).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        let err = engine
            .cast_vote(&short, Ballot::new("agent-1", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::InvalidSession { .. }));

        let closed = engine.close_expired_sessions().await;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].voting_id, short);
        assert_eq!(closed[0].winner.as_ref().unwrap().id, "a");

        let status = engine.get_voting_status(&long).await.unwrap();
        assert_eq!(status.status, SessionStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_sessions_pruned_after_retention() {
        let config = VotingConfig {
            closed_session_retention_ms: 60_000,
            ..Default::default()
        };
        let engine = engine(config);
        let old = engine.start_voting(topic(&["a"]), voters(1)).await.unwrap();
        engine.cast_vote(&old, Ballot::new("agent-1", "a")).await.unwrap();
        engine.close_voting(&old).await.unwrap();

        let open = engine.start_voting(topic(&["a"]), voters(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(engine.prune_closed_sessions().await, 0);
        assert!(engine.result(&old).await.is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        engine.start_voting(topic(&["a"]), voters(1)).await.unwrap();

        assert!(engine.result(&old).await.is_none());
        assert_eq!(engine.session_count().await, 2);
        // Open sessions are never pruned, however old
        assert_eq!(
            engine.get_voting_status(&open).await.unwrap().status,
            SessionStatus::Open
        );
    }

    #[tokio::test]
    async fn test_resolve_tie_without_pending() {
        let engine = engine(VotingConfig::default());
        let err = engine.resolve_tie("v-1", "a").unwrap_err();
        assert_eq!(err, VotingError::NoTieBreakPending("v-1".to_string()));
    }

    #[tokio::test]
    async fn test_metrics_track_sessions() {
        let engine = engine(VotingConfig::default());
        let id = engine.start_voting(topic(&["a"]), voters(2)).await.unwrap();
        engine.cast_vote(&id, Ballot::new("agent-1", "a")).await.unwrap();
        engine.close_voting(&id).await.unwrap();

        let id = engine.start_voting(topic(&["a"]), voters(4)).await.unwrap();
        engine.close_voting(&id).await.unwrap();

        let metrics = engine.get_metrics();
        assert_eq!(metrics.sessions_opened, 2);
        assert_eq!(metrics.sessions_closed, 2);
        assert_eq!(metrics.sessions_deferred, 1);
        assert!((metrics.average_participation - 0.25).abs() < 1e-9);
    }
}
