//! In-memory decision store with optional JSONL journal
//!
//! Reference `DecisionMemory`: keeps decisions and their observed outcomes,
//! derives per-agent success rates, and looks up structurally similar past
//! decisions. When opened on a path, every record is appended to a JSON-lines
//! journal and replayed on the next open.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ports::{AgentPerformance, DecisionMemory, MemoryError, MemoryHealth, SimilarDecision};
use crate::state::{canonical_key, AgentId, DecisionId, DecisionKind, QueenDecision};

/// Result type for store operations
pub type StoreResult<T> = Result<T, MemoryError>;

/// Default number of decisions the store is sized for
pub const DEFAULT_CAPACITY: usize = 1000;

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum JournalRecord {
    Decision { decision: Box<QueenDecision> },
    Outcome { decision_id: DecisionId, success: bool },
}

#[derive(Default)]
struct StoreState {
    decisions: Vec<QueenDecision>,
    outcomes: HashMap<DecisionId, bool>,
}

impl StoreState {
    fn apply(&mut self, record: JournalRecord) {
        match record {
            JournalRecord::Decision { decision } => self.decisions.push(*decision),
            JournalRecord::Outcome {
                decision_id,
                success,
            } => {
                self.outcomes.insert(decision_id, success);
            }
        }
    }
}

/// Reference decision memory
pub struct InMemoryDecisionStore {
    state: RwLock<StoreState>,
    journal: Option<PathBuf>,
    capacity: usize,
}

impl InMemoryDecisionStore {
    /// Create an empty, purely in-memory store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            journal: None,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set the capacity used for usage reporting
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Open a store backed by a JSONL journal, replaying existing records
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = StoreState::default();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            for (line_no, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalRecord>(line) {
                    Ok(record) => state.apply(record),
                    Err(e) => {
                        warn!(path = %path.display(), line = line_no + 1, error = %e, "Skipping corrupt journal line")
                    }
                }
            }
        } else if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!(
            path = %path.display(),
            decisions = state.decisions.len(),
            outcomes = state.outcomes.len(),
            "Decision store opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            journal: Some(path),
            capacity: DEFAULT_CAPACITY,
        })
    }

    /// Record whether a stored decision worked out
    pub async fn record_outcome(&self, decision_id: &str, success: bool) -> StoreResult<()> {
        {
            let state = self.state.read().await;
            if !state.decisions.iter().any(|d| d.id == decision_id) {
                return Err(MemoryError::NotFound(decision_id.to_string()));
            }
        }

        let record = JournalRecord::Outcome {
            decision_id: decision_id.to_string(),
            success,
        };
        self.append(&record).await?;
        self.state.write().await.apply(record);

        debug!(decision_id, success, "Outcome recorded");
        Ok(())
    }

    /// Observed outcome of a decision, if known
    pub async fn outcome(&self, decision_id: &str) -> Option<bool> {
        self.state.read().await.outcomes.get(decision_id).copied()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.decisions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn append(&self, record: &JournalRecord) -> StoreResult<()> {
        let Some(path) = &self.journal else {
            return Ok(());
        };

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

impl Default for InMemoryDecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-agent success rates over decisions with a known outcome
///
/// An agent called a decision right when it backed the winner of a decision
/// that succeeded, or opposed the winner of one that failed. Agents that only
/// voted on decisions without a known outcome get `None`.
pub fn success_rates(
    history: &[QueenDecision],
    outcomes: &HashMap<DecisionId, bool>,
) -> Vec<AgentPerformance> {
    // agent -> (right, judged)
    let mut tallies: BTreeMap<AgentId, (usize, usize)> = BTreeMap::new();

    for decision in history {
        let winner = decision.majority.winner.as_ref().map(|w| w.id.as_str());
        let outcome = outcomes.get(&decision.id).copied();

        for vote in &decision.majority.votes {
            let entry = tallies.entry(vote.agent_id.clone()).or_insert((0, 0));
            if let Some(success) = outcome {
                entry.1 += 1;
                let backed_winner = Some(vote.option_id.as_str()) == winner;
                if backed_winner == success {
                    entry.0 += 1;
                }
            }
        }
    }

    tallies
        .into_iter()
        .map(|(agent_id, (right, judged))| AgentPerformance {
            agent_id,
            success_rate: (judged > 0).then(|| right as f64 / judged as f64),
            decisions: judged,
        })
        .collect()
}

#[async_trait]
impl DecisionMemory for InMemoryDecisionStore {
    async fn store_decision(&self, decision: &QueenDecision) -> Result<(), MemoryError> {
        let record = JournalRecord::Decision {
            decision: Box::new(decision.clone()),
        };
        self.append(&record).await?;
        self.state.write().await.apply(record);

        debug!(decision_id = %decision.id, kind = %decision.kind, "Decision stored");
        Ok(())
    }

    async fn get_decision_history(&self) -> Result<Vec<QueenDecision>, MemoryError> {
        Ok(self.state.read().await.decisions.clone())
    }

    async fn analyze_decision_patterns(
        &self,
        history: &[QueenDecision],
    ) -> Result<Vec<AgentPerformance>, MemoryError> {
        let state = self.state.read().await;
        Ok(success_rates(history, &state.outcomes))
    }

    async fn find_similar_decisions(
        &self,
        kind: DecisionKind,
        value: &Value,
    ) -> Result<Vec<SimilarDecision>, MemoryError> {
        let key = canonical_key(value);
        let state = self.state.read().await;

        Ok(state
            .decisions
            .iter()
            .filter(|d| d.kind == kind)
            .filter(|d| d.winning_value().map(canonical_key).as_deref() == Some(key.as_str()))
            .map(|d| SimilarDecision {
                decision_id: d.id.clone(),
                decision: d.decision.clone(),
                successful: state.outcomes.get(&d.id).copied().unwrap_or(false),
                timestamp: d.timestamp,
            })
            .collect())
    }

    async fn health(&self) -> Result<MemoryHealth, MemoryError> {
        let stored = self.state.read().await.decisions.len();
        let usage = (stored as f64 / self.capacity as f64).min(1.0);
        let journal_ok = self
            .journal
            .as_ref()
            .map(|p| p.parent().map(|d| d.as_os_str().is_empty() || d.exists()).unwrap_or(true))
            .unwrap_or(true);

        Ok(MemoryHealth {
            healthy: journal_ok && usage < 1.0,
            stored_decisions: stored,
            usage,
            detail: match &self.journal {
                Some(p) => format!("journal at {}", p.display()),
                None => "in-memory only".to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        ImplementationPlan, MajorityResult, Participation, Timeline, Vote, VotingOption,
        VotingStats,
    };
    use chrono::Utc;
    use serde_json::json;

    fn vote(agent: &str, option: &str) -> Vote {
        Vote {
            agent_id: agent.to_string(),
            option_id: option.to_string(),
            weight: 1.0,
            confidence: 0.9,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    fn decision(id: &str, kind: DecisionKind, winner: Value, votes: Vec<Vote>) -> QueenDecision {
        QueenDecision {
            id: id.to_string(),
            kind,
            topic: "topic".to_string(),
            decision: format!("Proceed with {}", winner),
            rationale: String::new(),
            majority: MajorityResult {
                voting_id: format!("v-{}", id),
                winner: Some(VotingOption::new("win", winner, "winner")),
                voting_stats: VotingStats::default(),
                participation: Participation::new(votes.len(), votes.len()),
                tie: false,
                tied_options: vec![],
                tie_resolution: None,
                deferred: false,
                threshold_met: true,
                votes,
                closed_at: Utc::now(),
            },
            implementation: ImplementationPlan {
                steps: vec![],
                assignments: vec![],
                timeline: Timeline::default(),
                success_criteria: vec![],
            },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_success_rates() {
        let store = InMemoryDecisionStore::new();
        let d1 = decision(
            "d1",
            DecisionKind::Strategic,
            json!("a"),
            vec![vote("x", "win"), vote("y", "lose")],
        );
        let d2 = decision(
            "d2",
            DecisionKind::Strategic,
            json!("b"),
            vec![vote("x", "win"), vote("y", "lose")],
        );
        let d3 = decision(
            "d3",
            DecisionKind::Strategic,
            json!("c"),
            vec![vote("z", "win")],
        );
        for d in [&d1, &d2, &d3] {
            store.store_decision(d).await.unwrap();
        }
        store.record_outcome("d1", true).await.unwrap();
        store.record_outcome("d2", false).await.unwrap();

        let history = store.get_decision_history().await.unwrap();
        let rates = store.analyze_decision_patterns(&history).await.unwrap();

        let rate = |agent: &str| {
            rates
                .iter()
                .find(|r| r.agent_id == agent)
                .and_then(|r| r.success_rate)
        };
        // x backed a success and a failure; y opposed both
        assert_eq!(rate("x"), Some(0.5));
        assert_eq!(rate("y"), Some(0.5));
        assert_eq!(rate("z"), None);
    }

    #[tokio::test]
    async fn test_record_outcome_unknown_decision() {
        let store = InMemoryDecisionStore::new();
        let err = store.record_outcome("nope", true).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_find_similar_ignores_key_order() {
        let store = InMemoryDecisionStore::new();
        store
            .store_decision(&decision(
                "d1",
                DecisionKind::Strategic,
                json!({"action": "scale", "replicas": 3}),
                vec![],
            ))
            .await
            .unwrap();
        store
            .store_decision(&decision(
                "d2",
                DecisionKind::Emergency,
                json!({"action": "scale", "replicas": 3}),
                vec![],
            ))
            .await
            .unwrap();
        store.record_outcome("d1", true).await.unwrap();

        let similar = store
            .find_similar_decisions(
                DecisionKind::Strategic,
                &json!({"replicas": 3, "action": "scale"}),
            )
            .await
            .unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].decision_id, "d1");
        assert!(similar[0].successful);
    }

    #[tokio::test]
    async fn test_journal_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");

        {
            let store = InMemoryDecisionStore::open(&path).unwrap();
            store
                .store_decision(&decision(
                    "d1",
                    DecisionKind::Strategic,
                    json!("a"),
                    vec![vote("x", "win")],
                ))
                .await
                .unwrap();
            store.record_outcome("d1", true).await.unwrap();
        }

        let reopened = InMemoryDecisionStore::open(&path).unwrap();
        assert_eq!(reopened.len().await, 1);
        assert_eq!(reopened.outcome("d1").await, Some(true));
        assert!(reopened.health().await.unwrap().healthy);
    }

    #[tokio::test]
    async fn test_health_usage() {
        let store = InMemoryDecisionStore::new().with_capacity(2);
        store
            .store_decision(&decision("d1", DecisionKind::Strategic, json!(1), vec![]))
            .await
            .unwrap();

        let health = store.health().await.unwrap();
        assert_eq!(health.stored_decisions, 1);
        assert!((health.usage - 0.5).abs() < 1e-9);
        assert!(health.healthy);
    }
}
