//! Pattern learner - recalibrates vote weights from decision history

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ports::{DecisionMemory, MemoryError};
use crate::state::AgentId;
use crate::voting::VotingEngine;

/// Highest weight the learner assigns
pub const LEARNED_WEIGHT_CAP: f64 = 1.0;

/// What one learning pass changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningSummary {
    pub decisions_analyzed: usize,
    /// Weights written to the engine
    pub weights_updated: BTreeMap<AgentId, f64>,
    /// Agents without a known, positive success rate
    pub skipped: Vec<AgentId>,
}

/// Pull history, compute success rates, and update engine weights
///
/// Only agents with a known rate above zero are touched; their weight becomes
/// the rate capped at 1.0.
pub async fn analyze_historical_patterns(
    memory: &dyn DecisionMemory,
    engine: &VotingEngine,
) -> Result<LearningSummary, MemoryError> {
    let history = memory.get_decision_history().await?;
    let performances = memory.analyze_decision_patterns(&history).await?;

    let mut summary = LearningSummary {
        decisions_analyzed: history.len(),
        ..Default::default()
    };

    for performance in performances {
        match performance.success_rate {
            Some(rate) if rate > 0.0 => {
                let weight = engine
                    .set_agent_weight(&performance.agent_id, rate.min(LEARNED_WEIGHT_CAP))
                    .await;
                summary.weights_updated.insert(performance.agent_id, weight);
            }
            _ => {
                debug!(agent_id = %performance.agent_id, "No usable success rate");
                summary.skipped.push(performance.agent_id);
            }
        }
    }

    info!(
        decisions = summary.decisions_analyzed,
        updated = summary.weights_updated.len(),
        skipped = summary.skipped.len(),
        "Historical patterns analyzed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VotingConfig;
    use crate::events::EventBus;
    use crate::ports::{AgentPerformance, MemoryHealth, SimilarDecision};
    use crate::state::{DecisionKind, QueenDecision};
    use async_trait::async_trait;
    use serde_json::Value;

    struct FixedRates(Vec<AgentPerformance>);

    #[async_trait]
    impl DecisionMemory for FixedRates {
        async fn store_decision(&self, _decision: &QueenDecision) -> Result<(), MemoryError> {
            Ok(())
        }

        async fn get_decision_history(&self) -> Result<Vec<QueenDecision>, MemoryError> {
            Ok(vec![])
        }

        async fn analyze_decision_patterns(
            &self,
            _history: &[QueenDecision],
        ) -> Result<Vec<AgentPerformance>, MemoryError> {
            Ok(self.0.clone())
        }

        async fn find_similar_decisions(
            &self,
            _kind: DecisionKind,
            _value: &Value,
        ) -> Result<Vec<SimilarDecision>, MemoryError> {
            Ok(vec![])
        }

        async fn health(&self) -> Result<MemoryHealth, MemoryError> {
            Err(MemoryError::Storage("unused".to_string()))
        }
    }

    fn perf(agent: &str, rate: Option<f64>) -> AgentPerformance {
        AgentPerformance {
            agent_id: agent.to_string(),
            success_rate: rate,
            decisions: 3,
        }
    }

    #[tokio::test]
    async fn test_updates_only_known_positive_rates() {
        let engine = VotingEngine::new(VotingConfig::default(), EventBus::new().shared());
        engine.set_agent_weight("zero", 0.7).await;

        let memory = FixedRates(vec![
            perf("good", Some(0.8)),
            perf("zero", Some(0.0)),
            perf("unknown", None),
        ]);

        let summary = analyze_historical_patterns(&memory, &engine).await.unwrap();

        assert_eq!(summary.weights_updated.get("good"), Some(&0.8));
        assert_eq!(summary.skipped, vec!["zero", "unknown"]);
        assert_eq!(engine.agent_weight("good").await, 0.8);
        assert_eq!(engine.agent_weight("zero").await, 0.7);
    }

    #[tokio::test]
    async fn test_rates_above_one_are_capped() {
        let engine = VotingEngine::new(VotingConfig::default(), EventBus::new().shared());
        let memory = FixedRates(vec![perf("lucky", Some(1.4))]);

        analyze_historical_patterns(&memory, &engine).await.unwrap();
        assert_eq!(engine.agent_weight("lucky").await, LEARNED_WEIGHT_CAP);
    }
}
