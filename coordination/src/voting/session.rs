//! Voting sessions and the weighted tally
//!
//! A session is created `Open`, moves to `Closing` while its result is being
//! resolved (a queen tie-break may suspend), and ends `Closed` exactly once.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::state::{AgentId, MajorityResult, OptionId, Vote, VotingId, VotingStats, VotingTopic};

/// Two weighted sums closer than this are tied
pub const TIE_EPSILON: f64 = 1e-9;

/// Lifecycle status of a voting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting votes
    Open,
    /// Close requested; result being resolved
    Closing,
    /// Terminal
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One decision's ballot box
#[derive(Debug, Clone)]
pub struct VotingSession {
    pub id: VotingId,
    pub topic: VotingTopic,
    pub eligible_voters: HashSet<AgentId>,
    /// Wall-clock deadline, for reporting
    pub deadline: DateTime<Utc>,
    /// Monotonic deadline, for expiry checks
    pub deadline_at: Instant,
    pub opened_at: Instant,
    pub status: SessionStatus,
    /// When the session reached `Closed`
    pub closed_at: Option<Instant>,
    /// Live votes, one per agent
    pub votes: HashMap<AgentId, Vote>,
    pub result: Option<MajorityResult>,
}

impl VotingSession {
    /// Open a session that expires after `timeout`
    pub fn open(
        topic: VotingTopic,
        eligible_voters: HashSet<AgentId>,
        timeout: std::time::Duration,
    ) -> Self {
        let opened_at = Instant::now();
        let deadline = Utc::now()
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic,
            eligible_voters,
            deadline,
            deadline_at: opened_at + timeout,
            opened_at,
            status: SessionStatus::Open,
            closed_at: None,
            votes: HashMap::new(),
            result: None,
        }
    }

    /// Whether a closed session has outlived `retention`
    pub fn is_stale(&self, now: Instant, retention: std::time::Duration) -> bool {
        match self.closed_at {
            Some(closed_at) => now.saturating_duration_since(closed_at) >= retention,
            None => false,
        }
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline_at
    }

    /// Whether a vote may still be recorded
    pub fn accepts_votes(&self, now: Instant) -> bool {
        self.status == SessionStatus::Open && !self.is_expired(now)
    }

    /// Live votes ordered by agent id
    pub fn sorted_votes(&self) -> Vec<Vote> {
        let mut votes: Vec<Vote> = self.votes.values().cloned().collect();
        votes.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        votes
    }

    /// Number of eligible agents that have voted
    pub fn eligible_votes(&self) -> usize {
        self.votes
            .keys()
            .filter(|agent| self.eligible_voters.contains(*agent))
            .count()
    }
}

/// Weighted sums per option, in ballot order
#[derive(Debug, Clone, Default)]
pub struct Tally {
    /// `(option, summed weight, vote count)` for every option on the ballot
    pub sums: Vec<(OptionId, f64, usize)>,
    pub total_weight: f64,
    pub total_votes: usize,
}

impl Tally {
    /// Sum the weights of `votes` over the options of `topic`
    pub fn count(topic: &VotingTopic, votes: &[Vote]) -> Self {
        let mut sums: Vec<(OptionId, f64, usize)> = topic
            .options
            .iter()
            .map(|o| (o.id.clone(), 0.0, 0))
            .collect();

        let mut total_weight = 0.0;
        let mut total_votes = 0;
        for vote in votes {
            if let Some(entry) = sums.iter_mut().find(|(id, _, _)| *id == vote.option_id) {
                entry.1 += vote.weight;
                entry.2 += 1;
                total_weight += vote.weight;
                total_votes += 1;
            }
        }

        Self {
            sums,
            total_weight,
            total_votes,
        }
    }

    /// Options sharing the greatest weighted sum, in ballot order
    ///
    /// Only options that received at least one vote can lead.
    pub fn leaders(&self) -> Vec<OptionId> {
        let voted = self.sums.iter().filter(|(_, _, count)| *count > 0);
        let best = voted
            .clone()
            .map(|(_, sum, _)| *sum)
            .fold(f64::NEG_INFINITY, f64::max);
        if best == f64::NEG_INFINITY {
            return Vec::new();
        }

        voted
            .filter(|(_, sum, _)| (best - *sum).abs() < TIE_EPSILON)
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    /// Weighted sum of one option
    pub fn weight_of(&self, option_id: &str) -> f64 {
        self.sums
            .iter()
            .find(|(id, _, _)| id == option_id)
            .map(|(_, sum, _)| *sum)
            .unwrap_or(0.0)
    }

    /// Summary figures for the options that received votes
    pub fn stats(&self) -> VotingStats {
        let mut percentage_per_option = BTreeMap::new();
        let mut weight_per_option = BTreeMap::new();
        for (id, sum, count) in &self.sums {
            if *count == 0 {
                continue;
            }
            let share = if self.total_weight > 0.0 {
                sum / self.total_weight
            } else {
                0.0
            };
            percentage_per_option.insert(id.clone(), share);
            weight_per_option.insert(id.clone(), *sum);
        }

        VotingStats {
            total_votes: self.total_votes,
            percentage_per_option,
            weight_per_option,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{TopicKind, VotingOption};
    use serde_json::{json, Value};

    fn topic(ids: &[&str]) -> VotingTopic {
        VotingTopic::new(
            TopicKind::Decision,
            "pick",
            ids.iter()
                .map(|id| VotingOption::new(*id, json!(id), *id))
                .collect(),
            Value::Null,
        )
    }

    fn vote(agent: &str, option: &str, weight: f64) -> Vote {
        Vote {
            agent_id: agent.to_string(),
            option_id: option.to_string(),
            weight,
            confidence: 1.0,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_strict_maximum_wins() {
        let topic = topic(&["a", "b"]);
        let votes = vec![
            vote("1", "a", 1.0),
            vote("2", "a", 1.0),
            vote("3", "a", 1.0),
            vote("4", "b", 1.0),
            vote("5", "b", 1.0),
        ];

        let tally = Tally::count(&topic, &votes);
        assert_eq!(tally.leaders(), vec!["a".to_string()]);

        let stats = tally.stats();
        assert_eq!(stats.total_votes, 5);
        assert!((stats.percentage_per_option["a"] - 0.6).abs() < 1e-12);
        assert!((stats.percentage_per_option["b"] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_tie_in_ballot_order() {
        let topic = topic(&["b", "a"]);
        let votes = vec![
            vote("1", "a", 1.0),
            vote("2", "a", 1.0),
            vote("3", "b", 2.0),
        ];

        let tally = Tally::count(&topic, &votes);
        assert_eq!(tally.leaders(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_float_noise_is_a_tie() {
        let topic = topic(&["a", "b"]);
        let votes = vec![
            vote("1", "a", 0.1),
            vote("2", "a", 0.2),
            vote("3", "b", 0.3),
        ];

        let tally = Tally::count(&topic, &votes);
        assert_eq!(tally.leaders().len(), 2);
    }

    #[test]
    fn test_unvoted_options_never_lead() {
        let topic = topic(&["a", "b", "c"]);
        let votes = vec![vote("1", "b", 0.0)];

        let tally = Tally::count(&topic, &votes);
        assert_eq!(tally.leaders(), vec!["b".to_string()]);
        assert_eq!(tally.stats().percentage_per_option["b"], 0.0);

        let empty = Tally::count(&topic, &[]);
        assert!(empty.leaders().is_empty());
        assert!(empty.stats().percentage_per_option.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expiry() {
        let session = VotingSession::open(
            topic(&["a"]),
            ["x".to_string()].into_iter().collect(),
            std::time::Duration::from_secs(5),
        );
        assert!(session.accepts_votes(Instant::now()));

        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert!(session.is_expired(Instant::now()));
        assert!(!session.accepts_votes(Instant::now()));
    }
}
