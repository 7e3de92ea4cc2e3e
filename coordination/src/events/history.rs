//! Event history and replay functionality
//!
//! Keeps a bounded window of recently published events so operators can
//! inspect what happened to a session after the fact.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::HiveEvent;

/// Bounded in-memory event history
pub struct EventHistory {
    events: Mutex<VecDeque<HiveEvent>>,
    capacity: usize,
}

impl EventHistory {
    /// Create a history holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Record an event, evicting the oldest when full
    pub fn record(&self, event: HiveEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All recorded events, oldest first
    pub fn events(&self) -> Vec<HiveEvent> {
        self.events
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Events recorded since a point in time
    pub fn events_since(&self, since: DateTime<Utc>) -> Vec<HiveEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.timestamp() >= since)
            .collect()
    }

    /// Events for a specific voting session
    pub fn voting_events(&self, voting_id: &str) -> Vec<HiveEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.voting_id() == Some(voting_id))
            .collect()
    }

    /// Aggregate statistics over the recorded window
    pub fn stats(&self) -> EventStats {
        let mut stats = EventStats::default();
        for event in self.events() {
            stats.record_event(&event);
        }
        stats
    }

    /// Replay recorded events through a callback
    pub async fn replay<F, Fut>(&self, mut callback: F) -> EventStats
    where
        F: FnMut(HiveEvent) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let events = self.events();
        info!(total = events.len(), "Starting event replay");

        let mut stats = EventStats::default();
        for event in events {
            stats.record_event(&event);
            callback(event).await;
        }

        info!(
            total = stats.total_events,
            sessions = stats.sessions_seen,
            "Event replay complete"
        );
        stats
    }
}

/// Statistics over a set of events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStats {
    pub total_events: usize,
    pub by_type: BTreeMap<String, usize>,
    pub sessions_seen: usize,
    #[serde(skip)]
    seen_sessions: HashSet<String>,
}

impl EventStats {
    fn record_event(&mut self, event: &HiveEvent) {
        self.total_events += 1;
        *self
            .by_type
            .entry(event.event_type().to_string())
            .or_insert(0) += 1;
        if let Some(voting_id) = event.voting_id() {
            if self.seen_sessions.insert(voting_id.to_string()) {
                self.sessions_seen += 1;
            }
        }
    }

    /// Count of a given event type
    pub fn count(&self, event_type: &str) -> usize {
        self.by_type.get(event_type).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(voting_id: &str) -> HiveEvent {
        HiveEvent::VotingStarted {
            voting_id: voting_id.to_string(),
            question: "q".to_string(),
            option_ids: vec!["a".to_string()],
            eligible_voters: 3,
            deadline: Utc::now(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let history = EventHistory::new(2);
        history.record(started("v-1"));
        history.record(started("v-2"));
        history.record(started("v-3"));

        let ids: Vec<_> = history
            .events()
            .iter()
            .filter_map(|e| e.voting_id().map(String::from))
            .collect();
        assert_eq!(ids, vec!["v-2", "v-3"]);
    }

    #[test]
    fn test_stats_and_session_filter() {
        let history = EventHistory::new(16);
        history.record(started("v-1"));
        history.record(started("v-1"));
        history.record(started("v-2"));

        let stats = history.stats();
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.sessions_seen, 2);
        assert_eq!(stats.count("voting_started"), 3);
        assert_eq!(history.voting_events("v-1").len(), 2);
    }

    #[tokio::test]
    async fn test_replay_visits_every_event() {
        let history = EventHistory::new(16);
        history.record(started("v-1"));
        history.record(started("v-2"));

        let mut seen = Vec::new();
        let stats = history
            .replay(|event| {
                seen.push(event.event_type());
                async {}
            })
            .await;

        assert_eq!(stats.total_events, 2);
        assert_eq!(seen, vec!["voting_started", "voting_started"]);
    }
}
