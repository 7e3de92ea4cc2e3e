//! Event bus for hive coordination
//!
//! Provides pub/sub messaging using Tokio broadcast channels. Every receiver
//! observes events in publish order. An optional bounded history keeps recent
//! events for replay.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::history::EventHistory;
use super::types::HiveEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Event bus with broadcast channels and optional history
pub struct EventBus {
    /// Broadcast sender for publishing events
    sender: broadcast::Sender<HiveEvent>,

    /// Optional bounded history for replay
    history: Option<Arc<EventHistory>>,
}

impl EventBus {
    /// Create a new event bus without history
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: None,
        }
    }

    /// Create an event bus that records the last `capacity` events
    pub fn with_history(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Some(Arc::new(EventHistory::new(capacity))),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Recorded history, if enabled
    pub fn history(&self) -> Option<Arc<EventHistory>> {
        self.history.clone()
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: HiveEvent) -> usize {
        let event_type = event.event_type();

        if let Some(history) = &self.history {
            history.record(event.clone());
        }

        // Broadcast to subscribers (no receivers is fine)
        match self.sender.send(event) {
            Ok(count) => {
                debug!(event_type, receivers = count, "Event published");
                count
            }
            Err(_) => {
                debug!(event_type, "Event published (no receivers)");
                0
            }
        }
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<HiveEvent> {
        self.sender.subscribe()
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if the bus has any subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by voting session ID
    pub voting_id: Option<String>,
    /// Filter by decision ID
    pub decision_id: Option<String>,
    /// Filter by event types
    pub event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by voting session ID
    pub fn voting(mut self, voting_id: &str) -> Self {
        self.voting_id = Some(voting_id.to_string());
        self
    }

    /// Filter by decision ID
    pub fn decision(mut self, decision_id: &str) -> Self {
        self.decision_id = Some(decision_id.to_string());
        self
    }

    /// Filter by event types
    pub fn types(mut self, event_types: Vec<&str>) -> Self {
        self.event_types = Some(event_types.into_iter().map(String::from).collect());
        self
    }

    /// Check if an event matches this filter
    ///
    /// Id filters only reject events that carry a different id; unscoped
    /// events pass them.
    pub fn matches(&self, event: &HiveEvent) -> bool {
        if let Some(ref vid) = self.voting_id {
            if let Some(event_vid) = event.voting_id() {
                if event_vid != vid {
                    return false;
                }
            }
        }

        if let Some(ref did) = self.decision_id {
            if let Some(event_did) = event.decision_id() {
                if event_did != did {
                    return false;
                }
            }
        }

        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == event.event_type()) {
                return false;
            }
        }

        true
    }
}

/// Filtered event receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<HiveEvent>,
    filter: EventFilter,
}

impl FilteredReceiver {
    /// Create a new filtered receiver
    pub fn new(receiver: broadcast::Receiver<HiveEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<HiveEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}

/// Extension trait for subscribing with filters
pub trait EventBusExt {
    /// Subscribe with a filter
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver;
}

impl EventBusExt for EventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

impl EventBusExt for SharedEventBus {
    fn subscribe_filtered(&self, filter: EventFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vote_cast(voting_id: &str, agent_id: &str) -> HiveEvent {
        HiveEvent::VoteCast {
            voting_id: voting_id.to_string(),
            agent_id: agent_id.to_string(),
            option_id: "opt".to_string(),
            weight: 1.0,
            replaced: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(vote_cast("v-1", "a")), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type(), "vote_cast");
    }

    #[tokio::test]
    async fn test_publish_order_preserved() {
        let bus = EventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        for agent in ["a", "b", "c"] {
            bus.publish(vote_cast("v-1", agent));
        }

        for rx in [&mut rx1, &mut rx2] {
            for expected in ["a", "b", "c"] {
                match rx.recv().await.unwrap() {
                    HiveEvent::VoteCast { agent_id, .. } => assert_eq!(agent_id, expected),
                    other => panic!("unexpected event {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::with_history(8);
        assert!(!bus.has_subscribers());
        assert_eq!(bus.publish(vote_cast("v-1", "a")), 0);
        assert_eq!(bus.history().unwrap().len(), 1);
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::new()
            .voting("v-1")
            .types(vec!["vote_cast", "voting_closed"]);

        let non_matching_type = HiveEvent::ReportFailed {
            agent_id: "a".to_string(),
            error: "down".to_string(),
            timestamp: Utc::now(),
        };

        assert!(filter.matches(&vote_cast("v-1", "a")));
        assert!(!filter.matches(&vote_cast("v-2", "a")));
        assert!(!filter.matches(&non_matching_type));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let bus = EventBus::new();
        let filter = EventFilter::new().voting("target");
        let mut filtered = bus.subscribe_filtered(filter);

        let bus_clone = bus;
        tokio::spawn(async move {
            bus_clone.publish(vote_cast("other", "a"));
            bus_clone.publish(vote_cast("target", "b"));
        });

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.voting_id(), Some("target"));
    }
}
