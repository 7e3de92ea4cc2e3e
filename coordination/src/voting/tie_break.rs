//! Pending coordinator tie-breaks
//!
//! `close_voting` registers a one-shot channel here before announcing the tie;
//! `resolve_tie` validates the coordinator's pick and completes it.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use tokio::sync::oneshot;
use tracing::debug;

use crate::state::{OptionId, VotingId};

struct PendingTieBreak {
    tied: Vec<OptionId>,
    sender: oneshot::Sender<OptionId>,
}

/// Why a resolution was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveRefusal {
    NotPending,
    NotTied,
}

/// Registry of sessions waiting for the coordinator
#[derive(Default)]
pub struct TieBreakRegistry {
    pending: Mutex<HashMap<VotingId, PendingTieBreak>>,
}

impl TieBreakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tie and get the receiving end of its resolution
    pub fn register(&self, voting_id: &str, tied: Vec<OptionId>) -> oneshot::Receiver<OptionId> {
        let (sender, receiver) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(voting_id.to_string(), PendingTieBreak { tied, sender });
        }
        receiver
    }

    /// Complete a pending tie-break with one of the tied options
    pub fn resolve(&self, voting_id: &str, option_id: &str) -> Result<(), ResolveRefusal> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| ResolveRefusal::NotPending)?;

        match pending.get(voting_id) {
            None => return Err(ResolveRefusal::NotPending),
            Some(entry) if !entry.tied.iter().any(|id| id == option_id) => {
                return Err(ResolveRefusal::NotTied)
            }
            Some(_) => {}
        }

        let entry = pending
            .remove(voting_id)
            .ok_or(ResolveRefusal::NotPending)?;
        // Receiver gone means the wait already timed out
        if entry.sender.send(option_id.to_string()).is_err() {
            debug!(voting_id, option_id, "Tie-break resolution arrived too late");
            return Err(ResolveRefusal::NotPending);
        }
        Ok(())
    }

    /// Drop a registration whose wait ended
    pub fn forget(&self, voting_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(voting_id);
        }
    }

    /// Whether a session is waiting for the coordinator
    pub fn is_pending(&self, voting_id: &str) -> bool {
        self.pending
            .lock()
            .map(|p| p.contains_key(voting_id))
            .unwrap_or(false)
    }
}

/// Uniform random pick among tied options
pub fn pick_random(options: &[OptionId]) -> Option<OptionId> {
    options.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<OptionId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_resolve_completes_waiter() {
        let registry = TieBreakRegistry::new();
        let rx = registry.register("v-1", ids(&["a", "b"]));
        assert!(registry.is_pending("v-1"));

        registry.resolve("v-1", "b").unwrap();
        assert_eq!(rx.await.unwrap(), "b");
        assert!(!registry.is_pending("v-1"));
    }

    #[test]
    fn test_resolve_rejects_untied_option() {
        let registry = TieBreakRegistry::new();
        let _rx = registry.register("v-1", ids(&["a", "b"]));

        assert_eq!(registry.resolve("v-1", "c"), Err(ResolveRefusal::NotTied));
        assert_eq!(registry.resolve("v-2", "a"), Err(ResolveRefusal::NotPending));
        assert!(registry.is_pending("v-1"));
    }

    #[test]
    fn test_forget_and_late_resolution() {
        let registry = TieBreakRegistry::new();
        let rx = registry.register("v-1", ids(&["a", "b"]));
        drop(rx);

        assert_eq!(registry.resolve("v-1", "a"), Err(ResolveRefusal::NotPending));

        let _rx = registry.register("v-2", ids(&["a"]));
        registry.forget("v-2");
        assert!(!registry.is_pending("v-2"));
    }

    #[test]
    fn test_pick_random_stays_within_tied_set() {
        let tied = ids(&["a", "b"]);
        for _ in 0..50 {
            let pick = pick_random(&tied).unwrap();
            assert!(tied.contains(&pick));
        }
        assert!(pick_random(&[]).is_none());
    }
}
