//! Event-driven notifications for the hive
//!
//! This module provides the typed pub/sub channel that replaces ambient
//! event emitters: every notification the engine and the orchestrator emit
//! is a `HiveEvent` variant, delivered in publish order to each subscriber.
//!
//! # Architecture
//!
//! 1. **Event Types** (`types.rs`): voting-started, vote-cast, voting-closed,
//!    decision-deferred, tie-break-needed, decision-made, emergency-handled,
//!    health-report, and friends.
//!
//! 2. **Event Bus** (`bus.rs`): Tokio broadcast-based pub/sub with filters.
//!
//! 3. **Event History** (`history.rs`): bounded replay window and stats.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ VotingEngine │────▶│  Event Bus   │────▶│  Subscribers │
//! │ Orchestrator │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────┬───────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │   History    │
//!                      │  (bounded)   │
//!                      └──────────────┘
//! ```

pub mod bus;
pub mod history;
pub mod types;

// Re-export core types
pub use bus::{EventBus, EventBusExt, EventFilter, FilteredReceiver, SharedEventBus};
pub use history::{EventHistory, EventStats};
pub use types::{EventId, HiveEvent, VoteSummary};
