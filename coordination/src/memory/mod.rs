//! Decision memory, the in-process learning collaborator.
//!
//! # Modules
//!
//! - [`store`]: `InMemoryDecisionStore` with decisions, outcomes, success rates,
//!   similar-decision lookup and an optional JSONL journal

pub mod store;

pub use store::{success_rates, InMemoryDecisionStore, StoreResult, DEFAULT_CAPACITY};
