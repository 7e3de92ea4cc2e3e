//! Weighted-majority voting engine
//!
//! Owns voting-session lifecycle, the per-agent weight table, tallying, the
//! quorum check and tie resolution.
//!
//! # Close algorithm
//!
//! 1. Participation is recomputed from the live vote set.
//! 2. Below quorum (or with no votes at all) the result is deferred.
//! 3. Otherwise weights are summed per option and the strict maximum wins.
//! 4. Sums within `1e-9` of each other are tied and resolved per
//!    `TieBreaker`: the coordinator is asked (with a configurable fallback at
//!    the deadline) or one of the tied options is drawn at random.

pub mod engine;
pub mod metrics;
pub mod session;
pub mod tie_break;

pub use engine::{SharedVotingEngine, VotingEngine, VotingError, VotingResult, VotingStatus};
pub use metrics::VotingMetrics;
pub use session::{SessionStatus, Tally, VotingSession, TIE_EPSILON};
