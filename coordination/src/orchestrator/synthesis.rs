//! Decision text and rationale from a majority result

use crate::ports::SimilarDecision;
use crate::state::{ConsensusStrength, MajorityResult, VotingOption};

use super::options::describe_value;

/// Human-readable outcome of a vote
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub decision: String,
    pub rationale: String,
    pub strength: ConsensusStrength,
}

/// Synthesize decision text and rationale for a winning option
pub fn synthesize(
    question: &str,
    winner: &VotingOption,
    result: &MajorityResult,
    similar: &[SimilarDecision],
    voting_threshold: f64,
) -> Synthesis {
    let share = result.winning_share().unwrap_or(0.0);
    let strength = ConsensusStrength::from_share(share);
    let choice = describe_value(&winner.value);

    let decision = format!(
        "{}: proceed with {} ({} consensus, {:.0}% of weighted votes)",
        question,
        choice,
        strength,
        share * 100.0
    );

    let p = &result.participation;
    let successes = similar.iter().filter(|d| d.successful).count();
    let mut rationale = format!(
        "{} of {} agents voted ({:.0}% participation).",
        p.actual_voters,
        p.eligible_voters,
        p.participation_rate * 100.0
    );
    if similar.is_empty() {
        rationale.push_str(" No similar past decisions on record.");
    } else {
        rationale.push_str(&format!(
            " {} of {} similar past decisions succeeded.",
            successes,
            similar.len()
        ));
    }
    if result.tie {
        let how = result
            .tie_resolution
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        rationale.push_str(&format!(
            " Tie between {} options settled by {}.",
            result.tied_options.len(),
            how
        ));
    }
    if !result.threshold_met {
        rationale.push_str(&format!(
            " Winning share is below the {:.0}% voting threshold.",
            voting_threshold * 100.0
        ));
    }

    Synthesis {
        decision,
        rationale,
        strength,
    }
}
