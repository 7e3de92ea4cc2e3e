//! Option derivation from participant reports
//!
//! Reports are grouped by the canonical key of their recommendation; the most
//! frequent distinct recommendations become the ballot.

use serde_json::Value;

use crate::state::{canonical_key, AgentId, AgentReport, VotingOption};

/// Longest value summary used in descriptions
const SUMMARY_CHARS: usize = 80;

/// Short human-readable rendering of a recommendation payload
pub fn describe_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("action").or_else(|| map.get("description")) {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    };

    if text.chars().count() > SUMMARY_CHARS {
        let truncated: String = text.chars().take(SUMMARY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text
    }
}

/// Option id for a canonical key
pub fn option_id(key: &str) -> String {
    format!("opt-{}", &key[..key.len().min(12)])
}

struct Candidate {
    key: String,
    value: Value,
    first_agent: AgentId,
    count: usize,
}

/// Build at most `max_options` options, most frequent first
///
/// Equal counts keep the order in which the recommendation first appeared.
pub fn derive_options(reports: &[AgentReport], max_options: usize) -> Vec<VotingOption> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for report in reports {
        let key = canonical_key(&report.recommendation);
        match candidates.iter_mut().find(|c| c.key == key) {
            Some(candidate) => candidate.count += 1,
            None => candidates.push(Candidate {
                key,
                value: report.recommendation.clone(),
                first_agent: report.agent_id.clone(),
                count: 1,
            }),
        }
    }

    // Stable sort keeps first-appearance order among equal counts
    candidates.sort_by(|a, b| b.count.cmp(&a.count));
    candidates.truncate(max_options);

    candidates
        .into_iter()
        .map(|c| {
            let noun = if c.count == 1 { "agent" } else { "agents" };
            let description = format!(
                "{} (recommended by {} {})",
                describe_value(&c.value),
                c.count,
                noun
            );
            VotingOption::new(option_id(&c.key), c.value, description).proposed_by(c.first_agent)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AgentStatus;
    use chrono::Utc;
    use serde_json::json;

    fn report(agent: &str, recommendation: Value) -> AgentReport {
        AgentReport {
            agent_id: agent.to_string(),
            agent_type: "scout".to_string(),
            status: AgentStatus::Active,
            recommendation,
            confidence: 0.8,
            reasoning: String::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_dedup_by_structure() {
        let reports = vec![
            report("a1", json!({"action": "expand", "region": "eu"})),
            report("a2", json!({"region": "eu", "action": "expand"})),
            report("a3", json!("hold")),
        ];

        let options = derive_options(&reports, 5);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].description, "expand (recommended by 2 agents)");
        assert_eq!(options[0].proposed_by.as_deref(), Some("a1"));
        assert_eq!(options[1].description, "hold (recommended by 1 agent)");
        assert!(options[0].id.starts_with("opt-"));
        assert_ne!(options[0].id, options[1].id);
    }

    #[test]
    fn test_keeps_most_frequent() {
        let mut reports = Vec::new();
        for (i, value) in ["a", "b", "b", "c", "c", "c", "d", "e", "f"]
            .iter()
            .enumerate()
        {
            reports.push(report(&format!("agent-{}", i), json!(value)));
        }

        let options = derive_options(&reports, 3);
        let values: Vec<_> = options.iter().map(|o| o.value.clone()).collect();
        assert_eq!(values, vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_describe_value_truncates() {
        let long = "x".repeat(200);
        let text = describe_value(&json!(long));
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), SUMMARY_CHARS + 3);
        assert_eq!(describe_value(&json!(42)), "42");
    }
}
