//! Implementation plans: steps, assignments, timeline

use serde_json::Value;

use crate::state::{
    AgentAssignment, AgentId, AgentReport, ExecutionStep, ImplementationPlan, Timeline,
    TimelineEntry, Urgency,
};

/// Criteria attached to every plan
pub const BASE_SUCCESS_CRITERIA: [&str; 3] = [
    "decision implemented",
    "error rate below threshold",
    "all assigned agents report completion",
];

/// A step before ids and scaling are applied
#[derive(Debug, Clone, PartialEq)]
pub struct StepDraft {
    pub description: String,
    pub minutes: u32,
}

impl StepDraft {
    pub fn new(description: impl Into<String>, minutes: u32) -> Self {
        Self {
            description: description.into(),
            minutes,
        }
    }
}

/// Decompose a winning value into step drafts
///
/// A `steps` array (or the value itself when it is an array) yields one step
/// per element; elements are strings or objects with `description`/`action`
/// and an optional `duration_minutes`. Anything else becomes a single step.
pub fn plan_steps(value: &Value, decision: &str, default_minutes: u32) -> Vec<StepDraft> {
    let items = match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.get("steps").and_then(Value::as_array),
        _ => None,
    };

    let drafts: Vec<StepDraft> = items
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(s) => Some(StepDraft::new(s.clone(), default_minutes)),
            Value::Object(map) => {
                let description = map
                    .get("description")
                    .or_else(|| map.get("action"))
                    .and_then(Value::as_str)?;
                let minutes = map
                    .get("duration_minutes")
                    .and_then(Value::as_u64)
                    .map(|m| m.min(u32::MAX as u64) as u32)
                    .unwrap_or(default_minutes);
                Some(StepDraft::new(description, minutes))
            }
            _ => None,
        })
        .collect();

    if drafts.is_empty() {
        vec![StepDraft::new(
            format!("Implement decision: {}", decision),
            default_minutes,
        )]
    } else {
        drafts
    }
}

/// Reporting agents, most confident first (agent id breaks ties)
pub fn assignees_by_confidence(reports: &[AgentReport]) -> Vec<AgentId> {
    let mut ranked: Vec<&AgentReport> = reports.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    ranked.into_iter().map(|r| r.agent_id.clone()).collect()
}

/// Assemble a plan: round-robin assignment and a sequential timeline
///
/// Durations are scaled by urgency and never drop below one minute. With no
/// assignees every step goes to `fallback_assignee`.
pub fn build_plan(
    drafts: Vec<StepDraft>,
    assignees: &[AgentId],
    fallback_assignee: &str,
    urgency: Urgency,
    extra_criteria: &[&str],
) -> ImplementationPlan {
    let factor = urgency.duration_factor();
    let mut steps = Vec::with_capacity(drafts.len());
    let mut assignments = Vec::with_capacity(drafts.len());
    let mut entries = Vec::with_capacity(drafts.len());
    let mut clock = 0u32;

    for (i, draft) in drafts.into_iter().enumerate() {
        let id = format!("step-{}", i + 1);
        let minutes = ((draft.minutes as f64 * factor).round() as u32).max(1);

        let agent_id = if assignees.is_empty() {
            fallback_assignee.to_string()
        } else {
            assignees[i % assignees.len()].clone()
        };

        assignments.push(AgentAssignment {
            step_id: id.clone(),
            agent_id,
        });
        entries.push(TimelineEntry {
            step_id: id.clone(),
            start_minute: clock,
            end_minute: clock.saturating_add(minutes),
        });
        clock = clock.saturating_add(minutes);
        steps.push(ExecutionStep {
            id,
            description: draft.description,
            estimated_minutes: minutes,
        });
    }

    let success_criteria = BASE_SUCCESS_CRITERIA
        .iter()
        .chain(extra_criteria.iter())
        .map(|c| c.to_string())
        .collect();

    ImplementationPlan {
        steps,
        assignments,
        timeline: Timeline {
            entries,
            total_minutes: clock,
        },
        success_criteria,
    }
}
