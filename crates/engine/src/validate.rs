//! `WorkflowEngine::validate` — pure structural validation, no side effects.
//!
//! Implements validation rules 1-7 from spec §4.1 plus the two warning
//! heuristics it names. Mirrors the teacher's `dag::validate_dag` in shape
//! (collect-then-report rather than bail-on-first-error) but returns a
//! report instead of throwing, since the spec's `validate` contract is
//! `{ok, errors[], warnings[]}`.

use std::collections::{HashMap, HashSet};

use crate::models::{ErrorPolicy, StepKind, Workflow};
use crate::template;

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: String,
    pub step_id: Option<String>,
}

impl ValidationIssue {
    fn new(code: &'static str, message: impl Into<String>, step_id: Option<&str>) -> Self {
        Self {
            code,
            message: message.into(),
            step_id: step_id.map(String::from),
        }
    }
}

/// Result of `validate`: structural errors (fatal) and warnings (advisory).
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Allows `validate` to emit the "retry on non-idempotent payment tool"
/// warning (spec §4.1) without `engine` depending on the `tools` crate.
/// `tools::ToolRegistry` implements this.
pub trait ToolIdempotencyLookup {
    /// `None` when the tool id is unknown to the registry (a separate,
    /// dispatch-time concern — `engine` does not treat it as a validation
    /// error since tools may be registered dynamically after validation).
    fn is_idempotent(&self, tool_id: &str) -> Option<bool>;
}

/// Validate without consulting a tool registry (skips the idempotency
/// warning only; all other rules still run).
pub fn validate(workflow: &Workflow) -> ValidationReport {
    validate_inner(workflow, None)
}

/// Validate with a tool registry available, enabling the full warning set.
pub fn validate_with_lookup(
    workflow: &Workflow,
    lookup: &dyn ToolIdempotencyLookup,
) -> ValidationReport {
    validate_inner(workflow, Some(lookup))
}

fn validate_inner(
    workflow: &Workflow,
    lookup: Option<&dyn ToolIdempotencyLookup>,
) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Rule 1: at least one step; exactly one TRIGGER.
    if workflow.steps.is_empty() {
        errors.push(ValidationIssue::new("empty_workflow", "workflow has no steps", None));
    }
    let trigger_count = workflow
        .steps
        .iter()
        .filter(|s| s.kind == StepKind::Trigger)
        .count();
    if trigger_count != 1 {
        errors.push(ValidationIssue::new(
            "trigger_count",
            format!("expected exactly one TRIGGER step, found {trigger_count}"),
            None,
        ));
    }

    // Rule 2: unique, non-empty ids.
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if step.id.is_empty() {
            errors.push(ValidationIssue::new("empty_step_id", "step id must not be empty", None));
            continue;
        }
        if !seen_ids.insert(step.id.as_str()) {
            errors.push(ValidationIssue::new(
                "duplicate_step_id",
                format!("duplicate step id '{}'", step.id),
                Some(&step.id),
            ));
        }
    }

    let known_ids: HashSet<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();

    // Rule 3: successor references resolve.
    for step in &workflow.steps {
        for target in step.successors.all_targets() {
            if !known_ids.contains(target) {
                errors.push(ValidationIssue::new(
                    "unknown_successor",
                    format!("step '{}' references unknown successor '{}'", step.id, target),
                    Some(&step.id),
                ));
            }
        }
    }

    // Rule 7: only CONDITION steps may fan out to more than one successor.
    for step in &workflow.steps {
        if step.kind != StepKind::Condition && step.successors.conditional.len() > 1 {
            errors.push(ValidationIssue::new(
                "non_condition_fan_out",
                format!(
                    "step '{}' is not a CONDITION step but declares {} conditional successors",
                    step.id,
                    step.successors.conditional.len()
                ),
                Some(&step.id),
            ));
        }
    }

    // Rule 4: every non-trigger step reachable from the trigger.
    let reachable = reachable_from_trigger(workflow);
    for step in &workflow.steps {
        if step.kind != StepKind::Trigger && !reachable.contains(step.id.as_str()) {
            errors.push(ValidationIssue::new(
                "unreachable_step",
                format!("step '{}' is unreachable from the trigger", step.id),
                Some(&step.id),
            ));
        }
    }

    // Rule 5: parameter templates parse.
    for step in &workflow.steps {
        if let Err(e) = template::validate_value(&step.parameters) {
            errors.push(ValidationIssue::new(
                "invalid_template",
                format!("step '{}' has an invalid template expression: {}", step.id, e),
                Some(&step.id),
            ));
        }
    }

    // Rule 6: timeout and retry bounds.
    for step in &workflow.steps {
        if step.timeout_ms < crate::models::MIN_STEP_TIMEOUT_MS
            || step.timeout_ms > crate::models::MAX_STEP_TIMEOUT_MS
        {
            errors.push(ValidationIssue::new(
                "timeout_out_of_range",
                format!(
                    "step '{}' timeout {}ms is out of range [{}, {}]",
                    step.id,
                    step.timeout_ms,
                    crate::models::MIN_STEP_TIMEOUT_MS,
                    crate::models::MAX_STEP_TIMEOUT_MS
                ),
                Some(&step.id),
            ));
        }
        if let ErrorPolicy::Retry { max_attempts } = step.error_policy {
            if max_attempts == 0 || max_attempts > ErrorPolicy::MAX_RETRY_ATTEMPTS {
                errors.push(ValidationIssue::new(
                    "retry_count_out_of_range",
                    format!(
                        "step '{}' retry count {} exceeds maximum of {}",
                        step.id,
                        max_attempts,
                        ErrorPolicy::MAX_RETRY_ATTEMPTS
                    ),
                    Some(&step.id),
                ));
            }
        }
    }

    // Warning: isolated subgraphs — a step whose only inbound edges are
    // `onFailure` edges from steps whose policy is STOP. STOP never
    // traverses onFailure, so the step is statically reachable but
    // pragmatically dead.
    let inbound = inbound_edges(workflow);
    for step in &workflow.steps {
        if step.kind == StepKind::Trigger {
            continue;
        }
        if let Some(sources) = inbound.get(step.id.as_str()) {
            if !sources.is_empty()
                && sources.iter().all(|(from_id, via_failure)| {
                    *via_failure
                        && workflow
                            .step(from_id)
                            .map(|s| s.error_policy == ErrorPolicy::Stop)
                            .unwrap_or(false)
                })
            {
                warnings.push(ValidationIssue::new(
                    "isolated_subgraph",
                    format!(
                        "step '{}' is only reachable via onFailure from STOP-policy steps and can never run",
                        step.id
                    ),
                    Some(&step.id),
                ));
            }
        }
    }

    // Warning: CONTINUE feeding a step that templates this step's output.
    for step in &workflow.steps {
        if step.error_policy != ErrorPolicy::Continue {
            continue;
        }
        let next_id = step
            .successors
            .on_failure
            .as_deref()
            .or(step.successors.on_success.as_deref());
        if let Some(next_id) = next_id {
            if let Some(next) = workflow.step(next_id) {
                if references_step_output(&next.parameters, &step.id) {
                    warnings.push(ValidationIssue::new(
                        "continue_feeds_dependent_output",
                        format!(
                            "step '{}' uses CONTINUE but its failure successor '{}' references its output",
                            step.id, next_id
                        ),
                        Some(&step.id),
                    ));
                }
            }
        }
    }

    // Warning: retry policy on a non-idempotent payment tool.
    if let Some(lookup) = lookup {
        for step in &workflow.steps {
            if let ErrorPolicy::Retry { .. } = step.error_policy {
                if lookup.is_idempotent(&step.tool_id) == Some(false) {
                    warnings.push(ValidationIssue::new(
                        "retry_on_non_idempotent_tool",
                        format!(
                            "step '{}' retries tool '{}' which is declared non-idempotent",
                            step.id, step.tool_id
                        ),
                        Some(&step.id),
                    ));
                }
            }
        }
    }

    ValidationReport {
        ok: errors.is_empty(),
        errors,
        warnings,
    }
}

fn references_step_output(params: &serde_json::Value, step_id: &str) -> bool {
    match params {
        serde_json::Value::String(s) => {
            if let Ok(parsed) = template::parse(s) {
                parsed.parts.iter().any(|p| {
                    matches!(p, template::TemplatePart::Expr(segs)
                        if segs.first().map(String::as_str) == Some("steps")
                            && segs.get(1).map(String::as_str) == Some(step_id))
                })
            } else {
                false
            }
        }
        serde_json::Value::Array(items) => items.iter().any(|v| references_step_output(v, step_id)),
        serde_json::Value::Object(map) => map.values().any(|v| references_step_output(v, step_id)),
        _ => false,
    }
}

/// All step ids reachable from the trigger step, following every kind of
/// successor edge.
fn reachable_from_trigger(workflow: &Workflow) -> HashSet<&str> {
    let Some(trigger) = workflow.trigger_step() else {
        return HashSet::new();
    };
    let node_map: HashMap<&str, &crate::models::Step> =
        workflow.steps.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![trigger.id.as_str()];
    visited.insert(trigger.id.as_str());

    while let Some(id) = stack.pop() {
        let Some(step) = node_map.get(id) else { continue };
        for target in step.successors.all_targets() {
            if node_map.contains_key(target) && visited.insert(target) {
                stack.push(target);
            }
        }
    }
    visited
}

/// Maps step id -> list of (source step id, "this edge is an onFailure edge").
fn inbound_edges(workflow: &Workflow) -> HashMap<&str, Vec<(&str, bool)>> {
    let mut map: HashMap<&str, Vec<(&str, bool)>> = HashMap::new();
    for step in &workflow.steps {
        if let Some(s) = &step.successors.on_success {
            map.entry(s.as_str()).or_default().push((step.id.as_str(), false));
        }
        if let Some(f) = &step.successors.on_failure {
            map.entry(f.as_str()).or_default().push((step.id.as_str(), true));
        }
        for c in &step.successors.conditional {
            map.entry(c.target.as_str())
                .or_default()
                .push((step.id.as_str(), false));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConditionalEdge, Successors, TriggerKind};

    fn action(id: &str, successors: Successors) -> crate::models::Step {
        crate::models::Step {
            id: id.into(),
            kind: StepKind::Action,
            tool_id: "mock".into(),
            parameters: serde_json::Value::Null,
            timeout_ms: 5_000,
            error_policy: ErrorPolicy::Stop,
            successors,
        }
    }

    fn trigger(id: &str, next: &str) -> crate::models::Step {
        crate::models::Step {
            id: id.into(),
            kind: StepKind::Trigger,
            tool_id: "manual_trigger".into(),
            parameters: serde_json::Value::Null,
            timeout_ms: 5_000,
            error_policy: ErrorPolicy::Stop,
            successors: Successors {
                on_success: Some(next.into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn valid_linear_workflow_passes() {
        let wf = Workflow::new(
            "tenant-a",
            "linear",
            TriggerKind::Manual,
            vec![
                trigger("t", "a"),
                action("a", Successors::default()),
            ],
        );
        let report = validate(&wf);
        assert!(report.ok, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_trigger_is_an_error() {
        let wf = Workflow::new(
            "tenant-a",
            "no-trigger",
            TriggerKind::Manual,
            vec![action("a", Successors::default())],
        );
        let report = validate(&wf);
        assert!(!report.ok);
        assert!(report.errors.iter().any(|e| e.code == "trigger_count"));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let wf = Workflow::new(
            "tenant-a",
            "dup",
            TriggerKind::Manual,
            vec![trigger("t", "a"), action("a", Successors::default()), action("a", Successors::default())],
        );
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "duplicate_step_id"));
    }

    #[test]
    fn unreachable_step_rejected() {
        let wf = Workflow::new(
            "tenant-a",
            "orphan",
            TriggerKind::Manual,
            vec![
                trigger("t", "a"),
                action("a", Successors::default()),
                action("orphan", Successors::default()),
            ],
        );
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "unreachable_step"));
    }

    #[test]
    fn unknown_successor_rejected() {
        let wf = Workflow::new(
            "tenant-a",
            "bad-edge",
            TriggerKind::Manual,
            vec![trigger("t", "ghost")],
        );
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "unknown_successor"));
    }

    #[test]
    fn non_condition_multi_successor_rejected() {
        let wf = Workflow::new(
            "tenant-a",
            "fan-out",
            TriggerKind::Manual,
            vec![
                trigger("t", "a"),
                action(
                    "a",
                    Successors {
                        conditional: vec![
                            ConditionalEdge { expression: "true".into(), target: "t".into() },
                            ConditionalEdge { expression: "false".into(), target: "t".into() },
                        ],
                        ..Default::default()
                    },
                ),
            ],
        );
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "non_condition_fan_out"));
    }

    #[test]
    fn retry_count_out_of_range_rejected() {
        let mut wf = Workflow::new(
            "tenant-a",
            "bad-retry",
            TriggerKind::Manual,
            vec![trigger("t", "a"), action("a", Successors::default())],
        );
        wf.steps[1].error_policy = ErrorPolicy::Retry { max_attempts: 11 };
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "retry_count_out_of_range"));
    }

    #[test]
    fn timeout_out_of_range_rejected() {
        let mut wf = Workflow::new(
            "tenant-a",
            "bad-timeout",
            TriggerKind::Manual,
            vec![trigger("t", "a"), action("a", Successors::default())],
        );
        wf.steps[1].timeout_ms = 10;
        let report = validate(&wf);
        assert!(report.errors.iter().any(|e| e.code == "timeout_out_of_range"));
    }

    #[test]
    fn isolated_subgraph_warning() {
        let mut t = trigger("t", "a");
        t.successors.on_failure = None;
        let mut a = action("a", Successors::default());
        a.error_policy = ErrorPolicy::Stop;
        a.successors.on_failure = Some("dead".into());
        let dead = action("dead", Successors::default());
        let wf = Workflow::new("tenant-a", "iso", TriggerKind::Manual, vec![t, a, dead]);
        let report = validate(&wf);
        assert!(report.ok);
        assert!(report.warnings.iter().any(|w| w.code == "isolated_subgraph"));
    }
}
