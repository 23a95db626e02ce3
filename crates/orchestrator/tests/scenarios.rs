//! End-to-end orchestrator scenarios, run against in-memory adapters
//! (`db::memory::InMemoryStore`, `orchestrator::InMemoryEventBus`) and
//! `tools::mock::MockTool` test doubles, mirroring the teacher's
//! `executor_tests.rs` approach of exercising the executor without a
//! live database.

use std::sync::Arc;

use db::memory::InMemoryStore;
use engine::{ConditionalEdge, ErrorPolicy, Step, StepKind, Successors, TriggerKind, Workflow};
use mandates::{Ed25519Signer, MandateChainManager, Signer};
use orchestrator::{
    ExecutionContext, ExecutionStatus, InMemoryEventBus, Orchestrator, OrchestratorConfig,
    OrchestratorError, StepStatus, TenantConstraints,
};
use serde_json::json;
use tools::mock::MockTool;
use tools::ToolRegistry;

/// Fast-retry config so `RETRY` scenarios don't actually wait out the
/// production 250ms/5s backoff schedule.
fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry_base_delay_ms: 5,
        retry_factor: 2.0,
        retry_cap_ms: 20,
        retry_jitter_pct: 0.1,
        rollback_deadline_ms: 2_000,
        default_loop_bound: 100,
    }
}

fn trigger(next: &str) -> Step {
    Step {
        id: "trigger".into(),
        kind: StepKind::Trigger,
        tool_id: "trigger_tool".into(),
        parameters: json!({}),
        timeout_ms: 1_000,
        error_policy: ErrorPolicy::Stop,
        successors: Successors { on_success: Some(next.into()), ..Default::default() },
    }
}

fn action(id: &str, tool_id: &str, error_policy: ErrorPolicy, successors: Successors) -> Step {
    Step {
        id: id.into(),
        kind: StepKind::Action,
        tool_id: tool_id.into(),
        parameters: json!({}),
        timeout_ms: 1_000,
        error_policy,
        successors,
    }
}

fn context() -> ExecutionContext {
    ExecutionContext {
        tenant_id: "tenant-a".into(),
        user_id: Some("user-1".into()),
        constraints: TenantConstraints::default(),
        input: json!({}),
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<InMemoryStore>,
}

fn harness(tools: ToolRegistry, config: OrchestratorConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let signer: Arc<dyn Signer> = Arc::new(Ed25519Signer::generate("test-signer"));
    let orchestrator = Orchestrator::new(
        Arc::new(tools),
        Arc::new(MandateChainManager::new()),
        signer,
        store.clone(),
        Arc::new(InMemoryEventBus::new(64)),
        Arc::new(engine::SystemClock),
        config,
    );
    Harness { orchestrator, store }
}

#[tokio::test]
async fn linear_workflow_completes_all_steps_in_order() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::returning("charge", json!({ "ok": true })))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "linear",
        TriggerKind::Manual,
        vec![trigger("charge"), action("charge", "charge", ErrorPolicy::Stop, Successors::default())],
    );

    let h = harness(tools, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.step_results.len(), 2);
    assert!(execution.step_results.iter().all(|r| r.status == StepStatus::Completed));
    assert_eq!(execution.metrics.unwrap().completed_steps, 2);
}

#[tokio::test]
async fn retry_then_succeed_records_every_attempt() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    let flaky = Arc::new(MockTool::failing_n_times("flaky", 2, "temporary outage", json!({ "ok": true })));
    tools.register(flaky.clone()).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "retry",
        TriggerKind::Manual,
        vec![
            trigger("flaky"),
            action("flaky", "flaky", ErrorPolicy::Retry { max_attempts: 3 }, Successors::default()),
        ],
    );

    let h = harness(tools, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(flaky.call_count(), 3);
    let result = execution.step_results.iter().find(|r| r.step_id == "flaky").unwrap();
    assert_eq!(result.attempts, 3);
    assert_eq!(result.status, StepStatus::Completed);
}

#[tokio::test]
async fn retry_exhaustion_stops_the_execution() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::failing("always_fails", "down for good"))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "retry-exhausted",
        TriggerKind::Manual,
        vec![
            trigger("doomed"),
            action("doomed", "always_fails", ErrorPolicy::Retry { max_attempts: 2 }, Successors::default()),
        ],
    );

    let h = harness(tools, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.failure_reason.is_some());
    let failure = execution.failure_reason.unwrap();
    assert_eq!(failure.step_id.as_deref(), Some("doomed"));
}

#[tokio::test]
async fn payment_failure_triggers_rollback_and_cancellation_mandate() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    let charge = Arc::new(MockTool::returning_with_rollback("payment_charge", json!({ "amount": 100 })));
    tools.register(charge.clone()).unwrap();
    tools.register(Arc::new(MockTool::failing("payment_notify", "downstream notify failed"))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "payment-rollback",
        TriggerKind::Manual,
        vec![
            trigger("charge"),
            action(
                "charge",
                "payment_charge",
                ErrorPolicy::Stop,
                Successors { on_success: Some("notify".into()), ..Default::default() },
            ),
            action("notify", "payment_notify", ErrorPolicy::Rollback, Successors::default()),
        ],
    );

    let h = harness(tools, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(charge.rollback_count(), 1);

    let chain_id = execution.mandate_chain_id.expect("payment steps open a mandate chain");
    let chain = h.store.load_chain(&chain_id).await.unwrap();
    let kinds: Vec<_> = chain.iter().map(|m| m.kind).collect();
    assert!(kinds.contains(&mandates::MandateKind::Intent));
    assert!(kinds.contains(&mandates::MandateKind::Payment));
    assert!(kinds.contains(&mandates::MandateKind::Cancellation));
}

#[tokio::test]
async fn condition_step_follows_the_matching_branch() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::returning("high_path", json!({ "taken": "high" })))).unwrap();
    tools.register(Arc::new(MockTool::returning("low_path", json!({ "taken": "low" })))).unwrap();

    let branch = Step {
        id: "branch".into(),
        kind: StepKind::Condition,
        tool_id: "condition_compare".into(),
        parameters: json!({}),
        timeout_ms: 1_000,
        error_policy: ErrorPolicy::Stop,
        successors: Successors {
            conditional: vec![
                ConditionalEdge { expression: "${amount} > 100".into(), target: "high_path".into() },
                ConditionalEdge { expression: "true".into(), target: "low_path".into() },
            ],
            ..Default::default()
        },
    };

    let mut tools_with_condition = tools;
    tools_with_condition
        .register(Arc::new(MockTool::returning("condition_compare", json!({}))))
        .unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "branching",
        TriggerKind::Manual,
        vec![
            trigger("branch"),
            branch,
            action("high_path", "high_path", ErrorPolicy::Stop, Successors::default()),
            action("low_path", "low_path", ErrorPolicy::Stop, Successors::default()),
        ],
    );

    let h = harness(tools_with_condition, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({ "amount": 250 }))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let step_ids: Vec<_> = execution.step_results.iter().map(|r| r.step_id.as_str()).collect();
    assert!(step_ids.contains(&"high_path"));
    assert!(!step_ids.contains(&"low_path"));
}

#[tokio::test]
async fn step_timeout_fails_only_that_step_under_continue() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools
        .register(Arc::new(MockTool::sleeping(
            "slow",
            std::time::Duration::from_millis(1_500),
            json!({ "unused": true }),
        )))
        .unwrap();
    tools.register(Arc::new(MockTool::returning("after", json!({ "reached": true })))).unwrap();

    let mut slow_step = action(
        "slow",
        "slow",
        ErrorPolicy::Continue,
        Successors { on_success: Some("after".into()), ..Default::default() },
    );
    slow_step.timeout_ms = 1_000;

    let workflow = Workflow::new(
        "tenant-a",
        "timeout",
        TriggerKind::Manual,
        vec![trigger("slow"), slow_step, action("after", "after", ErrorPolicy::Stop, Successors::default())],
    );

    let h = harness(tools, fast_config());
    let execution = h
        .orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let slow_result = execution.step_results.iter().find(|r| r.step_id == "slow").unwrap();
    assert_eq!(slow_result.status, StepStatus::Failed);
    assert!(slow_result.error.as_deref().unwrap_or("").contains("timed out"));
    assert!(execution.step_results.iter().any(|r| r.step_id == "after" && r.status == StepStatus::Completed));
}

#[tokio::test]
async fn mandate_chain_survives_verification_after_a_full_payment_run() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools
        .register(Arc::new(MockTool::returning_with_rollback("payment_charge", json!({ "amount": 42 }))))
        .unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "payment-ok",
        TriggerKind::Manual,
        vec![trigger("charge"), action("charge", "payment_charge", ErrorPolicy::Stop, Successors::default())],
    );

    let store = Arc::new(InMemoryStore::new());
    let signer = Arc::new(Ed25519Signer::generate("chain-signer"));
    let mandates = Arc::new(MandateChainManager::new());
    let orchestrator = Orchestrator::new(
        Arc::new(tools),
        mandates.clone(),
        signer.clone(),
        store.clone(),
        Arc::new(InMemoryEventBus::new(64)),
        Arc::new(engine::SystemClock),
        fast_config(),
    );

    let execution = orchestrator
        .execute("agent-1", &workflow, context(), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let chain_id = execution.mandate_chain_id.expect("payment step opens a chain");

    let verification = mandates.verify(&chain_id, signer.as_ref()).unwrap();
    assert!(verification.ok, "expected an untampered chain, got {:?}", verification.failures);
}

#[tokio::test]
async fn cancel_stops_further_step_events_from_being_published() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools
        .register(Arc::new(MockTool::sleeping(
            "slow",
            std::time::Duration::from_millis(300),
            json!({ "unused": true }),
        )))
        .unwrap();
    tools.register(Arc::new(MockTool::returning("after", json!({ "reached": true })))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "cancel-mid-run",
        TriggerKind::Manual,
        vec![
            trigger("slow"),
            action("slow", "slow", ErrorPolicy::Continue, Successors { on_success: Some("after".into()), ..Default::default() }),
            action("after", "after", ErrorPolicy::Stop, Successors::default()),
        ],
    );

    let store = Arc::new(InMemoryStore::new());
    let events = Arc::new(InMemoryEventBus::new(64));
    let signer: Arc<dyn Signer> = Arc::new(Ed25519Signer::generate("test-signer"));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(tools),
        Arc::new(MandateChainManager::new()),
        signer,
        store.clone(),
        events.clone(),
        Arc::new(engine::SystemClock),
        fast_config(),
    ));

    let mut receiver = events.subscribe();

    let orch = orchestrator.clone();
    let wf = workflow.clone();
    let handle = tokio::spawn(async move { orch.execute("agent-1", &wf, context(), json!({})).await });

    // Wait for the slow step to actually start before cancelling, so the
    // cancellation genuinely lands mid-run rather than before anything
    // dispatches.
    let execution_id = loop {
        let event = receiver.recv().await.unwrap();
        if event.topic.ends_with("step:update")
            && event.payload.get("stepId").and_then(|v| v.as_str()) == Some("slow")
            && event.payload.get("status").and_then(|v| v.as_str()) == Some("RUNNING")
        {
            break event.execution_id;
        }
    };

    orchestrator.cancel(execution_id).unwrap();

    let execution = handle.await.unwrap().unwrap();
    assert_eq!(execution.status, ExecutionStatus::Cancelled);

    let mut saw_after_event = false;
    while let Ok(event) = receiver.try_recv() {
        if event.topic.ends_with("step:update") && event.payload.get("stepId").and_then(|v| v.as_str()) == Some("after") {
            saw_after_event = true;
        }
    }
    assert!(!saw_after_event, "no step:update should be published for a step past the cancellation point");
    assert!(!execution.step_results.iter().any(|r| r.step_id == "after"));
}

#[tokio::test]
async fn cancel_distinguishes_not_found_from_already_terminal() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::returning("charge", json!({ "ok": true })))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "cancel-after-finish",
        TriggerKind::Manual,
        vec![trigger("charge"), action("charge", "charge", ErrorPolicy::Stop, Successors::default())],
    );

    let h = harness(tools, fast_config());
    let execution = h.orchestrator.execute("agent-1", &workflow, context(), json!({})).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let err = h.orchestrator.cancel(execution.execution_id).unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyTerminal(_)));

    let unknown_err = h.orchestrator.cancel(uuid::Uuid::new_v4()).unwrap_err();
    assert!(matches!(unknown_err, OrchestratorError::ExecutionNotFound(_)));
}

#[tokio::test]
async fn budget_ceiling_blocks_a_step_once_exceeded() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::returning("priced", json!({ "cost": 100.0 })))).unwrap();
    tools.register(Arc::new(MockTool::returning("after", json!({ "reached": true })))).unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "budget",
        TriggerKind::Manual,
        vec![
            trigger("priced"),
            action("priced", "priced", ErrorPolicy::Stop, Successors { on_success: Some("after".into()), ..Default::default() }),
            action("after", "after", ErrorPolicy::Stop, Successors::default()),
        ],
    );

    let mut ctx = context();
    ctx.constraints.budget_ceiling = Some(50.0);

    let h = harness(tools, fast_config());
    let execution = h.orchestrator.execute("agent-1", &workflow, ctx, json!({})).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    let after_result = execution.step_results.iter().find(|r| r.step_id == "after").unwrap();
    assert_eq!(after_result.status, StepStatus::Failed);
    assert!(after_result.error.as_deref().unwrap_or("").contains("budget ceiling"));
}

#[tokio::test]
async fn require_approval_blocks_payment_until_an_approval_step_runs() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools.register(Arc::new(MockTool::returning("approval_human", json!({ "approved": true })))).unwrap();
    tools
        .register(Arc::new(MockTool::returning_with_rollback("payment_charge", json!({ "amount": 10 }))))
        .unwrap();

    let approval_step = Step {
        id: "approve".into(),
        kind: StepKind::Approval,
        tool_id: "approval_human".into(),
        parameters: json!({}),
        timeout_ms: 1_000,
        error_policy: ErrorPolicy::Stop,
        successors: Successors { on_success: Some("charge".into()), ..Default::default() },
    };

    let workflow = Workflow::new(
        "tenant-a",
        "approval-gated-payment",
        TriggerKind::Manual,
        vec![trigger("approve"), approval_step, action("charge", "payment_charge", ErrorPolicy::Stop, Successors::default())],
    );

    let mut ctx = context();
    ctx.constraints.require_approval = true;

    let h = harness(tools, fast_config());
    let execution = h.orchestrator.execute("agent-1", &workflow, ctx, json!({})).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Completed);
    let charge_result = execution.step_results.iter().find(|r| r.step_id == "charge").unwrap();
    assert_eq!(charge_result.status, StepStatus::Completed);

    let chain_id = execution.mandate_chain_id.expect("the approval step opens a mandate chain");
    let chain = h.store.load_chain(&chain_id).await.unwrap();
    assert!(chain.iter().any(|m| m.kind == mandates::MandateKind::Approval));
}

#[tokio::test]
async fn require_approval_rejects_payment_with_no_prior_approval() {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(MockTool::returning("trigger_tool", json!({})))).unwrap();
    tools
        .register(Arc::new(MockTool::returning_with_rollback("payment_charge", json!({ "amount": 10 }))))
        .unwrap();

    let workflow = Workflow::new(
        "tenant-a",
        "approval-gated-payment-missing",
        TriggerKind::Manual,
        vec![trigger("charge"), action("charge", "payment_charge", ErrorPolicy::Stop, Successors::default())],
    );

    let mut ctx = context();
    ctx.constraints.require_approval = true;

    let h = harness(tools, fast_config());
    let execution = h.orchestrator.execute("agent-1", &workflow, ctx, json!({})).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    let charge_result = execution.step_results.iter().find(|r| r.step_id == "charge").unwrap();
    assert_eq!(charge_result.status, StepStatus::Failed);
    assert!(charge_result.error.as_deref().unwrap_or("").contains("approved APPROVAL mandate"));
    assert!(execution.mandate_chain_id.is_none());
}
