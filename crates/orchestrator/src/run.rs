//! `Orchestrator` — drives one execution of a workflow end to end (spec
//! §4.3), generalizing the teacher's `WorkflowExecutor::run` /
//! `execute_with_retry` from a single linear node chain to the full
//! branching/retry/rollback/mandate semantics the spec requires.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use engine::{Clock, ErrorPolicy, Step, StepKind, Workflow};
use mandates::{MandateChainManager, MandateKind, MandateStatus, Signer};
use rand::rngs::OsRng;
use serde_json::Value;
use tools::{CancellationToken, RunContext, ToolRegistry};
use uuid::Uuid;

use crate::backoff::compute_delay;
use crate::condition;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::models::{
    AuditEntry, Execution, ExecutionContext, ExecutionStatus, Metrics, StepResult, StepStatus,
};
use crate::ports::{EventBus, EventKind, ExecutionPatch, Store};
use crate::template::VariableStore;

/// One in-flight step's completed record, kept around so `ROLLBACK` can
/// walk completed steps in reverse with their original parameters.
struct CompletedStep {
    step_id: String,
    tool_id: String,
    resolved_params: Value,
    output: Value,
}

pub struct Orchestrator {
    tools: Arc<ToolRegistry>,
    mandates: Arc<MandateChainManager>,
    signer: Arc<dyn Signer>,
    store: Arc<dyn Store>,
    events: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    cancellations: StdMutex<HashMap<Uuid, CancellationToken>>,
    terminal: StdMutex<HashSet<Uuid>>,
}

impl Orchestrator {
    pub fn new(
        tools: Arc<ToolRegistry>,
        mandates: Arc<MandateChainManager>,
        signer: Arc<dyn Signer>,
        store: Arc<dyn Store>,
        events: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            tools,
            mandates,
            signer,
            store,
            events,
            clock,
            config,
            cancellations: StdMutex::new(HashMap::new()),
            terminal: StdMutex::new(HashSet::new()),
        }
    }

    pub async fn execute(
        &self,
        agent_id: &str,
        workflow: &Workflow,
        context: ExecutionContext,
        initial_variables: Value,
    ) -> Result<Execution, OrchestratorError> {
        let report = engine::validate_with_lookup(workflow, self.tools.as_ref());
        if !report.ok {
            return Err(OrchestratorError::Validation(
                report.errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>().join("; "),
            ));
        }

        let ordered = engine::order(workflow)
            .map_err(|e| OrchestratorError::Validation(e.to_string()))?;

        let execution_id = Uuid::new_v4();
        let started_at = self.clock.now();

        for expired in self.mandates.expire_due(started_at) {
            tracing::warn!(mandate_id = %expired.mandate_id, chain_id = %expired.chain_id, kind = ?expired.kind, "mandate expired before use");
        }

        let cancellation = CancellationToken::new();
        self.cancellations.lock().unwrap().insert(execution_id, cancellation.clone());

        let workflow_variables = Value::Object(workflow.variables.clone());
        let mut variables = VariableStore::seed(&workflow_variables, &context.input, &initial_variables);

        let mut execution = Execution {
            execution_id,
            agent_id: agent_id.to_string(),
            tenant_id: context.tenant_id.clone(),
            started_at,
            ended_at: None,
            status: ExecutionStatus::Running,
            context: context.input.clone(),
            variables: HashMap::new(),
            step_results: Vec::new(),
            mandate_chain_id: None,
            metrics: None,
            failure_reason: None,
        };

        self.store.save_execution(&execution).await?;
        self.events.publish(EventKind::ExecutionStarted, agent_id, execution_id, Value::Null).await?;

        let max_execution_deadline = context
            .constraints
            .max_execution_time_ms
            .map(|ms| started_at + chrono::Duration::milliseconds(ms as i64));

        let mut completed: Vec<CompletedStep> = Vec::new();
        let mut visit_counts: HashMap<String, u32> = HashMap::new();
        let loop_bound = if workflow.loop_bound > 0 { workflow.loop_bound } else { self.config.default_loop_bound };

        let mut current_step_id = Some(workflow.trigger_step().map(|s| s.id.clone()).ok_or_else(|| {
            OrchestratorError::Validation("workflow has no TRIGGER step".to_string())
        })?);

        let mut metrics = Metrics::default();
        let mut terminal_error: Option<OrchestratorError> = None;

        'traversal: while let Some(step_id) = current_step_id.take() {
            if cancellation.is_cancelled() {
                self.mark_remaining_skipped(&mut execution, &ordered.sequence, &step_id).await?;
                execution.status = ExecutionStatus::Cancelled;
                break 'traversal;
            }

            if let Some(deadline) = max_execution_deadline {
                if self.clock.now() > deadline {
                    terminal_error = Some(OrchestratorError::ExecutionDeadlineExceeded);
                    break 'traversal;
                }
            }

            let visits = visit_counts.entry(step_id.clone()).or_insert(0);
            *visits += 1;
            if *visits > loop_bound {
                terminal_error = Some(OrchestratorError::Validation(format!(
                    "step '{step_id}' exceeded loop bound of {loop_bound}"
                )));
                break 'traversal;
            }

            let step = workflow.step(&step_id).ok_or_else(|| OrchestratorError::Validation(format!("unknown step '{step_id}'")))?;
            metrics.total_steps += 1;

            let (resolved_params, warnings) = variables.resolve(&step.parameters);
            for warning in warnings {
                self.audit(execution_id, "template:unresolved", &warning).await;
            }

            let validation = self.tools.validate_parameters(&step.tool_id, &resolved_params).map_err(|e| OrchestratorError::ToolNotFound(e.to_string()))?;

            self.publish_step(agent_id, execution_id, &step_id, StepStatus::Running, 1, None, None).await?;

            let mut payment_mandate_id = None;

            let outcome = if !validation.ok {
                Err(OrchestratorError::ToolExecution { step_id: step_id.clone(), message: validation.errors.join("; ") })
            } else if let Err(violation) = self.check_constraints(&execution, &context, step, &metrics) {
                Err(violation)
            } else {
                payment_mandate_id = self.ensure_payment_mandate(&mut execution, step, &resolved_params).await?;
                self.run_with_policy(execution_id, &context, step, &resolved_params, &cancellation, &mut metrics).await
            };

            match outcome {
                Ok((output, attempts)) => {
                    variables.set_step_output(&step_id, output.clone());
                    let result = StepResult {
                        step_id: step_id.clone(),
                        status: StepStatus::Completed,
                        started_at: self.clock.now(),
                        ended_at: Some(self.clock.now()),
                        attempts,
                        output: Some(output.clone()),
                        error: None,
                    };
                    execution.step_results.push(result.clone());
                    self.store.update_execution(execution_id, ExecutionPatch { append_step_result: Some(result), ..Default::default() }).await?;
                    self.publish_step(agent_id, execution_id, &step_id, StepStatus::Completed, attempts, Some(output.clone()), None).await?;
                    metrics.completed_steps += 1;

                    if let Some(mandate_id) = payment_mandate_id {
                        if let Ok(executed) = self.mandates.mark_executed(&mandate_id).await {
                            self.audit(execution_id, "mandate:executed", &executed.mandate_id).await;
                        }
                    }

                    if step.kind == StepKind::Approval {
                        if let Err(e) = self.record_approval(&mut execution, step).await {
                            tracing::warn!(%execution_id, error = %e, "failed to record approval mandate");
                        }
                    }

                    completed.push(CompletedStep {
                        step_id: step_id.clone(),
                        tool_id: step.tool_id.clone(),
                        resolved_params: resolved_params.clone(),
                        output,
                    });

                    current_step_id = self.next_step(step, &variables, true)?;
                }
                Err(err) => {
                    metrics.failed_steps += 1;
                    let attempts = match &err {
                        OrchestratorError::ToolExecution { .. } | OrchestratorError::Timeout { .. } => 1,
                        _ => 0,
                    };
                    let result = StepResult {
                        step_id: step_id.clone(),
                        status: StepStatus::Failed,
                        started_at: self.clock.now(),
                        ended_at: Some(self.clock.now()),
                        attempts,
                        output: None,
                        error: Some(err.to_string()),
                    };
                    execution.step_results.push(result.clone());
                    self.store.update_execution(execution_id, ExecutionPatch { append_step_result: Some(result), ..Default::default() }).await?;
                    self.publish_step(agent_id, execution_id, &step_id, StepStatus::Failed, attempts, None, Some(err.to_string())).await?;

                    match step.error_policy {
                        ErrorPolicy::Stop => {
                            terminal_error = Some(err);
                            break 'traversal;
                        }
                        ErrorPolicy::Continue => {
                            current_step_id = self.next_step(step, &variables, false)?;
                        }
                        ErrorPolicy::Retry { .. } => {
                            terminal_error = Some(err);
                            break 'traversal;
                        }
                        ErrorPolicy::Rollback => {
                            self.rollback(&context, execution_id, &completed, &execution.mandate_chain_id.clone()).await;
                            terminal_error = Some(err);
                            break 'traversal;
                        }
                    }
                }
            }
        }

        execution.ended_at = Some(self.clock.now());
        metrics.duration_ms = (execution.ended_at.unwrap() - execution.started_at).num_milliseconds().max(0) as u64;
        execution.metrics = Some(metrics);

        if execution.status == ExecutionStatus::Cancelled {
            self.events.publish(EventKind::ExecutionCancelled, agent_id, execution_id, Value::Null).await?;
        } else if let Some(err) = terminal_error {
            execution.status = ExecutionStatus::Failed;
            let attempts = execution.step_results.last().map(|r| r.attempts);
            execution.failure_reason = Some(err.into_failure_reason(attempts));
            self.events.publish(EventKind::ExecutionFailed, agent_id, execution_id, Value::Null).await?;
        } else {
            execution.status = ExecutionStatus::Completed;
            self.events.publish(EventKind::ExecutionCompleted, agent_id, execution_id, Value::Null).await?;
        }

        self.store
            .update_execution(
                execution_id,
                ExecutionPatch {
                    status: Some(execution.status),
                    ended_at: execution.ended_at,
                    metrics: execution.metrics.clone(),
                    failure_reason: execution.failure_reason.clone(),
                    variables: Some(variables.as_value()),
                    ..Default::default()
                },
            )
            .await?;
        execution.variables = variables.as_value().as_object().cloned().unwrap_or_default().into_iter().collect();

        self.cancellations.lock().unwrap().remove(&execution_id);
        self.terminal.lock().unwrap().insert(execution_id);
        Ok(execution)
    }

    pub fn cancel(&self, execution_id: Uuid) -> Result<(), OrchestratorError> {
        if let Some(token) = self.cancellations.lock().unwrap().get(&execution_id).cloned() {
            token.cancel();
            return Ok(());
        }
        if self.terminal.lock().unwrap().contains(&execution_id) {
            return Err(OrchestratorError::AlreadyTerminal(execution_id.to_string()));
        }
        Err(OrchestratorError::ExecutionNotFound(execution_id.to_string()))
    }

    async fn run_with_policy(
        &self,
        execution_id: Uuid,
        context: &ExecutionContext,
        step: &Step,
        resolved_params: &Value,
        cancellation: &CancellationToken,
        metrics: &mut Metrics,
    ) -> Result<(Value, u32), OrchestratorError> {
        let max_attempts = match step.error_policy {
            ErrorPolicy::Retry { max_attempts } => max_attempts,
            _ => 1,
        };

        let mut last_err = None;
        for attempt in 1..=max_attempts.max(1) {
            match self.invoke_once(execution_id, context, step, resolved_params, cancellation).await {
                Ok(output) => {
                    if let Some(cost) = output.get("cost").and_then(|v| v.as_f64()) {
                        metrics.cost_accumulated += cost;
                    }
                    return Ok((output, attempt));
                }
                Err(err) => {
                    last_err = Some(err);
                    if attempt < max_attempts.max(1) {
                        let mut rng = OsRng;
                        tokio::time::sleep(compute_delay(&self.config, attempt, &mut rng)).await;
                    }
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }

    async fn invoke_once(
        &self,
        execution_id: Uuid,
        context: &ExecutionContext,
        step: &Step,
        resolved_params: &Value,
        cancellation: &CancellationToken,
    ) -> Result<Value, OrchestratorError> {
        let tool = self.tools.get(&step.tool_id).map_err(|e| OrchestratorError::ToolNotFound(e.to_string()))?;
        let deadline = self.clock.now() + chrono::Duration::milliseconds(step.timeout_ms as i64);
        let run_ctx = RunContext {
            execution_id,
            tenant_id: context.tenant_id.clone(),
            user_id: context.user_id.clone(),
            step_id: step.id.clone(),
            deadline,
            cancellation: cancellation.clone(),
        };

        let call = tool.execute(resolved_params.clone(), &run_ctx);
        match tokio::time::timeout(Duration::from_millis(step.timeout_ms), call).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(tool_err)) => Err(OrchestratorError::ToolExecution { step_id: step.id.clone(), message: tool_err.to_string() }),
            Err(_elapsed) => Err(OrchestratorError::Timeout { step_id: step.id.clone(), timeout_ms: step.timeout_ms }),
        }
    }

    fn next_step(&self, step: &Step, variables: &VariableStore, succeeded: bool) -> Result<Option<String>, OrchestratorError> {
        if step.kind == StepKind::Condition {
            for edge in &step.successors.conditional {
                if condition::evaluate(variables, &edge.expression)? {
                    return Ok(Some(edge.target.clone()));
                }
            }
            return Ok(None);
        }

        if succeeded {
            Ok(step.successors.on_success.clone())
        } else {
            Ok(step.successors.on_failure.clone().or_else(|| step.successors.on_success.clone()))
        }
    }

    async fn mark_remaining_skipped(&self, execution: &mut Execution, sequence: &[String], from_step: &str) -> Result<(), OrchestratorError> {
        let start = sequence.iter().position(|s| s == from_step).unwrap_or(0);
        for step_id in &sequence[start..] {
            let result = StepResult {
                step_id: step_id.clone(),
                status: StepStatus::Skipped,
                started_at: self.clock.now(),
                ended_at: Some(self.clock.now()),
                attempts: 0,
                output: None,
                error: None,
            };
            execution.step_results.push(result.clone());
            self.store.update_execution(execution.execution_id, ExecutionPatch { append_step_result: Some(result), ..Default::default() }).await?;
        }
        Ok(())
    }

    async fn rollback(&self, context: &ExecutionContext, execution_id: Uuid, completed: &[CompletedStep], chain_id: &Option<String>) {
        for step in completed.iter().rev() {
            let Ok(tool) = self.tools.get(&step.tool_id) else { continue };
            let cancellation = CancellationToken::new();
            let run_ctx = RunContext {
                execution_id,
                tenant_id: context.tenant_id.clone(),
                user_id: context.user_id.clone(),
                step_id: step.step_id.clone(),
                deadline: self.clock.now() + chrono::Duration::milliseconds(self.config.rollback_deadline_ms as i64),
                cancellation,
            };

            let result = tokio::time::timeout(
                Duration::from_millis(self.config.rollback_deadline_ms),
                tool.rollback(step.resolved_params.clone(), step.output.clone(), &run_ctx),
            )
            .await;

            match result {
                Ok(Ok(())) => {
                    self.audit(execution_id, "rollback:ok", &format!("rolled back step '{}'", step.step_id)).await;
                }
                Ok(Err(e)) => {
                    self.audit(execution_id, "rollback:failed", &format!("step '{}': {e}", step.step_id)).await;
                }
                Err(_) => {
                    self.audit(execution_id, "rollback:timeout", &format!("step '{}' rollback deadline exceeded", step.step_id)).await;
                }
            }

            if step.tool_id.starts_with("payment_") {
                if let Some(chain_id) = chain_id {
                    if let Ok(cancellation_mandate) = self
                        .mandates
                        .create(MandateKind::Cancellation, step.output.clone(), Some(chain_id.clone()), self.signer.as_ref())
                        .await
                    {
                        if let Err(e) = self.store.append_mandate(&cancellation_mandate).await {
                            tracing::warn!(%execution_id, error = %e, "failed to persist cancellation mandate");
                        }
                        self.audit(execution_id, "mandate:cancellation", &cancellation_mandate.mandate_id).await;
                    }
                }
            }
        }
    }

    /// Tenant-level constraint predicates (spec §1/§3): budget, geo, and
    /// payment approval. Checked immediately before a step would dispatch,
    /// so a rejection is recorded and policy-handled exactly like any other
    /// step failure rather than aborting the whole execution outright.
    fn check_constraints(
        &self,
        execution: &Execution,
        context: &ExecutionContext,
        step: &Step,
        metrics: &Metrics,
    ) -> Result<(), OrchestratorError> {
        let constraints = &context.constraints;

        if let Some(ceiling) = constraints.budget_ceiling {
            if metrics.cost_accumulated > ceiling {
                return Err(OrchestratorError::ConstraintViolation(format!(
                    "step '{}' rejected: accumulated cost {:.2} exceeds budget ceiling {:.2}",
                    step.id, metrics.cost_accumulated, ceiling
                )));
            }
        }

        if let Some(allowed) = &constraints.allowed_geos {
            if !allowed.is_empty() {
                if let Some(geo) = context.input.get("geo").and_then(|v| v.as_str()) {
                    if !allowed.iter().any(|g| g == geo) {
                        return Err(OrchestratorError::ConstraintViolation(format!(
                            "step '{}' rejected: geo '{geo}' is not in the allowed list {allowed:?}",
                            step.id
                        )));
                    }
                }
            }
        }

        if constraints.require_approval && step.tool_id.starts_with("payment_") {
            let approved = execution
                .mandate_chain_id
                .as_deref()
                .map(|chain_id| {
                    self.mandates
                        .chain(chain_id)
                        .iter()
                        .any(|m| m.kind == MandateKind::Approval && m.status == MandateStatus::Approved)
                })
                .unwrap_or(false);
            if !approved {
                return Err(OrchestratorError::ConstraintViolation(format!(
                    "step '{}' rejected: payment requires an approved APPROVAL mandate first",
                    step.id
                )));
            }
        }

        Ok(())
    }

    /// Record an APPROVAL mandate on the execution's chain once an APPROVAL
    /// step completes, opening the chain if this is its first mandate.
    async fn record_approval(&self, execution: &mut Execution, step: &Step) -> Result<(), OrchestratorError> {
        let chain_id = if execution.mandate_chain_id.is_none() {
            let intent = self
                .mandates
                .create(MandateKind::Intent, step.parameters.clone(), None, self.signer.as_ref())
                .await
                .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
            self.store.append_mandate(&intent).await?;
            execution.mandate_chain_id = Some(intent.chain_id.clone());
            intent.chain_id
        } else {
            execution.mandate_chain_id.clone().unwrap()
        };

        let approval = self
            .mandates
            .create(MandateKind::Approval, step.parameters.clone(), Some(chain_id), self.signer.as_ref())
            .await
            .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
        self.store.append_mandate(&approval).await?;

        let approved = self
            .mandates
            .approve(&approval.mandate_id, "workflow")
            .await
            .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
        self.audit(execution.execution_id, "mandate:approved", &approved.mandate_id).await;
        Ok(())
    }

    /// Payment-class steps open (or extend) a mandate chain before they run
    /// (spec §2): an INTENT mandate the first time a chain is needed, then a
    /// PAYMENT mandate for this specific step. Returns the PAYMENT mandate's
    /// id so the caller can mark it EXECUTED once the tool call succeeds.
    async fn ensure_payment_mandate(&self, execution: &mut Execution, step: &Step, resolved_params: &Value) -> Result<Option<String>, OrchestratorError> {
        if !step.tool_id.starts_with("payment_") {
            return Ok(None);
        }

        let chain_id = if execution.mandate_chain_id.is_none() {
            let intent = self
                .mandates
                .create(MandateKind::Intent, resolved_params.clone(), None, self.signer.as_ref())
                .await
                .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
            self.store.append_mandate(&intent).await?;
            execution.mandate_chain_id = Some(intent.chain_id.clone());
            intent.chain_id
        } else {
            execution.mandate_chain_id.clone().unwrap()
        };

        let payment = self
            .mandates
            .create(MandateKind::Payment, resolved_params.clone(), Some(chain_id), self.signer.as_ref())
            .await
            .map_err(|e| OrchestratorError::Mandate(e.to_string()))?;
        self.store.append_mandate(&payment).await?;

        Ok(Some(payment.mandate_id))
    }

    async fn publish_step(
        &self,
        agent_id: &str,
        execution_id: Uuid,
        step_id: &str,
        status: StepStatus,
        attempts: u32,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let payload = serde_json::json!({
            "executionId": execution_id,
            "stepId": step_id,
            "status": status,
            "attempts": attempts,
            "output": output,
            "error": error,
            "ts": self.clock.now(),
        });
        self.events.publish(EventKind::StepUpdate, agent_id, execution_id, payload).await
    }

    async fn audit(&self, execution_id: Uuid, kind: &str, message: &str) {
        let entry = AuditEntry::new(execution_id, kind, message, self.clock.now());
        if let Err(e) = self.store.append_audit(&entry).await {
            tracing::warn!(%execution_id, error = %e, "failed to append audit entry");
        }
    }
}

