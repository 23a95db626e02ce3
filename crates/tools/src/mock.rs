//! `MockTool` — a test double for `Tool`, adapted from the teacher's
//! `nodes::mock::MockNode`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::traits::{RunContext, Tool, ToolMeta};

pub enum MockBehaviour {
    ReturnValue(Value),
    Fail(String),
    /// Fails the first `n` calls, then succeeds with the given value.
    FailNTimes { remaining: Mutex<u32>, then: Value, message: String },
    /// Sleeps for the given duration before resolving successfully; used to
    /// exercise step timeouts in orchestrator tests.
    Sleep { duration: std::time::Duration, then: Value },
}

pub struct MockTool {
    meta: ToolMeta,
    behaviour: MockBehaviour,
    pub calls: Arc<Mutex<Vec<Value>>>,
    pub rollback_calls: Arc<Mutex<Vec<Value>>>,
}

impl MockTool {
    fn meta_for(id: &str, idempotent: bool, supports_rollback: bool) -> ToolMeta {
        ToolMeta {
            id: id.to_string(),
            param_schema: Vec::new(),
            idempotent,
            supports_rollback,
        }
    }

    pub fn returning(id: &str, value: Value) -> Self {
        Self {
            meta: Self::meta_for(id, true, false),
            behaviour: MockBehaviour::ReturnValue(value),
            calls: Arc::new(Mutex::new(Vec::new())),
            rollback_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn returning_with_rollback(id: &str, value: Value) -> Self {
        Self {
            meta: Self::meta_for(id, false, true),
            behaviour: MockBehaviour::ReturnValue(value),
            calls: Arc::new(Mutex::new(Vec::new())),
            rollback_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(id: &str, message: impl Into<String>) -> Self {
        Self {
            meta: Self::meta_for(id, true, false),
            behaviour: MockBehaviour::Fail(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
            rollback_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_n_times(id: &str, n: u32, message: impl Into<String>, then: Value) -> Self {
        Self {
            meta: Self::meta_for(id, true, false),
            behaviour: MockBehaviour::FailNTimes {
                remaining: Mutex::new(n),
                then,
                message: message.into(),
            },
            calls: Arc::new(Mutex::new(Vec::new())),
            rollback_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeping(id: &str, duration: std::time::Duration, then: Value) -> Self {
        Self {
            meta: Self::meta_for(id, true, false),
            behaviour: MockBehaviour::Sleep { duration, then },
            calls: Arc::new(Mutex::new(Vec::new())),
            rollback_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn rollback_count(&self) -> usize {
        self.rollback_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn meta(&self) -> &ToolMeta {
        &self.meta
    }

    async fn execute(&self, params: Value, ctx: &RunContext) -> Result<Value, ToolError> {
        self.calls.lock().unwrap().push(params.clone());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(merge_with_id(&self.meta.id, v)),
            MockBehaviour::Fail(msg) => Err(ToolError::failed(&self.meta.id, msg.clone())),
            MockBehaviour::FailNTimes { remaining, then, message } => {
                let mut r = remaining.lock().unwrap();
                if *r > 0 {
                    *r -= 1;
                    Err(ToolError::failed(&self.meta.id, message.clone()))
                } else {
                    Ok(merge_with_id(&self.meta.id, then))
                }
            }
            MockBehaviour::Sleep { duration, then } => {
                tokio::time::sleep(*duration).await;
                if ctx.cancellation.is_cancelled() {
                    return Err(ToolError::failed(&self.meta.id, "cancelled"));
                }
                Ok(merge_with_id(&self.meta.id, then))
            }
        }
    }

    async fn rollback(
        &self,
        _params: Value,
        output: Value,
        _ctx: &RunContext,
    ) -> Result<(), ToolError> {
        self.rollback_calls.lock().unwrap().push(output);
        Ok(())
    }
}

fn merge_with_id(id: &str, v: &Value) -> Value {
    let mut out = json!({ "tool": id });
    if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
        for (k, val) in v_obj {
            out_obj.insert(k.clone(), val.clone());
        }
    }
    out
}
