//! The `Tool` trait — the contract every registered tool must fulfil
//! (spec §4.2/§6), and the shared runtime context tools receive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ToolError;

/// Cooperative cancellation signal visible to a running tool invocation.
/// Flipped by `Orchestrator::cancel`; tools that perform long-running or
/// chunked work should poll `is_cancelled()` and return early.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Shared context passed to every tool invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub execution_id: Uuid,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub step_id: String,
    /// Deadline derived from the step's timeout (spec §4.2), already
    /// clamped to the execution's overall deadline if any (spec §5).
    pub deadline: DateTime<Utc>,
    pub cancellation: CancellationToken,
}

/// Parameter type used for light schema validation in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

/// One declared parameter in a tool's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSchemaEntry {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    /// When set, the resolved value must be one of these (enum membership,
    /// spec §4.2).
    pub allowed_values: Option<Vec<Value>>,
}

impl ParamSchemaEntry {
    pub fn required(name: &str, param_type: ParamType) -> Self {
        Self { name: name.into(), param_type, required: true, default: None, allowed_values: None }
    }

    pub fn optional(name: &str, param_type: ParamType, default: Value) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default),
            allowed_values: None,
        }
    }

    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            Some(v) => v,
            None if self.required => {
                return Err(format!("missing required parameter '{}'", self.name))
            }
            None => return Ok(()),
        };
        if !self.param_type.matches(value) {
            return Err(format!(
                "parameter '{}' expected type {:?}, got {}",
                self.name, self.param_type, value
            ));
        }
        if let Some(allowed) = &self.allowed_values {
            if !allowed.contains(value) {
                return Err(format!(
                    "parameter '{}' value {} is not one of the allowed values",
                    self.name, value
                ));
            }
        }
        Ok(())
    }
}

/// Declarative metadata a tool exposes to the registry (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMeta {
    pub id: String,
    pub param_schema: Vec<ParamSchemaEntry>,
    pub idempotent: bool,
    pub supports_rollback: bool,
}

/// Outcome of `ToolRegistry::validate_parameters`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValidation {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ToolMeta {
    pub fn validate_parameters(&self, params: &Value) -> ParamValidation {
        let obj = params.as_object();
        let mut errors = Vec::new();
        for entry in &self.param_schema {
            let value = obj.and_then(|o| o.get(&entry.name));
            if let Err(e) = entry.check(value) {
                errors.push(e);
            }
        }
        ParamValidation { ok: errors.is_empty(), errors }
    }
}

/// The core tool contract. Every built-in and plugin tool must implement
/// this. `execute` is mandatory; `rollback` defaults to a no-op compensating
/// action, per spec §4.2 ("absence is treated as a no-op rollback").
#[async_trait]
pub trait Tool: Send + Sync {
    fn meta(&self) -> &ToolMeta;

    async fn execute(&self, params: Value, ctx: &RunContext) -> Result<Value, ToolError>;

    async fn rollback(
        &self,
        _params: Value,
        _output: Value,
        _ctx: &RunContext,
    ) -> Result<(), ToolError> {
        Ok(())
    }
}
