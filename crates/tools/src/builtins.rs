//! Built-in tool taxonomy (spec §4.2). Each tool is a small, deterministic
//! stand-in for the real side-effecting integration a production deployment
//! would wire in (a real HTTP client, a real payment provider SDK, …) — the
//! core engine only needs the dispatch contract, schema, and idempotency
//! flag to be right; concrete I/O is an external collaborator per spec §1.

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ToolError;
use crate::traits::{ParamSchemaEntry, ParamType, RunContext, Tool, ToolMeta};

fn get_str<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

fn get_f64(params: &Value, name: &str) -> Option<f64> {
    params.get(name).and_then(|v| v.as_f64())
}

macro_rules! passthrough_tool {
    ($struct_name:ident, $id:literal) => {
        pub struct $struct_name;

        #[async_trait]
        impl Tool for $struct_name {
            fn meta(&self) -> &ToolMeta {
                static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
                META.get_or_init(|| ToolMeta {
                    id: $id.to_string(),
                    param_schema: Vec::new(),
                    idempotent: true,
                    supports_rollback: false,
                })
            }

            async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
                Ok(params)
            }
        }
    };
}

passthrough_tool!(ManualTrigger, "manual_trigger");
passthrough_tool!(WebhookTrigger, "webhook_trigger");
passthrough_tool!(ScheduleTrigger, "schedule_trigger");
passthrough_tool!(LoopCounter, "loop_counter");

pub struct HttpRequest;

#[async_trait]
impl Tool for HttpRequest {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "http_request".to_string(),
            param_schema: vec![
                ParamSchemaEntry::required("url", ParamType::String),
                ParamSchemaEntry::optional("method", ParamType::String, json!("GET"))
                    .with_allowed_values(vec![
                        json!("GET"),
                        json!("POST"),
                        json!("PUT"),
                        json!("PATCH"),
                        json!("DELETE"),
                    ]),
                ParamSchemaEntry::optional("body", ParamType::Any, Value::Null),
            ],
            idempotent: false,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let url = get_str(&params, "url")
            .ok_or_else(|| ToolError::failed("http_request", "missing 'url'"))?;
        let method = get_str(&params, "method").unwrap_or("GET");
        Ok(json!({ "status": 200, "url": url, "method": method }))
    }
}

pub struct DatabaseQuery;

#[async_trait]
impl Tool for DatabaseQuery {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "database_query".to_string(),
            param_schema: vec![
                ParamSchemaEntry::required("query", ParamType::String),
                ParamSchemaEntry::optional("params", ParamType::Array, json!([])),
            ],
            idempotent: true,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let _query = get_str(&params, "query")
            .ok_or_else(|| ToolError::failed("database_query", "missing 'query'"))?;
        Ok(json!({ "rows": [], "rowCount": 0 }))
    }
}

macro_rules! payment_tool {
    ($struct_name:ident, $id:literal) => {
        pub struct $struct_name;

        #[async_trait]
        impl Tool for $struct_name {
            fn meta(&self) -> &ToolMeta {
                static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
                META.get_or_init(|| ToolMeta {
                    id: $id.to_string(),
                    param_schema: vec![
                        ParamSchemaEntry::required("amount", ParamType::Number),
                        ParamSchemaEntry::optional("currency", ParamType::String, json!("usd")),
                    ],
                    idempotent: false,
                    supports_rollback: true,
                })
            }

            async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
                let amount = get_f64(&params, "amount")
                    .ok_or_else(|| ToolError::failed($id, "missing 'amount'"))?;
                if amount <= 0.0 {
                    return Err(ToolError::failed($id, "amount must be positive"));
                }
                let currency = get_str(&params, "currency").unwrap_or("usd");
                Ok(json!({
                    "paymentId": Uuid::new_v4().to_string(),
                    "status": "succeeded",
                    "amount": amount,
                    "currency": currency,
                }))
            }

            async fn rollback(
                &self,
                _params: Value,
                output: Value,
                _ctx: &RunContext,
            ) -> Result<(), ToolError> {
                if output.get("paymentId").and_then(|v| v.as_str()).is_none() {
                    return Err(ToolError::RollbackFailed {
                        tool_id: $id.to_string(),
                        message: "rollback target has no paymentId".into(),
                    });
                }
                Ok(())
            }
        }
    };
}

payment_tool!(PaymentStripe, "payment_stripe");
payment_tool!(PaymentCoinbase, "payment_coinbase");
payment_tool!(PaymentBank, "payment_bank");

pub struct Refund;

#[async_trait]
impl Tool for Refund {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "refund".to_string(),
            param_schema: vec![ParamSchemaEntry::required("paymentId", ParamType::String)],
            idempotent: false,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let payment_id = get_str(&params, "paymentId")
            .ok_or_else(|| ToolError::failed("refund", "missing 'paymentId'"))?;
        Ok(json!({
            "refundId": Uuid::new_v4().to_string(),
            "paymentId": payment_id,
            "status": "refunded",
        }))
    }
}

pub struct EmailSend;

#[async_trait]
impl Tool for EmailSend {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "email_send".to_string(),
            param_schema: vec![
                ParamSchemaEntry::required("to", ParamType::String),
                ParamSchemaEntry::optional("subject", ParamType::String, json!("")),
                ParamSchemaEntry::optional("body", ParamType::String, json!("")),
            ],
            idempotent: false,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let to = get_str(&params, "to").ok_or_else(|| ToolError::failed("email_send", "missing 'to'"))?;
        Ok(json!({
            "messageId": Uuid::new_v4().to_string(),
            "to": to,
            "status": "queued",
        }))
    }
}

pub struct ApprovalHuman;

#[async_trait]
impl Tool for ApprovalHuman {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "approval_human".to_string(),
            param_schema: vec![
                ParamSchemaEntry::optional("approverId", ParamType::String, Value::Null),
                ParamSchemaEntry::optional("message", ParamType::String, json!("")),
                ParamSchemaEntry::optional("autoApprove", ParamType::Boolean, json!(true)),
            ],
            idempotent: false,
            supports_rollback: true,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let auto_approve = params
            .get("autoApprove")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if !auto_approve {
            return Err(ToolError::failed("approval_human", "approval denied"));
        }
        Ok(json!({ "approved": true, "approverId": params.get("approverId") }))
    }

    async fn rollback(
        &self,
        _params: Value,
        _output: Value,
        _ctx: &RunContext,
    ) -> Result<(), ToolError> {
        Ok(())
    }
}

pub struct ApprovalBudget;

#[async_trait]
impl Tool for ApprovalBudget {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "approval_budget".to_string(),
            param_schema: vec![
                ParamSchemaEntry::required("amount", ParamType::Number),
                ParamSchemaEntry::required("limit", ParamType::Number),
            ],
            idempotent: true,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let amount = get_f64(&params, "amount")
            .ok_or_else(|| ToolError::failed("approval_budget", "missing 'amount'"))?;
        let limit = get_f64(&params, "limit")
            .ok_or_else(|| ToolError::failed("approval_budget", "missing 'limit'"))?;
        if amount > limit {
            return Err(ToolError::failed(
                "approval_budget",
                format!("amount {amount} exceeds limit {limit}"),
            ));
        }
        Ok(json!({ "approved": true, "remaining": limit - amount }))
    }
}

pub struct ConditionCompare;

#[async_trait]
impl Tool for ConditionCompare {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "condition_compare".to_string(),
            param_schema: vec![
                ParamSchemaEntry::required("left", ParamType::Any),
                ParamSchemaEntry::required("operator", ParamType::String).with_allowed_values(vec![
                    json!(">"),
                    json!("<"),
                    json!(">="),
                    json!("<="),
                    json!("=="),
                    json!("!="),
                ]),
                ParamSchemaEntry::required("right", ParamType::Any),
            ],
            idempotent: true,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, _ctx: &RunContext) -> Result<Value, ToolError> {
        let left = params.get("left").cloned().unwrap_or(Value::Null);
        let right = params.get("right").cloned().unwrap_or(Value::Null);
        let op = get_str(&params, "operator")
            .ok_or_else(|| ToolError::failed("condition_compare", "missing 'operator'"))?;
        let result = crate::compare::evaluate(&left, op, &right)
            .map_err(|e| ToolError::failed("condition_compare", e))?;
        Ok(json!({ "result": result }))
    }
}

pub struct Delay;

#[async_trait]
impl Tool for Delay {
    fn meta(&self) -> &ToolMeta {
        static META: std::sync::OnceLock<ToolMeta> = std::sync::OnceLock::new();
        META.get_or_init(|| ToolMeta {
            id: "delay".to_string(),
            param_schema: vec![ParamSchemaEntry::required("ms", ParamType::Number)],
            idempotent: true,
            supports_rollback: false,
        })
    }

    async fn execute(&self, params: Value, ctx: &RunContext) -> Result<Value, ToolError> {
        let ms = get_f64(&params, "ms").ok_or_else(|| ToolError::failed("delay", "missing 'ms'"))?;
        tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
        if ctx.cancellation.is_cancelled() {
            return Err(ToolError::failed("delay", "cancelled"));
        }
        Ok(json!({ "delayedMs": ms }))
    }
}

/// Register every built-in tool into a fresh registry.
pub fn register_all(registry: &mut crate::registry::ToolRegistry) {
    use std::sync::Arc;

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ManualTrigger),
        Arc::new(WebhookTrigger),
        Arc::new(ScheduleTrigger),
        Arc::new(HttpRequest),
        Arc::new(DatabaseQuery),
        Arc::new(PaymentStripe),
        Arc::new(PaymentCoinbase),
        Arc::new(PaymentBank),
        Arc::new(Refund),
        Arc::new(EmailSend),
        Arc::new(ApprovalHuman),
        Arc::new(ApprovalBudget),
        Arc::new(ConditionCompare),
        Arc::new(Delay),
        Arc::new(LoopCounter),
    ];

    for tool in tools {
        registry
            .register(tool)
            .expect("built-in tool ids must be unique");
    }
}
