//! `ToolRegistry` — a typed dispatch table mapping tool identifiers to
//! executable tool objects (spec §4.2).
//!
//! Read-mostly shared state (spec §5): registration is expected at startup
//! and is serialized behind `&mut self`; concurrent `get`/`validate_parameters`
//! are safe because they only ever read the underlying map once built
//! (callers typically wrap the finished registry in an `Arc`).

use std::collections::HashMap;
use std::sync::Arc;

use engine::ToolIdempotencyLookup;
use serde_json::Value;

use crate::error::RegistryError;
use crate::traits::{ParamValidation, Tool, ToolMeta};

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    insertion_order: Vec<String>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new(), insertion_order: Vec::new() }
    }

    /// Register a tool. Rejects a duplicate `toolId` with `ToolConflict`
    /// rather than silently overwriting it (spec §4.2).
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let id = tool.meta().id.clone();
        if self.tools.contains_key(&id) {
            return Err(RegistryError::ToolConflict(id));
        }
        tracing::debug!(tool_id = %id, "registered tool");
        self.insertion_order.push(id.clone());
        self.tools.insert(id, tool);
        Ok(())
    }

    pub fn get(&self, tool_id: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .get(tool_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(tool_id.to_string()))
    }

    pub fn validate_parameters(
        &self,
        tool_id: &str,
        params: &Value,
    ) -> Result<ParamValidation, RegistryError> {
        let tool = self.get(tool_id)?;
        Ok(tool.meta().validate_parameters(params))
    }

    /// Discovery: stable by insertion order (spec §4.2).
    pub fn list(&self) -> Vec<&ToolMeta> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.tools.get(id).map(|t| t.meta()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolIdempotencyLookup for ToolRegistry {
    fn is_idempotent(&self, tool_id: &str) -> Option<bool> {
        self.tools.get(tool_id).map(|t| t.meta().idempotent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTool;
    use serde_json::json;

    #[test]
    fn register_rejects_duplicate_id() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(MockTool::returning("dup", json!({})))).unwrap();
        let err = reg.register(Arc::new(MockTool::returning("dup", json!({})))).unwrap_err();
        assert_eq!(err, RegistryError::ToolConflict("dup".into()));
    }

    #[test]
    fn get_missing_tool_errors() {
        let reg = ToolRegistry::new();
        assert_eq!(reg.get("ghost").unwrap_err(), RegistryError::NotFound("ghost".into()));
    }

    #[test]
    fn list_is_stable_by_insertion_order() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(MockTool::returning("b", json!({})))).unwrap();
        reg.register(Arc::new(MockTool::returning("a", json!({})))).unwrap();
        let ids: Vec<&str> = reg.list().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
