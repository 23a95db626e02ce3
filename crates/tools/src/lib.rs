//! Tool registry and built-in tool taxonomy (spec §4.2/§6).

pub mod builtins;
pub mod compare;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use error::{RegistryError, ToolError};
pub use registry::ToolRegistry;
pub use traits::{
    CancellationToken, ParamSchemaEntry, ParamType, ParamValidation, RunContext, Tool, ToolMeta,
};

impl ToolRegistry {
    /// Convenience constructor: a registry pre-populated with every built-in
    /// tool (spec §4.2's taxonomy).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }
}
