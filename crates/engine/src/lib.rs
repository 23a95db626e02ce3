//! `engine` crate — the workflow domain model and the `WorkflowEngine`
//! (graph validation + topological ordering).
//!
//! This crate has no intra-workspace dependencies: it is the leaf of the
//! dependency order described in spec §2. It also hosts the `Clock` port,
//! since deadlines and TTL checks are needed by every downstream crate
//! (`tools`, `mandates`, `orchestrator`) and `engine` is the one dependency
//! all of them already share. `Signer` stays with `mandates`, the one
//! component whose contract actually defines it.

pub mod clock;
pub mod error;
pub mod models;
pub mod order;
pub mod template;
pub mod validate;

pub use clock::{Clock, SystemClock};
pub use error::EngineError;
pub use models::{
    ConditionalEdge, ErrorPolicy, Step, StepKind, Successors, TriggerKind, Workflow,
};
pub use order::{order, OrderedWorkflow};
pub use validate::{validate, validate_with_lookup, ToolIdempotencyLookup, ValidationIssue, ValidationReport};
