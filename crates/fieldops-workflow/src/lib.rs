//! # FieldOps Workflow
//!
//! Named multi-step business transitions ("accepted quote → job +
//! contract", "completed job → invoice") executed as best-effort sagas:
//! steps run strictly in order, already-executed steps are never undone,
//! and the caller always gets back a report of what was created — even
//! when a later step failed.

pub mod executor;
pub mod templates;

pub use executor::WorkflowEngine;
pub use templates::{CreatedEntity, EntityKind, WorkflowExecution, WorkflowTemplate};
