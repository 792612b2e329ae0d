//! # FieldOps Core
//!
//! Shared foundation for the FieldOps automation system: domain entity
//! types, notification model, configuration, and the crate-wide error type.

pub mod config;
pub mod error;
pub mod types;

pub use error::{FieldOpsError, Result};
