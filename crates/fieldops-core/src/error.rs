//! FieldOps error types.

use thiserror::Error;

/// Errors produced anywhere in the FieldOps stack.
#[derive(Debug, Error)]
pub enum FieldOpsError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Workflow error: {0}")]
    Workflow(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FieldOpsError>;
