//! Gateway error types
//!
//! These cover everything that stops an invocation from being attempted.
//! Once a process has been spawned the outcome is reported through
//! `ExecutionStatus` instead.

use super::validator::ValidationError;

/// Errors raised before any process is spawned
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("input rejected: {0}")]
    ValidationRejected(#[from] ValidationError),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("failed to prepare scratch directory: {0}")]
    Scratch(#[source] std::io::Error),
}

impl GatewayError {
    /// Stable machine-readable tag for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::ValidationRejected(_) => "validation_rejected",
            GatewayError::UnknownTool(_) => "unknown_tool",
            GatewayError::Scratch(_) => "scratch_unavailable",
        }
    }
}
