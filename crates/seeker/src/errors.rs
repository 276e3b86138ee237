use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures a tool reports back to the model instead of to the caller
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Failures that end the current turn
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Provider communication failed: {0}")]
    Provider(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Exceeded the maximum of {0} model rounds in a single turn")]
    MaxRoundsExceeded(usize),

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
