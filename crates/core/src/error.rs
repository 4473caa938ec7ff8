//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum, folded into [`Error`].

use thiserror::Error;

use crate::context::RunId;

/// The top-level error type for agent runs.
///
/// Only failures that abort a run surface here. Tool failures are folded
/// into the conversation by the dispatcher and never reach the caller.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model execution port ---
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    // --- Protocol violations ---
    #[error("Run {run_id} produced no messages: the executor returned an empty response")]
    EmptyRun { run_id: RunId },

    #[error("Run {run_id} received a tool call message with no calls")]
    EmptyToolCall { run_id: RunId },

    // --- Transform pipeline ---
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by a [`ChatExecutor`](crate::executor::ChatExecutor).
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Executor not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters for tool {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("{reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Shorthand for a handler failure.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransformError {
    #[error("Transform '{transform}' failed: {reason}")]
    Failed { transform: String, reason: String },
}
