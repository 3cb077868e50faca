//! Error types for the turnwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is the
//! top-level type returned from a turn.

use thiserror::Error;

/// The top-level error type for all turnwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool registry ---
    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Stream aggregation ---
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    // --- Orchestration guards ---
    #[error("Tool loop exceeded {max_rounds} continuation rounds")]
    ToolLoopExceeded { max_rounds: u32 },

    #[error("A turn is already in flight for this conversation")]
    ConcurrentTurn,

    #[error("Turn cancelled")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Local I/O error: {0}")]
    Io(String),
}

/// Faults raised by a local tool handler.
///
/// Everything except [`ToolError::Fatal`] is recoverable: the orchestrator
/// feeds the message back to the service as the tool's output.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Non-recoverable tool fault: {0}")]
    Fatal(String),
}

impl ToolError {
    /// Whether the fault may be reported to the model as text.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Tool {0} is executed by the service, not locally")]
    NotLocal(String),

    #[error("Tool {tool_name} failed: {cause}")]
    ToolExecution {
        tool_name: String,
        #[source]
        cause: ToolError,
    },
}

#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    #[error("Event references unopened tool call: {0}")]
    UnknownCallId(String),
}
