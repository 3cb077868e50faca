//! Incremental response events and their folded result.
//!
//! [`StreamEvent`] is a closed sum type: providers translate whatever the
//! wire carries into these six variants, and everything downstream matches
//! them exhaustively.

use serde::{Deserialize, Serialize};

/// Message of the `StreamError` reported when a stream closes early.
pub const PREMATURE_END: &str = "stream ended before the turn completed";

/// One incremental unit of a response.
///
/// For a single request: every `ToolCall*` event for a call id precedes
/// `TurnCompleted`; `TurnCompleted` is terminal and appears at most once;
/// nothing after `StreamError` is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial answer text.
    TextDelta { text: String },

    /// The service opened a tool call.
    ToolCallStarted { tool_name: String, call_id: String },

    /// A fragment of a tool call's JSON arguments.
    ToolCallArguments { call_id: String, partial_args: String },

    /// A tool call finished with the given output.
    ToolCallCompleted { call_id: String, result: String },

    /// The turn finished; `turn_id` chains the next request.
    TurnCompleted { turn_id: String },

    /// The service or transport failed mid-turn.
    StreamError { message: String },
}

impl StreamEvent {
    /// Short name for logs and progress output.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallArguments { .. } => "tool_call_arguments",
            Self::ToolCallCompleted { .. } => "tool_call_completed",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::StreamError { .. } => "stream_error",
        }
    }

    /// Whether no further events of the request are processed after this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TurnCompleted { .. } | Self::StreamError { .. })
    }
}

/// One tool call seen during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
    /// `None` while the service is waiting for the orchestrator to run it.
    pub result: Option<String>,
}

impl ToolInvocation {
    pub fn is_resolved(&self) -> bool {
        self.result.is_some()
    }
}

/// The immutable outcome of folding one request's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub final_text: String,
    /// Completed calls in completion order, then unresolved calls in
    /// opening order.
    pub tool_calls: Vec<ToolInvocation>,
    pub turn_id: Option<String>,
    pub failed: bool,
}

impl AggregationResult {
    /// A failed result with no content.
    pub fn failure() -> Self {
        Self {
            failed: true,
            ..Self::default()
        }
    }

    /// Calls the service left open for the orchestrator to resolve.
    pub fn unresolved_calls(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.tool_calls.iter().filter(|c| !c.is_resolved())
    }

    /// Whether the turn succeeded and can be chained to.
    pub fn succeeded(&self) -> bool {
        !self.failed && self.turn_id.is_some()
    }
}

/// Receives every processed event, for incremental presentation.
///
/// Observers only report; they cannot influence aggregation.
pub trait StreamObserver: Send + Sync {
    fn on_event(&self, event: &StreamEvent);
}

impl<F> StreamObserver for F
where
    F: Fn(&StreamEvent) + Send + Sync,
{
    fn on_event(&self, event: &StreamEvent) {
        self(event)
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {
    fn on_event(&self, _event: &StreamEvent) {}
}
