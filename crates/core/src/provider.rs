//! Provider trait: the boundary to the hosted response service.
//!
//! A Provider submits a turn (or the outputs of locally executed tools) and
//! hands back either a stream of [`StreamEvent`]s or one complete response.
//! Providers do not retry; a retry is a fresh turn issued by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::stream::StreamEvent;
use crate::tool::ToolDeclaration;

/// Settings shared by a turn and all of its continuation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// System-level instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Declarations of every available tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// A new user turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub context: RequestContext,
    pub utterance: String,
    /// The last successful turn to chain to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_turn_id: Option<String>,
}

/// The output of one locally executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: String,
}

/// Continuation of a turn paused on local tool calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultRequest {
    pub context: RequestContext,
    pub outputs: Vec<ToolOutput>,
    /// The paused turn's id.
    pub previous_turn_id: String,
}

/// A tool call reported in a non-streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceToolCall {
    pub call_id: String,
    pub name: String,
    /// Arguments as a JSON string.
    pub arguments: String,
    /// Set when the service already executed the call itself.
    #[serde(default)]
    pub result: Option<String>,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub turn_id: String,
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ServiceToolCall>,
    /// Set when the service reports the turn as failed.
    #[serde(default)]
    pub error: Option<String>,
}

/// What a submission yields.
#[derive(Debug)]
pub enum ServiceReply {
    Stream(mpsc::Receiver<Result<StreamEvent, ProviderError>>),
    Complete(ServiceResponse),
}

/// The core Provider trait.
///
/// The orchestration loop calls `submit_turn` / `submit_tool_result` without
/// knowing which service sits behind them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Submit a user turn.
    async fn submit_turn(&self, request: TurnRequest) -> Result<ServiceReply, ProviderError>;

    /// Submit local tool outputs to resume a paused turn.
    async fn submit_tool_result(
        &self,
        request: ToolResultRequest,
    ) -> Result<ServiceReply, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}
