//! # turnwise core
//!
//! Domain types, traits, and error definitions for the turnwise
//! tool-orchestration loop. This crate has **no transport dependencies**:
//! it defines the model that the provider, tool, and agent crates implement
//! against.
//!
//! ## Pieces
//!
//! - [`tool`]: local and remote tool descriptors plus the [`ToolRegistry`]
//! - [`stream`]: the closed [`StreamEvent`] sum type and [`AggregationResult`]
//! - [`conversation`]: [`ConversationState`] and its append-only transcript
//! - [`provider`]: the [`Provider`] boundary to the hosted response service
//! - [`error`]: the error taxonomy shared by every crate

pub mod conversation;
pub mod error;
pub mod provider;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationId, ConversationState, Turn};
pub use error::{AggregationError, Error, ProviderError, RegistryError, Result, ToolError};
pub use provider::{
    Provider, RequestContext, ServiceReply, ServiceResponse, ServiceToolCall, ToolOutput,
    ToolResultRequest, TurnRequest,
};
pub use stream::{AggregationResult, NoopObserver, StreamEvent, StreamObserver, ToolInvocation};
pub use tool::{LocalTool, RemoteTool, Tool, ToolDeclaration, ToolKind, ToolRegistry};
