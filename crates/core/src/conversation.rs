//! Conversation continuity against a stateless service.
//!
//! The service keeps the actual history; locally we only need the id of the
//! last successful turn (to chain the next request) and a transcript of what
//! happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stream::{AggregationResult, ToolInvocation};

/// Unique identifier for a local conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded request/response exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub utterance: String,
    pub response_text: String,
    /// The service's id for this turn, if it got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
    pub failed: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-session conversation state.
///
/// Owned by exactly one session and mutated only after a turn finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: ConversationId,
    last_turn_id: Option<String>,
    transcript: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            last_turn_id: None,
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The id the next request should chain to.
    pub fn current_turn_reference(&self) -> Option<&str> {
        self.last_turn_id.as_deref()
    }

    /// Append a finished turn.
    ///
    /// Only a successful result moves `last_turn_id`; a failed attempt is
    /// kept in the transcript so a retry still chains to the last good turn.
    pub fn record_turn(&mut self, utterance: impl Into<String>, result: &AggregationResult) {
        if !result.failed {
            if let Some(turn_id) = &result.turn_id {
                self.last_turn_id = Some(turn_id.clone());
            }
        }
        self.updated_at = Utc::now();
        self.transcript.push(Turn {
            utterance: utterance.into(),
            response_text: result.final_text.clone(),
            turn_id: result.turn_id.clone(),
            tool_invocations: result.tool_calls.clone(),
            failed: result.failed,
            timestamp: self.updated_at,
        });
    }

    /// Start a fresh, unlinked conversation.
    pub fn reset(&mut self) {
        self.id = ConversationId::new();
        self.last_turn_id = None;
        self.transcript.clear();
        self.updated_at = Utc::now();
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
