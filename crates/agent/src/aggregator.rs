//! Folds one request's events into an [`AggregationResult`].

use serde_json::Value;
use tracing::{debug, trace};
use turnwise_core::error::AggregationError;
use turnwise_core::provider::ServiceResponse;
use turnwise_core::stream::{AggregationResult, StreamEvent, StreamObserver, ToolInvocation};

/// Whether the caller should keep feeding events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
struct PendingCall {
    call_id: String,
    tool_name: String,
    args: String,
}

impl PendingCall {
    fn close(self, result: Option<String>) -> ToolInvocation {
        ToolInvocation {
            call_id: self.call_id,
            tool_name: self.tool_name,
            args: parse_args(&self.args),
            result,
        }
    }
}

/// Incremental reducer for a single request's event sequence.
///
/// Text is accumulated delta by delta, tool calls are tracked from start to
/// completion, and the first terminal event (`TurnCompleted` or
/// `StreamError`) ends processing. The observer sees every processed event
/// and nothing after the terminal one.
#[derive(Debug, Default)]
pub struct StreamAggregator {
    text: String,
    pending: Vec<PendingCall>,
    completed: Vec<ToolInvocation>,
    turn_id: Option<String>,
    failed: bool,
    terminated: bool,
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been processed.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Process one event.
    ///
    /// An `UnknownCallId` fault also terminates the aggregator; the event
    /// that caused it is not forwarded to the observer.
    pub fn apply(
        &mut self,
        event: StreamEvent,
        observer: &dyn StreamObserver,
    ) -> Result<Flow, AggregationError> {
        if self.terminated {
            trace!(event = event.event_type(), "Ignoring event after terminal event");
            return Ok(Flow::Stop);
        }

        let flow = match &event {
            StreamEvent::TextDelta { text } => {
                self.text.push_str(text);
                Flow::Continue
            }
            StreamEvent::ToolCallStarted { tool_name, call_id } => {
                if self.is_known(call_id) {
                    debug!(call_id = %call_id, "Duplicate tool call start, keeping the first");
                    return Ok(Flow::Continue);
                }
                self.pending.push(PendingCall {
                    call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                    args: String::new(),
                });
                Flow::Continue
            }
            StreamEvent::ToolCallArguments {
                call_id,
                partial_args,
            } => {
                let Some(call) = self.pending.iter_mut().find(|c| &c.call_id == call_id) else {
                    return Err(self.fault(call_id));
                };
                call.args.push_str(partial_args);
                Flow::Continue
            }
            StreamEvent::ToolCallCompleted { call_id, result } => {
                let Some(index) = self.pending.iter().position(|c| &c.call_id == call_id) else {
                    return Err(self.fault(call_id));
                };
                let call = self.pending.remove(index);
                self.completed.push(call.close(Some(result.clone())));
                Flow::Continue
            }
            StreamEvent::TurnCompleted { turn_id } => {
                self.turn_id = Some(turn_id.clone());
                self.terminated = true;
                Flow::Stop
            }
            StreamEvent::StreamError { message } => {
                debug!(error = %message, "Stream failed");
                self.failed = true;
                self.terminated = true;
                Flow::Stop
            }
        };

        observer.on_event(&event);
        Ok(flow)
    }

    /// Produce the result.
    ///
    /// Calls still open are appended unresolved, in opening order. A sequence
    /// that never reached a terminal event counts as failed.
    pub fn finish(self) -> AggregationResult {
        let mut tool_calls = self.completed;
        tool_calls.extend(self.pending.into_iter().map(|c| c.close(None)));

        AggregationResult {
            final_text: self.text,
            tool_calls,
            turn_id: self.turn_id,
            failed: self.failed || !self.terminated,
        }
    }

    /// Fold a complete event sequence.
    pub fn fold(
        events: impl IntoIterator<Item = StreamEvent>,
        observer: &dyn StreamObserver,
    ) -> Result<AggregationResult, AggregationError> {
        let mut aggregator = Self::new();
        for event in events {
            if aggregator.apply(event, observer)? == Flow::Stop {
                break;
            }
        }
        Ok(aggregator.finish())
    }

    /// The synthetic event list for a non-streamed response.
    pub fn from_response(response: ServiceResponse) -> Vec<StreamEvent> {
        if let Some(message) = response.error {
            return vec![StreamEvent::StreamError { message }];
        }

        let mut events = Vec::with_capacity(response.tool_calls.len() * 3 + 2);
        for call in response.tool_calls {
            events.push(StreamEvent::ToolCallStarted {
                tool_name: call.name,
                call_id: call.call_id.clone(),
            });
            if !call.arguments.is_empty() {
                events.push(StreamEvent::ToolCallArguments {
                    call_id: call.call_id.clone(),
                    partial_args: call.arguments,
                });
            }
            if let Some(result) = call.result {
                events.push(StreamEvent::ToolCallCompleted {
                    call_id: call.call_id,
                    result,
                });
            }
        }
        if !response.text.is_empty() {
            events.push(StreamEvent::TextDelta {
                text: response.text,
            });
        }
        events.push(StreamEvent::TurnCompleted {
            turn_id: response.turn_id,
        });
        events
    }

    fn fault(&mut self, call_id: &str) -> AggregationError {
        self.failed = true;
        self.terminated = true;
        AggregationError::UnknownCallId(call_id.to_string())
    }

    fn is_known(&self, call_id: &str) -> bool {
        self.pending.iter().any(|c| c.call_id == call_id)
            || self.completed.iter().any(|c| c.call_id == call_id)
    }
}

/// Concatenated argument fragments as JSON; raw text if they don't parse.
fn parse_args(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
