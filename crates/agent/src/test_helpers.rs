//! Shared test helpers for loop and session tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, mpsc};
use turnwise_core::error::{ProviderError, ToolError};
use turnwise_core::provider::{
    Provider, ServiceReply, ServiceResponse, ToolResultRequest, TurnRequest,
};
use turnwise_core::stream::StreamEvent;
use turnwise_core::tool::{LocalTool, Tool, ToolRegistry};

/// One scripted reply, consumed per request.
pub enum Script {
    /// Stream these events, then close the channel.
    Events(Vec<StreamEvent>),
    /// Stream raw items, transport errors included.
    Items(Vec<Result<StreamEvent, ProviderError>>),
    /// Answer without streaming.
    Complete(ServiceResponse),
    /// Fail the submission itself.
    Fail(ProviderError),
    /// Stream these events, then keep the channel open forever.
    Hang(Vec<StreamEvent>),
    /// Wait for the notify before streaming.
    Gated(Arc<Notify>, Vec<StreamEvent>),
}

impl Script {
    pub fn events(events: Vec<StreamEvent>) -> Self {
        Self::Events(events)
    }
}

/// A provider that replays a queue of scripted replies.
///
/// Panics if more requests are made than scripts provided.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    turns: Mutex<Vec<TurnRequest>>,
    tool_results: Mutex<Vec<ToolResultRequest>>,
    call_count: AtomicUsize,
    // Senders for hanging streams stay alive here.
    held: Mutex<Vec<mpsc::Sender<Result<StreamEvent, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            turns: Mutex::new(Vec::new()),
            tool_results: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn turn_requests(&self) -> Vec<TurnRequest> {
        self.turns.lock().unwrap().clone()
    }

    pub fn tool_result_requests(&self) -> Vec<ToolResultRequest> {
        self.tool_results.lock().unwrap().clone()
    }

    async fn next_reply(&self) -> Result<ServiceReply, ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        let Some(script) = script else {
            panic!("ScriptedProvider: no more scripts (call #{n})");
        };

        match script {
            Script::Events(events) => Ok(ServiceReply::Stream(prefilled(
                events.into_iter().map(Ok).collect(),
            ))),
            Script::Items(items) => Ok(ServiceReply::Stream(prefilled(items))),
            Script::Complete(response) => Ok(ServiceReply::Complete(response)),
            Script::Fail(e) => Err(e),
            Script::Hang(events) => {
                let (tx, rx) = mpsc::channel(events.len() + 1);
                for event in events {
                    tx.try_send(Ok(event)).unwrap();
                }
                self.held.lock().unwrap().push(tx);
                Ok(ServiceReply::Stream(rx))
            }
            Script::Gated(gate, events) => {
                gate.notified().await;
                Ok(ServiceReply::Stream(prefilled(
                    events.into_iter().map(Ok).collect(),
                )))
            }
        }
    }
}

fn prefilled(
    items: Vec<Result<StreamEvent, ProviderError>>,
) -> mpsc::Receiver<Result<StreamEvent, ProviderError>> {
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        tx.try_send(item).unwrap();
    }
    rx
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit_turn(&self, request: TurnRequest) -> Result<ServiceReply, ProviderError> {
        self.turns.lock().unwrap().push(request);
        self.next_reply().await
    }

    async fn submit_tool_result(
        &self,
        request: ToolResultRequest,
    ) -> Result<ServiceReply, ProviderError> {
        self.tool_results.lock().unwrap().push(request);
        self.next_reply().await
    }
}

pub fn started(call_id: &str, tool_name: &str) -> StreamEvent {
    StreamEvent::ToolCallStarted {
        tool_name: tool_name.into(),
        call_id: call_id.into(),
    }
}

pub fn args(call_id: &str, partial: &str) -> StreamEvent {
    StreamEvent::ToolCallArguments {
        call_id: call_id.into(),
        partial_args: partial.into(),
    }
}

pub fn completed(call_id: &str, result: &str) -> StreamEvent {
    StreamEvent::ToolCallCompleted {
        call_id: call_id.into(),
        result: result.into(),
    }
}

/// A plain answer followed by completion.
pub fn text_turn(text: &str, turn_id: &str) -> Vec<StreamEvent> {
    vec![
        StreamEvent::TextDelta { text: text.into() },
        StreamEvent::TurnCompleted {
            turn_id: turn_id.into(),
        },
    ]
}

/// A turn that pauses on one local call.
pub fn pause_on_call(call_id: &str, tool_name: &str, arguments: &str, turn_id: &str) -> Vec<StreamEvent> {
    vec![
        started(call_id, tool_name),
        args(call_id, arguments),
        StreamEvent::TurnCompleted {
            turn_id: turn_id.into(),
        },
    ]
}

/// A registry holding only a tiny adder named `calculate`.
pub fn calc_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Tool::local(MiniCalculator)).unwrap();
    registry
}

/// Evaluates `a+b`, `a*b` and `a/b` over integers.
pub struct MiniCalculator;

#[async_trait::async_trait]
impl LocalTool for MiniCalculator {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate a binary integer expression"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "expression": { "type": "string" } },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression'".into()))?;
        let op_at = expr
            .find(['+', '*', '/'])
            .ok_or_else(|| ToolError::InvalidArguments(format!("Unsupported: {expr}")))?;
        let parse = |s: &str| {
            s.trim()
                .parse::<i64>()
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))
        };
        let (a, b) = (parse(&expr[..op_at])?, parse(&expr[op_at + 1..])?);
        let value = match &expr[op_at..op_at + 1] {
            "+" => a + b,
            "*" => a * b,
            _ if b == 0 => return Err(ToolError::ExecutionFailed("Division by zero".into())),
            _ => a / b,
        };
        Ok(format!("{expr} = {value}"))
    }
}

/// Always fails fatally.
pub struct FatalTool;

#[async_trait::async_trait]
impl LocalTool for FatalTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Fails beyond recovery"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Err(ToolError::Fatal("backing store is gone".into()))
    }
}

/// Counts its own executions and returns the running total.
pub struct CountingTool {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl LocalTool for CountingTool {
    fn name(&self) -> &str {
        "count"
    }

    fn description(&self) -> &str {
        "Count invocations"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(n.to_string())
    }
}

/// Sleeps for an hour before answering.
pub struct SlowTool;

#[async_trait::async_trait]
impl LocalTool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Takes a very long time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok("finally".into())
    }
}

pub fn slow_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Tool::local(SlowTool)).unwrap();
    registry
}
