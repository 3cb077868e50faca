//! Server-sent event decoding for the Responses API.
//!
//! [`SseDecoder`] turns raw bytes into `data:` payloads. [`EventMapper`]
//! turns payloads into [`StreamEvent`]s. [`pump`] drives both over a byte
//! stream and feeds the results into the channel handed to the orchestrator.

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use turnwise_core::error::ProviderError;
use turnwise_core::stream::{PREMATURE_END, StreamEvent};

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across network chunks survive intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every event payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.trim_end_matches('\r');

            if line.is_empty() {
                // Blank line dispatches the pending event.
                if let Some(payload) = self.take_event() {
                    payloads.push(payload);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
            // `event:`, `id:` and `retry:` fields are not needed: every
            // payload repeats its type in JSON.
        }

        payloads
    }

    /// Flush whatever is pending once the byte stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            if let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") {
                self.data.push(data.trim_start().to_string());
            }
        }
        self.take_event()
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

/// Translates Responses API events into [`StreamEvent`]s.
///
/// Keeps the bookkeeping the wire format requires: argument deltas are keyed
/// by item id while the service expects outputs keyed by call id.
#[derive(Debug, Default)]
pub struct EventMapper {
    item_to_call: HashMap<String, String>,
    args_streamed: HashSet<String>,
    hosted_open: HashSet<String>,
    finished: bool,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Map one decoded payload.
    pub fn map(&mut self, payload: &Value) -> Vec<StreamEvent> {
        let event_type = payload["type"].as_str().unwrap_or_default();
        let events = match event_type {
            "response.output_text.delta" => match payload["delta"].as_str() {
                Some(text) if !text.is_empty() => vec![StreamEvent::TextDelta {
                    text: text.to_string(),
                }],
                _ => Vec::new(),
            },
            "response.output_item.added" => self.item_added(&payload["item"]),
            "response.function_call_arguments.delta" => {
                let item_id = payload["item_id"].as_str().unwrap_or_default();
                let call_id = self
                    .item_to_call
                    .get(item_id)
                    .cloned()
                    .unwrap_or_else(|| item_id.to_string());
                let delta = payload["delta"].as_str().unwrap_or_default();
                if delta.is_empty() {
                    Vec::new()
                } else {
                    self.args_streamed.insert(call_id.clone());
                    vec![StreamEvent::ToolCallArguments {
                        call_id,
                        partial_args: delta.to_string(),
                    }]
                }
            }
            "response.output_item.done" => self.item_done(&payload["item"]),
            "response.completed" => {
                let turn_id = payload["response"]["id"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                vec![StreamEvent::TurnCompleted { turn_id }]
            }
            "response.failed" => {
                let message = payload["response"]["error"]["message"]
                    .as_str()
                    .unwrap_or("response failed")
                    .to_string();
                vec![StreamEvent::StreamError { message }]
            }
            "response.incomplete" => {
                let reason = payload["response"]["incomplete_details"]["reason"]
                    .as_str()
                    .unwrap_or("unknown reason");
                vec![StreamEvent::StreamError {
                    message: format!("response incomplete: {reason}"),
                }]
            }
            "error" => {
                let message = payload["message"]
                    .as_str()
                    .or_else(|| payload["error"]["message"].as_str())
                    .unwrap_or("service error")
                    .to_string();
                vec![StreamEvent::StreamError { message }]
            }
            other => {
                trace!(event_type = other, "Skipping unhandled stream event");
                Vec::new()
            }
        };

        if events.iter().any(StreamEvent::is_terminal) {
            self.finished = true;
        }
        events
    }

    fn item_added(&mut self, item: &Value) -> Vec<StreamEvent> {
        let item_type = item["type"].as_str().unwrap_or_default();
        if item_type == "function_call" {
            let call_id = item["call_id"].as_str().unwrap_or_default().to_string();
            let tool_name = item["name"].as_str().unwrap_or_default().to_string();
            if let Some(item_id) = item["id"].as_str() {
                self.item_to_call.insert(item_id.to_string(), call_id.clone());
            }
            return vec![StreamEvent::ToolCallStarted { tool_name, call_id }];
        }
        if let Some(tool_name) = hosted_tool_name(item_type) {
            let call_id = item["id"].as_str().unwrap_or_default().to_string();
            self.hosted_open.insert(call_id.clone());
            return vec![StreamEvent::ToolCallStarted {
                tool_name: tool_name.to_string(),
                call_id,
            }];
        }
        Vec::new()
    }

    fn item_done(&mut self, item: &Value) -> Vec<StreamEvent> {
        let item_type = item["type"].as_str().unwrap_or_default();
        if item_type == "function_call" {
            let call_id = item["call_id"].as_str().unwrap_or_default();
            let arguments = item["arguments"].as_str().unwrap_or_default();
            if self.args_streamed.contains(call_id) || arguments.is_empty() {
                return Vec::new();
            }
            self.args_streamed.insert(call_id.to_string());
            return vec![StreamEvent::ToolCallArguments {
                call_id: call_id.to_string(),
                partial_args: arguments.to_string(),
            }];
        }
        if let Some(tool_name) = hosted_tool_name(item_type) {
            let call_id = item["id"].as_str().unwrap_or_default().to_string();
            let mut events = Vec::with_capacity(2);
            if !self.hosted_open.remove(&call_id) {
                debug!(call_id = %call_id, "Hosted tool finished without a start event");
                events.push(StreamEvent::ToolCallStarted {
                    tool_name: tool_name.to_string(),
                    call_id: call_id.clone(),
                });
            }
            events.push(StreamEvent::ToolCallCompleted {
                call_id,
                result: hosted_summary(item),
            });
            return events;
        }
        Vec::new()
    }
}

/// Registry name of a hosted tool, keyed by its output item type.
pub(crate) fn hosted_tool_name(item_type: &str) -> Option<&'static str> {
    match item_type {
        "web_search_call" => Some("web_search"),
        "file_search_call" => Some("file_search"),
        "code_interpreter_call" => Some("code_interpreter"),
        _ => None,
    }
}

/// One-line description of what a hosted tool did.
pub(crate) fn hosted_summary(item: &Value) -> String {
    let status = item["status"].as_str().unwrap_or("completed");
    match item["type"].as_str().unwrap_or_default() {
        "web_search_call" => match item["action"]["query"].as_str() {
            Some(query) => format!("searched the web for \"{query}\" ({status})"),
            None => format!("web search {status}"),
        },
        "file_search_call" => {
            let queries: Vec<&str> = item["queries"]
                .as_array()
                .map(|qs| qs.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let hits = item["results"].as_array().map(Vec::len);
            match (queries.is_empty(), hits) {
                (false, Some(n)) => {
                    format!("searched documents for \"{}\": {n} result(s)", queries.join("; "))
                }
                (false, None) => format!("searched documents for \"{}\" ({status})", queries.join("; ")),
                (true, _) => format!("file search {status}"),
            }
        }
        "code_interpreter_call" => {
            let logs: Vec<&str> = item["outputs"]
                .as_array()
                .map(|outs| outs.iter().filter_map(|o| o["logs"].as_str()).collect())
                .unwrap_or_default();
            if logs.is_empty() {
                format!("code execution {status}")
            } else {
                logs.join("\n")
            }
        }
        _ => status.to_string(),
    }
}

/// Drive a byte stream through the decoder and mapper into `tx`.
///
/// Ends after the first terminal event, when the receiver goes away, or when
/// the byte stream stops. A stream that stops before any terminal event
/// yields a synthetic `StreamError`.
pub async fn pump<S, B, E>(
    bytes: S,
    tx: mpsc::Sender<Result<StreamEvent, ProviderError>>,
    provider_name: String,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut bytes = std::pin::pin!(bytes);
    let mut decoder = SseDecoder::new();
    let mut mapper = EventMapper::new();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
        };
        for payload in decoder.push(chunk.as_ref()) {
            if !forward(&mut mapper, &payload, &tx, &provider_name).await {
                return;
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        if !forward(&mut mapper, &payload, &tx, &provider_name).await {
            return;
        }
    }

    if !mapper.is_finished() {
        debug!(provider = %provider_name, "Event stream closed early");
        let _ = tx
            .send(Ok(StreamEvent::StreamError {
                message: PREMATURE_END.into(),
            }))
            .await;
    }
}

/// Returns false once nothing more should be sent.
async fn forward(
    mapper: &mut EventMapper,
    payload: &str,
    tx: &mpsc::Sender<Result<StreamEvent, ProviderError>>,
    provider_name: &str,
) -> bool {
    if payload.trim() == "[DONE]" {
        return !mapper.is_finished();
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            trace!(provider = %provider_name, error = %e, "Ignoring unparseable SSE payload");
            return true;
        }
    };
    for event in mapper.map(&value) {
        if tx.send(Ok(event)).await.is_err() {
            return false; // receiver dropped
        }
    }
    !mapper.is_finished()
}
