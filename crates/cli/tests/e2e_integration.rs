//! End-to-end integration tests for the turnwise orchestration loop.
//!
//! These tests exercise the full pipeline from user utterance to recorded
//! turn: request building, stream aggregation, local tool execution through
//! the built-in registries, continuation, and conversation chaining.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use turnwise_agent::{LoopSettings, OrchestrationLoop, Session};
use turnwise_core::error::{Error, ProviderError};
use turnwise_core::provider::{
    Provider, ServiceReply, ServiceResponse, ServiceToolCall, ToolResultRequest, TurnRequest,
};
use turnwise_core::stream::{NoopObserver, StreamEvent};
use turnwise_core::tool::{ToolKind, ToolRegistry};
use turnwise_tools::{InMemoryReminders, Preset, PresetOptions, default_registry};

// ── Mock Provider ────────────────────────────────────────────────────────

enum Reply {
    Stream(Vec<StreamEvent>),
    Complete(ServiceResponse),
}

/// A mock provider that returns scripted replies in sequence.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    turns: Mutex<Vec<TurnRequest>>,
    continuations: Mutex<Vec<ToolResultRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            turns: Mutex::new(Vec::new()),
            continuations: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.turns.lock().unwrap().len() + self.continuations.lock().unwrap().len()
    }

    fn turns(&self) -> Vec<TurnRequest> {
        self.turns.lock().unwrap().clone()
    }

    fn continuations(&self) -> Vec<ToolResultRequest> {
        self.continuations.lock().unwrap().clone()
    }

    fn next(&self) -> ServiceReply {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted after {} calls", self.calls()));
        match reply {
            Reply::Complete(response) => ServiceReply::Complete(response),
            Reply::Stream(events) => {
                let (tx, rx) = mpsc::channel(events.len().max(1));
                for event in events {
                    tx.try_send(Ok(event)).unwrap();
                }
                ServiceReply::Stream(rx)
            }
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn submit_turn(&self, request: TurnRequest) -> Result<ServiceReply, ProviderError> {
        self.turns.lock().unwrap().push(request);
        Ok(self.next())
    }

    async fn submit_tool_result(
        &self,
        request: ToolResultRequest,
    ) -> Result<ServiceReply, ProviderError> {
        self.continuations.lock().unwrap().push(request);
        Ok(self.next())
    }
}

fn answer(text: &str, turn_id: &str) -> Reply {
    Reply::Stream(vec![
        StreamEvent::TextDelta { text: text.into() },
        StreamEvent::TurnCompleted {
            turn_id: turn_id.into(),
        },
    ])
}

/// A paused turn whose arguments arrive in several fragments.
fn call_tool(call_id: &str, tool: &str, args: serde_json::Value, turn_id: &str) -> Reply {
    let raw = args.to_string();
    let (head, tail) = raw.split_at(raw.len() / 2);
    Reply::Stream(vec![
        StreamEvent::ToolCallStarted {
            tool_name: tool.into(),
            call_id: call_id.into(),
        },
        StreamEvent::ToolCallArguments {
            call_id: call_id.into(),
            partial_args: head.into(),
        },
        StreamEvent::ToolCallArguments {
            call_id: call_id.into(),
            partial_args: tail.into(),
        },
        StreamEvent::TurnCompleted {
            turn_id: turn_id.into(),
        },
    ])
}

fn session(provider: Arc<ScriptedProvider>, registry: ToolRegistry) -> Session {
    Session::new(Arc::new(OrchestrationLoop::new(
        provider,
        Arc::new(registry),
        LoopSettings::default(),
    )))
}

// ── E2E: Local tools ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_calculator_round_trip() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call_tool(
            "call_calc",
            "calculate",
            serde_json::json!({"expression": "15 * 8 + 27"}),
            "resp_1",
        ),
        answer("15 × 8 + 27 is 147.", "resp_2"),
    ]));
    let session = session(provider.clone(), default_registry().unwrap());

    let result = session.run("what is 15*8+27?", &NoopObserver).await.unwrap();

    assert_eq!(result.final_text, "15 × 8 + 27 is 147.");
    assert_eq!(result.turn_id.as_deref(), Some("resp_2"));
    assert_eq!(provider.calls(), 2);

    let continuation = &provider.continuations()[0];
    assert_eq!(continuation.previous_turn_id, "resp_1");
    assert_eq!(continuation.outputs[0].call_id, "call_calc");
    assert_eq!(continuation.outputs[0].output, "15 * 8 + 27 = 147");
}

#[tokio::test]
async fn e2e_personal_assistant_weather_and_time() {
    let registry = Preset::PersonalAssistant
        .registry(&PresetOptions::default())
        .unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        Reply::Stream(vec![
            StreamEvent::ToolCallStarted {
                tool_name: "get_weather_info".into(),
                call_id: "w".into(),
            },
            StreamEvent::ToolCallArguments {
                call_id: "w".into(),
                partial_args: r#"{"city":"Paris"}"#.into(),
            },
            StreamEvent::ToolCallStarted {
                tool_name: "get_current_time".into(),
                call_id: "t".into(),
            },
            StreamEvent::ToolCallArguments {
                call_id: "t".into(),
                partial_args: r#"{"timezone":"UTC"}"#.into(),
            },
            StreamEvent::TurnCompleted {
                turn_id: "resp_p".into(),
            },
        ]),
        answer("It's mild in Paris.", "resp_f"),
    ]));
    let session = session(provider.clone(), registry);

    session
        .run("weather in Paris and the time?", &NoopObserver)
        .await
        .unwrap();

    // Both calls go back in one continuation, in call order.
    let continuations = provider.continuations();
    assert_eq!(continuations.len(), 1);
    let outputs = &continuations[0].outputs;
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].output.starts_with("Weather in Paris: "));
    assert!(outputs[1].output.starts_with("Current time in UTC: "));

    // The hosted web search is declared alongside the local tools.
    let declared = &provider.turns()[0].context.tools;
    assert!(
        declared
            .iter()
            .any(|d| d.name == "web_search" && d.kind == ToolKind::Remote)
    );
}

#[tokio::test]
async fn e2e_reminder_reaches_injected_sink() {
    let reminders = Arc::new(InMemoryReminders::new());
    let registry = Preset::PersonalAssistant
        .registry(&PresetOptions {
            reminders: reminders.clone(),
            ..PresetOptions::default()
        })
        .unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![
        call_tool(
            "call_rem",
            "create_reminder",
            serde_json::json!({"task": "call mom", "time": "tomorrow at 2pm"}),
            "resp_1",
        ),
        answer("Reminder set.", "resp_2"),
    ]));
    let session = session(provider.clone(), registry);

    session
        .run("remind me to call mom tomorrow at 2pm", &NoopObserver)
        .await
        .unwrap();

    let stored = reminders.list();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].task, "call mom");
    assert_eq!(
        provider.continuations()[0].outputs[0].output,
        "Reminder created: 'call mom' scheduled for tomorrow at 2pm"
    );
}

#[tokio::test]
async fn e2e_bad_arguments_are_reported_to_the_service() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call_tool("c", "get_weather_info", serde_json::json!({}), "resp_1"),
        answer("Which city?", "resp_2"),
    ]));
    let session = session(provider.clone(), default_registry().unwrap());

    let result = session.run("weather?", &NoopObserver).await.unwrap();

    assert!(!result.failed);
    let output = &provider.continuations()[0].outputs[0].output;
    assert!(output.starts_with("Error: "), "{output}");
    assert!(output.contains("city"));
}

// ── E2E: Remote tools ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_document_search_is_resolved_by_the_service() {
    let registry = Preset::DocumentSearch
        .registry(&PresetOptions {
            vector_store_ids: vec!["vs_reports".into()],
            ..PresetOptions::default()
        })
        .unwrap();
    let provider = Arc::new(ScriptedProvider::new(vec![Reply::Stream(vec![
        StreamEvent::ToolCallStarted {
            tool_name: "file_search".into(),
            call_id: "fs_1".into(),
        },
        StreamEvent::ToolCallCompleted {
            call_id: "fs_1".into(),
            result: "2 passages".into(),
        },
        StreamEvent::TextDelta {
            text: "Revenue grew 12%.".into(),
        },
        StreamEvent::TurnCompleted {
            turn_id: "resp_1".into(),
        },
    ])]));
    let session = session(provider.clone(), registry);

    let result = session.run("How did revenue do?", &NoopObserver).await.unwrap();

    assert_eq!(result.final_text, "Revenue grew 12%.");
    assert_eq!(result.tool_calls[0].result.as_deref(), Some("2 passages"));
    assert_eq!(provider.calls(), 1);

    let declared = &provider.turns()[0].context.tools[0];
    assert_eq!(declared.kind, ToolKind::Remote);
    let config = declared.service_config.as_ref().unwrap();
    assert_eq!(config["vector_store_ids"][0], "vs_reports");
}

// ── E2E: Non-streamed replies ────────────────────────────────────────────

#[tokio::test]
async fn e2e_non_streamed_tool_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Reply::Complete(ServiceResponse {
            turn_id: "resp_1".into(),
            tool_calls: vec![ServiceToolCall {
                call_id: "call_1".into(),
                name: "calculate".into(),
                arguments: r#"{"expression":"2 ^ 10"}"#.into(),
                result: None,
            }],
            ..Default::default()
        }),
        Reply::Complete(ServiceResponse {
            turn_id: "resp_2".into(),
            text: "1024".into(),
            ..Default::default()
        }),
    ]));
    let session = Session::new(Arc::new(
        OrchestrationLoop::new(
            provider.clone(),
            Arc::new(default_registry().unwrap()),
            LoopSettings::default(),
        )
        .with_stream(false),
    ));

    let result = session.run("2^10", &NoopObserver).await.unwrap();

    assert_eq!(result.final_text, "1024");
    assert!(!provider.turns()[0].context.stream);
    assert_eq!(provider.continuations()[0].outputs[0].output, "2 ^ 10 = 1024");
}

// ── E2E: Conversation ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_multi_turn_chaining_and_reset() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        answer("Hi Ada.", "resp_1"),
        call_tool(
            "c",
            "calculate",
            serde_json::json!({"expression": "6 * 7"}),
            "resp_2",
        ),
        answer("42.", "resp_3"),
        answer("Hello, stranger.", "resp_4"),
    ]));
    let session = session(provider.clone(), default_registry().unwrap());

    session.run("I'm Ada", &NoopObserver).await.unwrap();
    session.run("6 times 7?", &NoopObserver).await.unwrap();
    assert_eq!(session.current_turn_reference().as_deref(), Some("resp_3"));

    session.reset().unwrap();
    session.run("who am I?", &NoopObserver).await.unwrap();

    let turns = provider.turns();
    assert_eq!(turns[0].previous_turn_id, None);
    assert_eq!(turns[1].previous_turn_id.as_deref(), Some("resp_1"));
    assert_eq!(turns[2].previous_turn_id, None);

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].response_text, "Hello, stranger.");
}

#[tokio::test]
async fn e2e_tool_loop_limit() {
    let replies = (0..3)
        .map(|i| {
            call_tool(
                &format!("c{i}"),
                "calculate",
                serde_json::json!({"expression": "1 + 1"}),
                &format!("resp_{i}"),
            )
        })
        .collect();
    let provider = Arc::new(ScriptedProvider::new(replies));
    let session = Session::new(Arc::new(
        OrchestrationLoop::new(
            provider.clone(),
            Arc::new(default_registry().unwrap()),
            LoopSettings::default(),
        )
        .with_max_tool_rounds(2),
    ));

    let err = session.run("loop forever", &NoopObserver).await.unwrap_err();

    assert!(matches!(err, Error::ToolLoopExceeded { max_rounds: 2 }));
    assert_eq!(provider.calls(), 3);
    assert_eq!(session.current_turn_reference(), None);
}

#[tokio::test]
async fn e2e_observer_sees_progress() {
    let seen = Mutex::new(Vec::new());
    let observer = |event: &StreamEvent| seen.lock().unwrap().push(event.clone());
    let provider = Arc::new(ScriptedProvider::new(vec![
        call_tool(
            "c",
            "calculate",
            serde_json::json!({"expression": "9 - 4"}),
            "resp_1",
        ),
        answer("5", "resp_2"),
    ]));
    let session = session(provider, default_registry().unwrap());

    session.run("9-4", &observer).await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|e| matches!(
        e,
        StreamEvent::ToolCallCompleted { result, .. } if result == "9 - 4 = 5"
    )));
    assert_eq!(
        seen.last(),
        Some(&StreamEvent::TurnCompleted {
            turn_id: "resp_2".into()
        })
    );
}
