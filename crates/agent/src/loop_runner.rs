//! The orchestration loop implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use turnwise_config::AppConfig;
use turnwise_core::error::{Error, ProviderError, RegistryError, ToolError};
use turnwise_core::provider::{
    Provider, RequestContext, ServiceReply, ToolOutput, ToolResultRequest, TurnRequest,
};
use turnwise_core::stream::{
    AggregationResult, PREMATURE_END, StreamEvent, StreamObserver, ToolInvocation,
};
use turnwise_core::tool::{ToolKind, ToolRegistry};

use crate::aggregator::{Flow, StreamAggregator};

/// Knobs for one orchestration loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub instructions: Option<String>,
    pub stream: bool,
    pub max_output_tokens: Option<u32>,
    /// Continuation requests allowed per turn
    pub max_tool_rounds: u32,
    /// Deadline for a whole turn, continuations included
    pub turn_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            instructions: None,
            stream: true,
            max_output_tokens: None,
            max_tool_rounds: 5,
            turn_timeout: Duration::from_secs(120),
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            instructions: config.assistant.instructions.clone(),
            stream: config.stream,
            max_output_tokens: config.max_output_tokens,
            max_tool_rounds: config.orchestration.max_tool_rounds,
            turn_timeout: Duration::from_secs(config.orchestration.turn_timeout_secs),
        }
    }
}

/// How a single drive of the loop ended.
#[derive(Debug)]
pub(crate) enum RunOutcome {
    /// Reached a terminal result (which may itself be `failed`).
    Finished(AggregationResult),
    /// Aborted by a typed fault; `partial` is what was gathered before it.
    Aborted {
        partial: AggregationResult,
        error: Error,
    },
    /// Cancelled by the caller; nothing is to be recorded.
    Cancelled,
}

enum ConsumeError {
    Cancelled,
    Aggregation {
        partial: AggregationResult,
        error: Error,
    },
}

/// Drives one user turn against the service.
///
/// Holds no conversation state: a [`crate::Session`] passes in the turn to
/// chain to and records the outcome. One loop can serve many sessions.
pub struct OrchestrationLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: LoopSettings,
}

impl OrchestrationLoop {
    /// Create a new orchestration loop.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: LoopSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Set the system instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.settings.instructions = Some(instructions.into());
        self
    }

    /// Enable or disable streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.settings.stream = stream;
        self
    }

    /// Set the maximum number of tool continuation rounds.
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.settings.max_tool_rounds = max;
        self
    }

    /// Set the per-turn deadline.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.settings.turn_timeout = timeout;
        self
    }

    /// Set the default max tokens per response.
    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.settings.max_output_tokens = Some(max);
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    fn request_context(&self) -> RequestContext {
        RequestContext {
            model: self.settings.model.clone(),
            instructions: self.settings.instructions.clone(),
            tools: self.tools.declare_for_request(),
            stream: self.settings.stream,
            max_output_tokens: self.settings.max_output_tokens,
        }
    }

    /// Drive one turn to a terminal state.
    ///
    /// The service may pause a turn on local tool calls; those are executed
    /// and their outputs sent back in a continuation request, up to
    /// `max_tool_rounds` times. Every round's text and tool calls are merged
    /// into one result.
    pub(crate) async fn drive(
        &self,
        utterance: &str,
        previous_turn_id: Option<String>,
        observer: &dyn StreamObserver,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let deadline = Instant::now() + self.settings.turn_timeout;
        let context = self.request_context();
        let mut merged = AggregationResult::default();
        // Outputs of local calls already executed during this run.
        let mut executed: HashMap<String, String> = HashMap::new();
        let mut rounds: u32 = 0;

        info!(
            provider = self.provider.name(),
            chained = previous_turn_id.is_some(),
            "Starting turn"
        );

        let first = self.provider.submit_turn(TurnRequest {
            context: context.clone(),
            utterance: utterance.to_string(),
            previous_turn_id,
        });
        let mut reply = match self.await_submission(first, deadline, cancel).await {
            Submission::Reply(reply) => reply,
            Submission::Failed(e) => return abort(merged, e.into()),
            Submission::TimedOut => return self.timed_out(merged, observer),
            Submission::Cancelled => return RunOutcome::Cancelled,
        };

        loop {
            let round = match self.consume(reply, observer, deadline, cancel).await {
                Ok(round) => round,
                Err(ConsumeError::Cancelled) => return RunOutcome::Cancelled,
                Err(ConsumeError::Aggregation { partial, error }) => {
                    merge_round(&mut merged, partial);
                    return abort(merged, error);
                }
            };

            let awaiting: Vec<ToolInvocation> = round
                .unresolved_calls()
                .filter(|call| self.awaits_local_execution(call))
                .cloned()
                .collect();
            let paused_turn = round.turn_id.clone();
            merge_round(&mut merged, round);

            if merged.failed || awaiting.is_empty() {
                info!(
                    turn_id = merged.turn_id.as_deref().unwrap_or("-"),
                    failed = merged.failed,
                    rounds,
                    "Turn finished"
                );
                return RunOutcome::Finished(merged);
            }

            rounds += 1;
            if rounds > self.settings.max_tool_rounds {
                warn!(
                    max_rounds = self.settings.max_tool_rounds,
                    "Tool loop exceeded, aborting turn"
                );
                return abort(
                    merged,
                    Error::ToolLoopExceeded {
                        max_rounds: self.settings.max_tool_rounds,
                    },
                );
            }

            let Some(paused_turn) = paused_turn else {
                return abort(merged, Error::Internal("paused turn carried no id".into()));
            };

            debug!(round = rounds, calls = awaiting.len(), "Executing local tool calls");
            let mut outputs = Vec::with_capacity(awaiting.len());
            for call in awaiting {
                if cancel.is_cancelled() {
                    return RunOutcome::Cancelled;
                }
                let output = match executed.get(&call.call_id) {
                    Some(previous) => {
                        debug!(call_id = %call.call_id, "Call already executed, reusing output");
                        previous.clone()
                    }
                    None => {
                        // Handlers run under the same deadline and token as the stream.
                        let run = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return RunOutcome::Cancelled,
                            run = tokio::time::timeout_at(deadline, self.execute_local(&call)) => run,
                        };
                        let output = match run {
                            Ok(Ok(output)) => output,
                            Ok(Err(e)) => return abort(merged, e),
                            Err(_) => return self.timed_out(merged, observer),
                        };
                        executed.insert(call.call_id.clone(), output.clone());
                        observer.on_event(&StreamEvent::ToolCallCompleted {
                            call_id: call.call_id.clone(),
                            result: output.clone(),
                        });
                        output
                    }
                };
                resolve_call(&mut merged, &call.call_id, &output);
                outputs.push(ToolOutput {
                    call_id: call.call_id,
                    output,
                });
            }

            let continuation = self.provider.submit_tool_result(ToolResultRequest {
                context: context.clone(),
                outputs,
                previous_turn_id: paused_turn,
            });
            reply = match self.await_submission(continuation, deadline, cancel).await {
                Submission::Reply(reply) => reply,
                Submission::Failed(e) => return abort(merged, e.into()),
                Submission::TimedOut => return self.timed_out(merged, observer),
                Submission::Cancelled => return RunOutcome::Cancelled,
            };
        }
    }

    /// Whether an unresolved call is one the orchestrator must run.
    ///
    /// Anything not registered as remote qualifies: unknown names get an
    /// error string back so the service can recover.
    fn awaits_local_execution(&self, call: &ToolInvocation) -> bool {
        match self.tools.kind_of(&call.tool_name) {
            Some(ToolKind::Remote) => {
                warn!(
                    tool = %call.tool_name,
                    call_id = %call.call_id,
                    "Remote tool call left unresolved by the service"
                );
                false
            }
            _ => true,
        }
    }

    /// Run a local call. Recoverable faults become the call's output.
    async fn execute_local(&self, call: &ToolInvocation) -> Result<String, Error> {
        let start = Instant::now();
        let result = self.tools.invoke_local(&call.tool_name, call.args.clone()).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(output) => {
                debug!(tool = %call.tool_name, call_id = %call.call_id, duration_ms, "Tool executed");
                Ok(output)
            }
            Err(
                e @ RegistryError::ToolExecution {
                    cause: ToolError::Fatal(_),
                    ..
                },
            ) => {
                warn!(tool = %call.tool_name, error = %e, "Tool reported a fatal fault");
                Err(e.into())
            }
            Err(e) => {
                warn!(tool = %call.tool_name, error = %e, "Tool execution failed");
                // Report error to the model so it can recover
                Ok(format!("Error: {e}"))
            }
        }
    }

    async fn await_submission<F>(
        &self,
        submission: F,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Submission
    where
        F: std::future::Future<Output = Result<ServiceReply, ProviderError>>,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Submission::Cancelled,
            result = tokio::time::timeout_at(deadline, submission) => match result {
                Ok(Ok(reply)) => Submission::Reply(reply),
                Ok(Err(e)) => {
                    warn!(error = %e, "Request to the service failed");
                    Submission::Failed(e)
                }
                Err(_) => Submission::TimedOut,
            },
        }
    }

    /// Fold one reply into a round result.
    async fn consume(
        &self,
        reply: ServiceReply,
        observer: &dyn StreamObserver,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, ConsumeError> {
        let mut aggregator = StreamAggregator::new();

        match reply {
            ServiceReply::Complete(response) => {
                for event in StreamAggregator::from_response(response) {
                    match aggregator.apply(event, observer) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Stop) => break,
                        Err(e) => {
                            return Err(ConsumeError::Aggregation {
                                partial: aggregator.finish(),
                                error: e.into(),
                            });
                        }
                    }
                }
            }
            ServiceReply::Stream(mut rx) => loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ConsumeError::Cancelled),
                    next = tokio::time::timeout_at(deadline, rx.recv()) => next,
                };
                let event = match next {
                    Ok(Some(Ok(event))) => event,
                    Ok(Some(Err(e))) => StreamEvent::StreamError {
                        message: e.to_string(),
                    },
                    Ok(None) => StreamEvent::StreamError {
                        message: PREMATURE_END.into(),
                    },
                    Err(_) => StreamEvent::StreamError {
                        message: self.timeout_message(),
                    },
                };
                match aggregator.apply(event, observer) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop) => break,
                    Err(e) => {
                        return Err(ConsumeError::Aggregation {
                            partial: aggregator.finish(),
                            error: e.into(),
                        });
                    }
                }
            },
        }

        Ok(aggregator.finish())
    }

    fn timeout_message(&self) -> String {
        format!(
            "turn timed out after {}s",
            self.settings.turn_timeout.as_secs_f64()
        )
    }

    /// Deadline hit while waiting on a submission: same as a stream error.
    fn timed_out(&self, mut merged: AggregationResult, observer: &dyn StreamObserver) -> RunOutcome {
        let message = self.timeout_message();
        warn!(%message, "Turn timed out");
        observer.on_event(&StreamEvent::StreamError { message });
        merged.failed = true;
        merged.turn_id = None;
        RunOutcome::Finished(merged)
    }
}

enum Submission {
    Reply(ServiceReply),
    Failed(ProviderError),
    TimedOut,
    Cancelled,
}

fn abort(mut partial: AggregationResult, error: Error) -> RunOutcome {
    partial.failed = true;
    RunOutcome::Aborted { partial, error }
}

/// Fold a round into the running result: text and calls accumulate, the
/// turn id and failure flag follow the latest round.
fn merge_round(merged: &mut AggregationResult, round: AggregationResult) {
    merged.final_text.push_str(&round.final_text);
    merged.tool_calls.extend(round.tool_calls);
    merged.turn_id = round.turn_id;
    merged.failed = round.failed;
}

fn resolve_call(merged: &mut AggregationResult, call_id: &str, output: &str) {
    if let Some(call) = merged
        .tool_calls
        .iter_mut()
        .rev()
        .find(|c| c.call_id == call_id && c.result.is_none())
    {
        call.result = Some(output.to_string());
    }
}
