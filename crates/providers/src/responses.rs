//! Responses API provider.
//!
//! Works with OpenAI and any endpoint exposing a compatible `/responses`
//! route.
//!
//! Supports:
//! - Chained turns via `previous_response_id`
//! - Streaming (SSE) and complete responses
//! - Local function tools and hosted tools side by side
//! - Continuation of paused turns with `function_call_output` items

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use turnwise_core::error::ProviderError;
use turnwise_core::provider::*;
use turnwise_core::tool::{ToolDeclaration, ToolKind};

use crate::sse::{self, hosted_summary, hosted_tool_name};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// A Responses API client.
pub struct ResponsesProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) client: reqwest::Client,
}

impl ResponsesProvider {
    /// Create a new provider against `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        // No overall request timeout: streams can legitimately run long.
        // The orchestrator bounds each turn with its own deadline.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", OPENAI_BASE_URL, api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert declarations to the API's tool list.
    ///
    /// Local tools become function tools; remote tools send their service
    /// configuration as-is.
    pub(crate) fn to_api_tools(tools: &[ToolDeclaration]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| match (t.kind, &t.service_config) {
                (ToolKind::Remote, Some(config)) => config.clone(),
                (ToolKind::Remote, None) => json!({ "type": t.name }),
                (ToolKind::Local, _) => json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }),
            })
            .collect()
    }

    /// Assemble a request body.
    pub(crate) fn build_body(
        context: &RequestContext,
        input: Value,
        previous_response_id: Option<&str>,
    ) -> Value {
        let mut body = json!({
            "model": context.model,
            "input": input,
            "stream": context.stream,
        });

        if let Some(instructions) = &context.instructions {
            body["instructions"] = json!(instructions);
        }
        if let Some(max_tokens) = context.max_output_tokens {
            body["max_output_tokens"] = json!(max_tokens);
        }
        if !context.tools.is_empty() {
            body["tools"] = json!(Self::to_api_tools(&context.tools));
        }
        if let Some(prev) = previous_response_id {
            body["previous_response_id"] = json!(prev);
        }
        body
    }

    /// Continuation input: one `function_call_output` item per executed call.
    pub(crate) fn tool_outputs_input(outputs: &[ToolOutput]) -> Value {
        Value::Array(
            outputs
                .iter()
                .map(|o| {
                    json!({
                        "type": "function_call_output",
                        "call_id": o.call_id,
                        "output": o.output,
                    })
                })
                .collect(),
        )
    }

    pub(crate) fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, body: Value, stream: bool) -> Result<ServiceReply, ProviderError> {
        let url = format!("{}/responses", self.base_url);

        let mut request = self
            .authorized(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body);
        if stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = check_status(response).await?;

        if stream {
            let (tx, rx) = tokio::sync::mpsc::channel(64);
            let provider_name = self.name.clone();
            // Spawn task to read the SSE byte stream and map events
            tokio::spawn(async move {
                sse::pump(response.bytes_stream(), tx, provider_name).await;
            });
            return Ok(ServiceReply::Stream(rx));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        Ok(ServiceReply::Complete(parse_response(&raw)?))
    }
}

/// Map non-success statuses to provider errors.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(ProviderError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Provider returned error");
        let message = serde_json::from_str::<Value>(&error_body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(error_body);
        return Err(ProviderError::ApiError {
            status_code: status,
            message,
        });
    }

    Ok(response)
}

/// Parse a complete (non-streamed) response object.
pub fn parse_response(raw: &Value) -> Result<ServiceResponse, ProviderError> {
    let turn_id = raw["id"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidResponse("response has no id".into()))?
        .to_string();

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in raw["output"].as_array().into_iter().flatten() {
        let item_type = item["type"].as_str().unwrap_or_default();
        match item_type {
            "message" => {
                for part in item["content"].as_array().into_iter().flatten() {
                    if part["type"] == "output_text" {
                        text.push_str(part["text"].as_str().unwrap_or_default());
                    }
                }
            }
            "function_call" => tool_calls.push(ServiceToolCall {
                call_id: item["call_id"].as_str().unwrap_or_default().to_string(),
                name: item["name"].as_str().unwrap_or_default().to_string(),
                arguments: item["arguments"].as_str().unwrap_or("{}").to_string(),
                result: None,
            }),
            other => {
                if let Some(name) = hosted_tool_name(other) {
                    tool_calls.push(ServiceToolCall {
                        call_id: item["id"].as_str().unwrap_or_default().to_string(),
                        name: name.to_string(),
                        arguments: hosted_arguments(item),
                        result: Some(hosted_summary(item)),
                    });
                } else {
                    debug!(item_type = other, "Skipping output item");
                }
            }
        }
    }

    let error = match raw["status"].as_str() {
        Some("failed") => Some(
            raw["error"]["message"]
                .as_str()
                .unwrap_or("response failed")
                .to_string(),
        ),
        Some("incomplete") => Some(format!(
            "response incomplete: {}",
            raw["incomplete_details"]["reason"]
                .as_str()
                .unwrap_or("unknown reason")
        )),
        _ => None,
    };

    Ok(ServiceResponse {
        turn_id,
        text,
        tool_calls,
        error,
    })
}

/// What the service passed to a hosted tool, as JSON text.
fn hosted_arguments(item: &Value) -> String {
    let args = if !item["action"].is_null() {
        item["action"].clone()
    } else if !item["queries"].is_null() {
        json!({ "queries": item["queries"] })
    } else if !item["code"].is_null() {
        json!({ "code": item["code"] })
    } else {
        json!({})
    };
    args.to_string()
}

#[async_trait]
impl turnwise_core::Provider for ResponsesProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit_turn(&self, request: TurnRequest) -> Result<ServiceReply, ProviderError> {
        debug!(
            provider = %self.name,
            model = %request.context.model,
            chained = request.previous_turn_id.is_some(),
            tools = request.context.tools.len(),
            "Submitting turn"
        );
        let body = Self::build_body(
            &request.context,
            json!(request.utterance),
            request.previous_turn_id.as_deref(),
        );
        self.send(body, request.context.stream).await
    }

    async fn submit_tool_result(
        &self,
        request: ToolResultRequest,
    ) -> Result<ServiceReply, ProviderError> {
        debug!(
            provider = %self.name,
            previous = %request.previous_turn_id,
            outputs = request.outputs.len(),
            "Submitting tool outputs"
        );
        let body = Self::build_body(
            &request.context,
            Self::tool_outputs_input(&request.outputs),
            Some(&request.previous_turn_id),
        );
        self.send(body, request.context.stream).await
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
