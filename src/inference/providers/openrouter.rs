//! OpenRouter provider implementation using the Responses API.
//!
//! This module uses OpenAI Responses API terminology:
//! - "input" (array of messages, not "context")
//! - "role" (not "source")
//! - SSE events: response.output_text.delta, response.function_call_arguments.done

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::inference::{
    CompletionProvider, CompletionRequest, ContextSegment, Effort, ProviderError, Source,
    StreamChunk, ToolCall, ToolDefinition,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

// ============================================================================
// OpenRouter Responses API Types
// ============================================================================

/// Role in an input message (OpenAI terminology)
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
enum InputItem {
    #[serde(rename = "message")]
    Message { role: Role, content: String },
}

/// Configuration for reasoning tokens
#[derive(Serialize, Debug)]
struct Reasoning {
    #[serde(skip_serializing_if = "Option::is_none")]
    effort: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
}

/// Tool definition for the API request
#[derive(Serialize, Debug)]
struct ApiToolDefinition {
    #[serde(rename = "type")]
    tool_type: &'static str, // always "function"
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// `text.format` block constraining the output shape.
#[derive(Serialize, Debug)]
struct TextConfig {
    format: TextFormat,
}

#[derive(Serialize, Debug)]
struct TextFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

/// The request body for the Responses API
#[derive(Serialize, Debug)]
struct ResponsesRequest {
    model: String,
    input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    reasoning: Reasoning,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Generic SSE event wrapper to extract the type field
/// OpenRouter embeds the event type inside the JSON, not in SSE event: lines
#[derive(Deserialize, Debug)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: String,
}

/// SSE event for response.output_item.added (detects function_call output items)
#[derive(Deserialize, Debug)]
struct OutputItemAddedEvent {
    item: OutputItemData,
}

#[derive(Deserialize, Debug)]
struct OutputItemData {
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    call_id: String,
    #[serde(default)]
    name: String,
}

/// SSE event for response.function_call_arguments.done
/// The `item_id` correlates back to the `output_item.added` event's `item.id`.
#[derive(Deserialize, Debug)]
struct FunctionCallArgsDoneEvent {
    item_id: String,
    #[serde(default)]
    name: String,
    arguments: String,
}

/// SSE event for response.failed / error
#[derive(Deserialize, Debug)]
struct FailedEvent {
    #[serde(default)]
    response: Option<FailedResponse>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FailedResponse {
    #[serde(default)]
    error: Option<FailedDetail>,
}

#[derive(Deserialize, Debug)]
struct FailedDetail {
    #[serde(default)]
    message: String,
}

/// Tracks a tool call across multiple SSE events (added → delta* → done).
struct PendingToolCall {
    id: String,      // API object ID (e.g. "fc_abc123")
    call_id: String, // Correlation ID (e.g. "call_xyz789")
    name: String,
}

// ============================================================================
// Translation Layer
// ============================================================================

/// Converts context segments into Responses API input format.
fn context_to_input(items: &[ContextSegment]) -> Vec<InputItem> {
    items
        .iter()
        .map(|seg| InputItem::Message {
            role: match seg.source {
                Source::Directive => Role::System,
                Source::User => Role::User,
            },
            content: seg.content.clone(),
        })
        .collect()
}

/// Converts tool definitions to API format. Returns None if empty (omitted from JSON).
fn tools_to_api(tools: &[ToolDefinition]) -> Option<Vec<ApiToolDefinition>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                tool_type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    )
}

/// Maps our Effort enum to a Reasoning config for the Responses API.
fn effort_to_reasoning(effort: Effort) -> Reasoning {
    match effort {
        Effort::Auto => Reasoning {
            effort: None,
            enabled: Some(true),
        },
        Effort::None => Reasoning {
            effort: Some("none"),
            enabled: Some(false),
        },
        Effort::High => Reasoning {
            effort: Some("high"),
            enabled: None,
        },
        Effort::Medium => Reasoning {
            effort: Some("medium"),
            enabled: None,
        },
        Effort::Low => Reasoning {
            effort: Some("low"),
            enabled: None,
        },
    }
}

fn build_request(request: &CompletionRequest<'_>) -> ResponsesRequest {
    let tools = tools_to_api(request.tools);
    ResponsesRequest {
        model: request.model.to_string(),
        input: context_to_input(&request.context.items),
        stream: Some(true),
        reasoning: effort_to_reasoning(request.effort),
        tool_choice: (request.require_tool && tools.is_some()).then_some("required"),
        tools,
        text: request.json_output.then_some(TextConfig {
            format: TextFormat {
                format_type: "json_object",
            },
        }),
        max_output_tokens: request.max_output_tokens,
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// OpenRouter API provider using Responses API
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenRouterProvider {
    /// Creates a new OpenRouter provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenRouter API key
    /// * `base_url` - Optional custom base URL (defaults to OpenRouter's API)
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Bounds each request, from connect until the stream is fully read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends a request to the Responses endpoint and returns the response.
    async fn send_request(
        &self,
        request: &ResponsesRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let json_body = serde_json::to_string(request)
            .map_err(|e| ProviderError::Parse(format!("Request serialization failed: {e}")))?;
        debug!("Raw OpenRouter Request: {}", json_body);

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .body(json_body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        debug!("OpenRouter response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("OpenRouter API error: {} - {}", status, err_body);
            return Err(ProviderError::Api {
                status,
                message: err_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let responses_request = build_request(&request);

        info!(
            "OpenRouter Responses API request: model={}, input_count={}, effort={:?}, tools={}",
            request.model,
            responses_request.input.len(),
            request.effort,
            request.tools.len(),
        );

        let mut response = self.send_request(&responses_request).await?;

        // Process the SSE stream with typed events
        let mut buffer = String::new();
        let mut current_event_type: Option<String> = None;
        let mut total_content_len = 0usize;
        let mut chunk_count = 0usize;

        // Tool call state: tracks concurrent tool calls by item_id
        let mut pending_tools: HashMap<String, PendingToolCall> = HashMap::new();

        while let Some(chunk) = response.chunk().await.map_err(ProviderError::from_reqwest)? {
            let s = String::from_utf8_lossy(&chunk);
            debug!("Raw chunk received: {} bytes", chunk.len());
            buffer.push_str(&s);

            // Process complete lines from buffer
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer.drain(..pos + 1);

                let line = line.trim();

                if let Some(event_type) = line.strip_prefix("event: ") {
                    current_event_type = Some(event_type.to_string());
                    continue;
                }

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };

                if data == "[DONE]" {
                    debug!("Received [DONE] marker");
                    continue;
                }

                let event_type = current_event_type.take().or_else(|| {
                    serde_json::from_str::<SseEvent>(data)
                        .ok()
                        .map(|e| e.event_type)
                });

                match event_type.as_deref() {
                    Some("response.output_text.delta") => {
                        if let Ok(event) = serde_json::from_str::<SseEvent>(data)
                            && !event.delta.is_empty()
                        {
                            chunk_count += 1;
                            total_content_len += event.delta.len();
                            if sender.send(StreamChunk::Content(event.delta)).await.is_err() {
                                warn!("Content chunk send failed: receiver dropped");
                                return Err(ProviderError::ChannelClosed);
                            }
                        }
                    }
                    Some("response.reasoning_summary_text.delta")
                    | Some("response.reasoning_text.delta") => {
                        if let Ok(event) = serde_json::from_str::<SseEvent>(data)
                            && !event.delta.is_empty()
                        {
                            chunk_count += 1;
                            if sender.send(StreamChunk::Thinking(event.delta)).await.is_err() {
                                warn!("Thinking chunk send failed: receiver dropped");
                                return Err(ProviderError::ChannelClosed);
                            }
                        }
                    }
                    Some("response.output_item.added") => {
                        if let Ok(event) = serde_json::from_str::<OutputItemAddedEvent>(data)
                            && event.item.item_type == "function_call"
                        {
                            debug!(
                                "Tool call started: {} (item_id={}, call_id={})",
                                event.item.name, event.item.id, event.item.call_id
                            );
                            pending_tools.insert(
                                event.item.id.clone(),
                                PendingToolCall {
                                    id: event.item.id,
                                    call_id: event.item.call_id,
                                    name: event.item.name,
                                },
                            );
                        }
                    }
                    Some("response.function_call_arguments.done") => {
                        let event = serde_json::from_str::<FunctionCallArgsDoneEvent>(data)
                            .map_err(|e| {
                                ProviderError::Parse(format!("function_call_arguments.done: {e}"))
                            })?;
                        let Some(pending) = pending_tools.remove(&event.item_id) else {
                            warn!(
                                "arguments.done for unknown item_id: {}, skipping",
                                event.item_id
                            );
                            continue;
                        };
                        let name = if event.name.is_empty() {
                            pending.name
                        } else {
                            event.name
                        };
                        debug!("Tool call complete: {} (call_id={})", name, pending.call_id);
                        chunk_count += 1;
                        let tool_call = ToolCall {
                            id: pending.id,
                            call_id: pending.call_id,
                            name,
                            arguments: event.arguments,
                        };
                        if sender.send(StreamChunk::ToolCall(tool_call)).await.is_err() {
                            warn!("ToolCall send failed: receiver dropped");
                            return Err(ProviderError::ChannelClosed);
                        }
                    }
                    Some("response.failed") | Some("error") => {
                        let message = serde_json::from_str::<FailedEvent>(data)
                            .ok()
                            .and_then(|e| {
                                e.response
                                    .and_then(|r| r.error)
                                    .map(|d| d.message)
                                    .or(e.message)
                            })
                            .unwrap_or_else(|| data.to_string());
                        warn!("OpenRouter stream failed: {}", message);
                        return Err(ProviderError::Api {
                            status: 500,
                            message,
                        });
                    }
                    Some("response.completed") => {
                        info!(
                            "Stream complete: {} chunks, {} content bytes",
                            chunk_count, total_content_len
                        );
                        return Ok(());
                    }
                    Some(other) => {
                        debug!("Ignoring event type '{}': {} bytes", other, data.len());
                    }
                    None => {
                        debug!("Could not parse event type from data: {}", data);
                    }
                }
            }
        }

        if !pending_tools.is_empty() {
            warn!(
                "Stream ended with {} unresolved tool call(s): {:?}",
                pending_tools.len(),
                pending_tools.keys().collect::<Vec<_>>()
            );
        }
        info!(
            "Stream ended: {} chunks processed, {} total content bytes",
            chunk_count, total_content_len
        );
        Ok(())
    }
}
