//! Google Gemini provider using the Generative Language `generateContent` API.
//!
//! Unlike the Responses API this endpoint answers in one JSON document, so
//! the "stream" is a single batch of chunks sent after the body is decoded.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::inference::{
    CompletionProvider, CompletionRequest, ContextSegment, Effort, ProviderError, Source,
    StreamChunk, ToolCall, ToolDefinition,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    /// Set on thought-summary parts when thinking is enabled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Serialize, Debug)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ToolConfig {
    function_calling_config: FunctionCallingConfig,
}

#[derive(Serialize, Debug)]
struct FunctionCallingConfig {
    mode: &'static str,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ============================================================================
// Translation Layer
// ============================================================================

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// Splits the directive out into `systemInstruction`; everything else is a turn.
fn context_to_contents(items: &[ContextSegment]) -> (Option<Content>, Vec<Content>) {
    let system = items
        .iter()
        .find(|seg| seg.source == Source::Directive)
        .map(|seg| Content {
            role: None,
            parts: vec![text_part(&seg.content)],
        });

    let contents = items
        .iter()
        .filter_map(|seg| {
            match seg.source {
                Source::User => Some("user"),
                Source::Directive => None,
            }
            .map(|role| Content {
                role: Some(role),
                parts: vec![text_part(&seg.content)],
            })
        })
        .collect();

    (system, contents)
}

/// Maps our Effort enum to a thinking budget. `Auto` leaves it to the model.
fn effort_to_thinking(effort: Effort) -> Option<ThinkingConfig> {
    let thinking_budget = match effort {
        Effort::None => 0,
        Effort::Low => 1024,
        Effort::Medium => 8192,
        Effort::High => 24576,
        Effort::Auto => return None,
    };
    Some(ThinkingConfig { thinking_budget })
}

fn tools_to_api(tools: &[ToolDefinition]) -> Option<Vec<Tool>> {
    if tools.is_empty() {
        return None;
    }
    Some(vec![Tool {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    }])
}

fn build_request(request: &CompletionRequest<'_>) -> GenerateContentRequest {
    let (system_instruction, contents) = context_to_contents(&request.context.items);
    let tools = tools_to_api(request.tools);
    GenerateContentRequest {
        contents,
        system_instruction,
        tool_config: (request.require_tool && tools.is_some()).then_some(ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: "ANY" },
        }),
        tools,
        generation_config: GenerationConfig {
            thinking_config: effort_to_thinking(request.effort),
            response_mime_type: request.json_output.then_some("application/json"),
            max_output_tokens: request.max_output_tokens,
        },
    }
}

/// Turns the first candidate's parts into chunks, in order.
fn response_to_chunks(response: GenerateContentResponse) -> Result<Vec<StreamChunk>, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(ProviderError::Protocol(format!("empty response: {reason}")));
    };

    if let Some(reason) = candidate.finish_reason.as_deref()
        && reason != "STOP"
    {
        warn!("Gemini candidate finished with reason {}", reason);
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut chunks = Vec::with_capacity(parts.len());
    for (index, part) in parts.into_iter().enumerate() {
        if let Some(call) = part.function_call {
            chunks.push(StreamChunk::ToolCall(ToolCall {
                id: format!("fc_{index}"),
                call_id: format!("call_{index}"),
                name: call.name,
                arguments: call.args.to_string(),
            }));
        } else if let Some(text) = part.text {
            if part.thought {
                chunks.push(StreamChunk::Thinking(text));
            } else {
                chunks.push(StreamChunk::Content(text));
            }
        }
    }
    Ok(chunks)
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Gemini API provider (`x-goog-api-key` auth)
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Bounds each request, from connect until the body is fully read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let body = build_request(&request);

        info!(
            "Gemini generateContent request: model={}, turns={}, effort={:?}, tools={}",
            request.model,
            body.contents.len(),
            request.effort,
            request.tools.len(),
        );

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, request.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        debug!("Gemini response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let err_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Gemini API error: {} - {}", status, err_body);
            return Err(ProviderError::Api {
                status,
                message: err_body,
            });
        }

        let raw = response.text().await.map_err(ProviderError::from_reqwest)?;
        debug!("Raw Gemini response: {}", raw);
        let decoded: GenerateContentResponse = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Parse(format!("generateContent response: {e}")))?;

        let chunks = response_to_chunks(decoded)?;
        info!("Gemini response decoded: {} chunk(s)", chunks.len());
        for chunk in chunks {
            if sender.send(chunk).await.is_err() {
                warn!("Chunk send failed: receiver dropped");
                return Err(ProviderError::ChannelClosed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Context;

    #[test]
    fn test_directive_becomes_system_instruction() {
        let mut context = Context::with_directive("Route math questions.");
        context.add_user_message("12 / 4".to_string());

        let (system, contents) = context_to_contents(&context.items);
        let system = system.unwrap();
        assert!(system.role.is_none());
        assert_eq!(system.parts[0].text.as_deref(), Some("Route math questions."));
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].role, Some("user"));
    }

    #[test]
    fn test_effort_none_disables_thinking() {
        assert_eq!(
            effort_to_thinking(Effort::None),
            Some(ThinkingConfig { thinking_budget: 0 })
        );
        assert!(effort_to_thinking(Effort::Auto).is_none());
    }

    #[test]
    fn test_request_serialization_for_builder_call() {
        let mut context = Context::with_directive("d");
        context.add_user_message("q".to_string());
        let request = CompletionRequest {
            context: &context,
            model: "gemini-2.0-flash",
            effort: Effort::None,
            tools: &[],
            require_tool: false,
            json_output: true,
            max_output_tokens: Some(1024),
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], 0);
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "d");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "q");
        assert!(json.get("tools").is_none());
        assert!(json.get("toolConfig").is_none());
    }

    #[test]
    fn test_request_serialization_for_routing_call() {
        let context = Context::with_directive("d");
        let tools = vec![ToolDefinition {
            name: "division".into(),
            description: "Share objects into groups.".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let request = CompletionRequest {
            context: &context,
            model: "gemini-2.0-flash",
            effort: Effort::None,
            tools: &tools,
            require_tool: true,
            json_output: false,
            max_output_tokens: None,
        };
        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["tools"][0]["functionDeclarations"][0]["name"], "division");
        assert_eq!(json["toolConfig"]["functionCallingConfig"]["mode"], "ANY");
        assert!(json["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_response_to_chunks_text_and_calls() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "pondering", "thought": true},
                    {"functionCall": {"name": "deletion", "args": {"question": "15 - 5"}}},
                    {"text": "{}"}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let decoded: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let chunks = response_to_chunks(decoded).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(matches!(&chunks[0], StreamChunk::Thinking(t) if t == "pondering"));
        assert!(
            matches!(&chunks[1], StreamChunk::ToolCall(tc) if tc.name == "deletion" && tc.arguments.contains("15 - 5"))
        );
        assert!(matches!(&chunks[2], StreamChunk::Content(t) if t == "{}"));
    }

    #[test]
    fn test_response_without_candidates_is_protocol_error() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let decoded: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let result = response_to_chunks(decoded);
        assert!(matches!(result, Err(ProviderError::Protocol(msg)) if msg.contains("SAFETY")));
    }
}
