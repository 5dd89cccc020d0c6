//! # Method Router
//!
//! Decides which builder handles a question. The decision itself belongs to
//! whoever implements [`MethodSelector`]; the contract is that exactly one
//! method comes back and the question is forwarded unmodified.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::core::error::AgentError;
use crate::core::method::RepresentationMethod;
use crate::core::prompt;
use crate::core::tools::{QuestionArgs, ToolRegistry};
use crate::inference::{CompletionProvider, CompletionRequest, Effort, ProviderError, complete};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub method: RepresentationMethod,
    /// The question as the caller asked it.
    pub question: String,
}

#[async_trait]
pub trait MethodSelector: Send + Sync {
    async fn select(&self, question: &str) -> Result<Selection, AgentError>;
}

/// Always picks the same method. Makes no external call.
pub struct FixedSelector(pub RepresentationMethod);

#[async_trait]
impl MethodSelector for FixedSelector {
    async fn select(&self, question: &str) -> Result<Selection, AgentError> {
        debug!("Fixed selection: {}", self.0);
        Ok(Selection {
            method: self.0,
            question: question.to_string(),
        })
    }
}

/// Lets the hosted model choose by calling one of the registry's tools.
pub struct ModelSelector {
    provider: Arc<dyn CompletionProvider>,
    registry: Arc<ToolRegistry>,
    model: String,
    effort: Effort,
}

impl ModelSelector {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        registry: Arc<ToolRegistry>,
        model: String,
        effort: Effort,
    ) -> Self {
        Self {
            provider,
            registry,
            model,
            effort,
        }
    }
}

#[async_trait]
impl MethodSelector for ModelSelector {
    async fn select(&self, question: &str) -> Result<Selection, AgentError> {
        let context = prompt::router_context(question);
        let tools = self.registry.definitions();
        let request = CompletionRequest {
            context: &context,
            model: &self.model,
            effort: self.effort,
            tools: &tools,
            require_tool: true,
            json_output: false,
            max_output_tokens: None,
        };

        let completion = complete(self.provider.as_ref(), request).await?;

        let call = match completion.tool_calls.as_slice() {
            [call] => call,
            [] => {
                warn!("Router returned no tool call; text: {:?}", completion.text);
                return Err(ProviderError::Protocol("model did not select a method".into()).into());
            }
            calls => {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                warn!("Router returned {} tool calls: {:?}", calls.len(), names);
                return Err(ProviderError::Protocol(format!(
                    "model selected {} methods ({}), expected exactly one",
                    calls.len(),
                    names.join(", ")
                ))
                .into());
            }
        };

        let method = self.registry.resolve(&call.name)?;

        let args: QuestionArgs = serde_json::from_str(&call.arguments).map_err(|e| {
            ProviderError::Protocol(format!("malformed arguments for {}: {e}", call.name))
        })?;
        if args.question != question {
            debug!(
                "Router rewrote the question to {:?}; forwarding the original",
                args.question
            );
        }

        info!("Router selected {} (call_id={})", method, call.call_id);
        Ok(Selection {
            method,
            question: question.to_string(),
        })
    }
}
