//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::core::tools::Generator;
use crate::core::validate::RepairPolicy;
use crate::inference::{
    CompletionProvider, CompletionRequest, Effort, ProviderError, Source, StreamChunk, ToolCall,
};

/// One scripted provider response.
pub enum Reply {
    /// Content chunks, sent in order.
    Text(Vec<String>),
    /// Tool calls as `(name, arguments)`.
    Calls(Vec<(String, String)>),
    /// Content chunks, sent after a pause.
    Delayed(Duration, Vec<String>),
    Fail(fn() -> ProviderError),
    /// Never answers within any sane timeout.
    Hang,
}

impl Reply {
    pub fn text(chunks: &[&str]) -> Self {
        Reply::Text(chunks.iter().map(|c| c.to_string()).collect())
    }

    pub fn delayed(delay: Duration, chunks: &[&str]) -> Self {
        Reply::Delayed(delay, chunks.iter().map(|c| c.to_string()).collect())
    }

    pub fn calls(calls: &[(&str, &str)]) -> Self {
        Reply::Calls(
            calls
                .iter()
                .map(|(name, args)| (name.to_string(), args.to_string()))
                .collect(),
        )
    }
}

/// What the provider was asked, captured for assertions.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub model: String,
    pub effort: Effort,
    pub tool_count: usize,
    pub tool_names: Vec<String>,
    pub require_tool: bool,
    pub json_output: bool,
    pub directive: Option<String>,
    pub user_message: String,
}

/// Answers requests from a script, one reply per request.
///
/// Clones share the script and the request log.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Reply>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Counts one call as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedProvider {
    pub fn replies(replies: Vec<Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            ..Default::default()
        }
    }

    /// A single text reply.
    pub fn text(chunks: &[&str]) -> Self {
        Self::replies(vec![Reply::text(chunks)])
    }

    /// A single failing reply.
    pub fn failing(error: fn() -> ProviderError) -> Self {
        Self::replies(vec![Reply::Fail(error)])
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    /// Most calls that were ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        self.seen.lock().unwrap().push(SeenRequest {
            model: request.model.to_string(),
            effort: request.effort,
            tool_count: request.tools.len(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            require_tool: request.require_tool,
            json_output: request.json_output,
            directive: request.context.directive().map(str::to_string),
            user_message: request
                .context
                .turns()
                .filter(|seg| seg.source == Source::User)
                .map(|seg| seg.content.clone())
                .collect::<Vec<_>>()
                .join("\n"),
        });

        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(chunks)) => {
                for chunk in chunks {
                    sender
                        .send(StreamChunk::Content(chunk))
                        .await
                        .map_err(|_| ProviderError::ChannelClosed)?;
                }
                Ok(())
            }
            Some(Reply::Delayed(delay, chunks)) => {
                tokio::time::sleep(delay).await;
                for chunk in chunks {
                    sender
                        .send(StreamChunk::Content(chunk))
                        .await
                        .map_err(|_| ProviderError::ChannelClosed)?;
                }
                Ok(())
            }
            Some(Reply::Calls(calls)) => {
                for (i, (name, arguments)) in calls.into_iter().enumerate() {
                    let call = ToolCall {
                        id: format!("fc_{i}"),
                        call_id: format!("call_{i}"),
                        name,
                        arguments,
                    };
                    sender
                        .send(StreamChunk::ToolCall(call))
                        .await
                        .map_err(|_| ProviderError::ChannelClosed)?;
                }
                Ok(())
            }
            Some(Reply::Fail(error)) => Err(error()),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            None => Err(ProviderError::Protocol("script exhausted".into())),
        }
    }
}

/// A generator over `provider` with test defaults.
pub fn generator_with(provider: ScriptedProvider, policy: RepairPolicy) -> Arc<Generator> {
    Arc::new(Generator {
        provider: Arc::new(provider),
        model: "test-model".to_string(),
        effort: Effort::None,
        max_output_tokens: None,
        policy,
    })
}
