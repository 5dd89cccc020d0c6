use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, Sender};

use super::types::{Completion, Context, Effort, StreamChunk, ToolDefinition};

/// Errors that can occur during provider operations.
/// Variants carry enough info for the caller to decide on retryability.
#[derive(Debug)]
pub enum ProviderError {
    /// Provider misconfigured (missing API key, bad URL). Not retryable.
    Config(String),
    /// Network-level failure (DNS, connection refused, reset). Retryable.
    Network(String),
    /// The call did not finish within the configured bound. Retryable.
    Timeout(String),
    /// API returned an error response. Retryable if status >= 500 or 429.
    Api { status: u16, message: String },
    /// Failed to parse the provider's response envelope. Not retryable.
    Parse(String),
    /// The model answered, but not in the shape the caller asked for
    /// (e.g. no tool call when one was required). Retryable.
    Protocol(String),
    /// The mpsc channel was closed (caller dropped the receiver). Not retryable.
    ChannelClosed,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::Protocol(_) => {
                true
            }
            ProviderError::Api { status, .. } => *status >= 500 || *status == 429,
            ProviderError::Config(_) | ProviderError::Parse(_) | ProviderError::ChannelClosed => {
                false
            }
        }
    }

    /// Maps a transport error, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
            ProviderError::Network(msg) => write!(f, "network error: {msg}"),
            ProviderError::Timeout(msg) => write!(f, "timed out: {msg}"),
            ProviderError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ProviderError::Parse(msg) => write!(f, "parse error: {msg}"),
            ProviderError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ProviderError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Everything a provider needs to fulfill a completion request.
pub struct CompletionRequest<'a> {
    pub context: &'a Context,
    pub model: &'a str,
    pub effort: Effort,
    pub tools: &'a [ToolDefinition],
    /// Ask the model to call one of `tools` rather than answer in text.
    pub require_tool: bool,
    /// Ask the provider to constrain text output to a JSON object.
    pub json_output: bool,
    pub max_output_tokens: Option<u32>,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Streams a completion based on the given request, sending chunks to the provided channel.
    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError>;
}

/// Runs one request to completion and returns everything the model sent.
///
/// The provider and the receiving loop run on the same task; the loop ends
/// when the provider drops its sender.
pub async fn complete(
    provider: &dyn CompletionProvider,
    request: CompletionRequest<'_>,
) -> Result<Completion, ProviderError> {
    let (tx, mut rx) = mpsc::channel::<StreamChunk>(100);

    let drain = async {
        let mut completion = Completion::default();
        while let Some(chunk) = rx.recv().await {
            completion.push(chunk);
        }
        completion
    };

    let (result, completion) = tokio::join!(provider.stream_completion(request, tx), drain);
    result?;
    Ok(completion)
}
