pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{complete, CompletionProvider, CompletionRequest, ProviderError};
pub use providers::{GeminiProvider, OpenRouterProvider};
pub use types::{Completion, Context, ContextSegment, Effort, Source, StreamChunk, ToolCall, ToolDefinition};
