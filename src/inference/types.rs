use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Source {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "system")]
    Directive,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContextSegment {
    #[serde(rename = "role")]
    pub source: Source,
    pub content: String,
}

/// Helper function to replace typographic characters with ASCII equivalents.
pub(crate) fn replace_typography(text: &str) -> String {
    text.replace(['‘', '’'], "'") // Single quotes
        .replace(['“', '”'], "\"") // Double quotes
        .replace('—', "--") // Em dash
        .replace('…', "...") // Ellipsis
}

/// The model input for a single request: one directive plus one user turn.
///
/// Every request starts from scratch, so there is no history to carry.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Context {
    pub items: Vec<ContextSegment>,
}

impl Context {
    /// Creates a Context holding only the given system directive.
    pub fn with_directive(directive: impl Into<String>) -> Self {
        Context {
            items: vec![ContextSegment {
                source: Source::Directive,
                content: directive.into(),
            }],
        }
    }

    /// Adds a new ContextSegment and returns a reference to it.
    pub fn add(&mut self, segment: ContextSegment) -> &ContextSegment {
        let index = self.items.len();
        self.items.push(segment);
        &self.items[index]
    }

    pub fn add_user_message(&mut self, content: String) -> &ContextSegment {
        self.add(ContextSegment {
            source: Source::User,
            content,
        })
    }

    /// The system directive, if the first item is one.
    pub fn directive(&self) -> Option<&str> {
        self.items
            .first()
            .filter(|seg| seg.source == Source::Directive)
            .map(|seg| seg.content.as_str())
    }

    /// Non-directive turns, in order.
    pub fn turns(&self) -> impl Iterator<Item = &ContextSegment> {
        self.items.iter().filter(|seg| seg.source != Source::Directive)
    }
}

/// Effort level for reasoning tokens
/// Higher effort = more reasoning tokens = better quality but higher cost
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub enum Effort {
    /// Thorough analysis - model takes more time to reason
    #[serde(rename = "high")]
    High,
    /// Balanced reasoning
    #[serde(rename = "medium")]
    Medium,
    /// Quick thinking - faster but less thorough
    #[serde(rename = "low")]
    Low,
    /// Model decides whether and how much to reason
    #[serde(rename = "auto")]
    Auto,
    /// Disables reasoning entirely (default: scenarios are short and templated)
    #[serde(rename = "none")]
    #[default]
    None,
}

impl Effort {
    /// Returns a human-readable label for display
    pub fn label(self) -> &'static str {
        match self {
            Effort::High => "High",
            Effort::Medium => "Medium",
            Effort::Low => "Low",
            Effort::Auto => "Auto",
            Effort::None => "Off",
        }
    }
}

/// A tool the model can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// A completed tool call from the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,       // API object ID (e.g. "fc_abc123")
    pub call_id: String,  // Correlation ID (e.g. "call_xyz789")
    pub name: String,
    pub arguments: String, // JSON string
}

/// Represents a chunk of streamed content from the model.
#[derive(Debug)]
pub enum StreamChunk {
    Content(String),
    Thinking(String),
    ToolCall(ToolCall), // Complete tool call (arguments buffered by provider)
}

/// Everything a provider sent back for one request, once the stream is drained.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    /// Folds one chunk into the completion. Thinking is dropped.
    pub fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::Content(text) => self.text.push_str(&text),
            StreamChunk::Thinking(_) => {}
            StreamChunk::ToolCall(tc) => self.tool_calls.push(tc),
        }
    }
}
