//! # Tool Registry
//!
//! Each representation builder is a tool: a unit of work the routing model
//! can pick by name. Tools implement the typed [`Tool`] trait; the registry
//! erases them behind [`DynTool`] and keys them by [`RepresentationMethod`],
//! so a missing builder is a lookup miss rather than a string typo.

pub mod representation;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::error::AgentError;
use crate::core::method::RepresentationMethod;
use crate::core::validate::Validated;
use crate::inference::ToolDefinition;

pub use representation::{AdditionTool, DeletionTool, DivisionTool, Generator};

/// Arguments every builder takes.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QuestionArgs {
    /// The math problem that needs to be represented and solved, exactly as the user asked it.
    pub question: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    const METHOD: RepresentationMethod;
    const DESCRIPTION: &'static str;

    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError>;
}

/// Object-safe view of a [`Tool`].
#[async_trait]
pub trait DynTool: Send + Sync {
    fn method(&self) -> RepresentationMethod;
    fn definition(&self) -> ToolDefinition;
    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError>;
}

#[async_trait]
impl<T: Tool> DynTool for T {
    fn method(&self) -> RepresentationMethod {
        T::METHOD
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: T::METHOD.as_str().to_string(),
            description: T::DESCRIPTION.to_string(),
            parameters: parameters_schema::<QuestionArgs>(),
        }
    }

    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError> {
        Tool::call(self, args).await
    }
}

/// JSON Schema for a tool's arguments, trimmed to what function-calling APIs accept.
pub fn parameters_schema<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        if obj.get("definitions").is_some_and(|d| d.as_object().is_some_and(|d| d.is_empty())) {
            obj.remove("definitions");
        }
    }
    value
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<RepresentationMethod, Arc<dyn DynTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any earlier one for the same method.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        debug!("Registering tool '{}'", T::METHOD);
        self.tools.insert(T::METHOD, Arc::new(tool));
    }

    pub fn contains(&self, method: RepresentationMethod) -> bool {
        self.tools.contains_key(&method)
    }

    /// Registered methods, in declaration order.
    pub fn methods(&self) -> Vec<RepresentationMethod> {
        RepresentationMethod::ALL
            .into_iter()
            .filter(|m| self.contains(*m))
            .collect()
    }

    /// Tool definitions for the routing model, in declaration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.methods()
            .into_iter()
            .filter_map(|m| self.tools.get(&m).map(|t| t.definition()))
            .collect()
    }

    /// Resolves a tool name from the routing model to a registered method.
    pub fn resolve(&self, name: &str) -> Result<RepresentationMethod, AgentError> {
        name.parse::<RepresentationMethod>()
            .ok()
            .filter(|m| self.contains(*m))
            .ok_or_else(|| AgentError::UnsupportedMethod(name.to_string()))
    }

    /// Runs the builder for `method` on `question`.
    pub async fn execute(
        &self,
        method: RepresentationMethod,
        question: &str,
    ) -> Result<Validated, AgentError> {
        let tool = self
            .tools
            .get(&method)
            .ok_or_else(|| AgentError::UnsupportedMethod(method.to_string()))?;
        info!("Executing tool '{}'", method);
        tool.call(QuestionArgs {
            question: question.to_string(),
        })
        .await
    }
}

/// Registry with all three builders sharing one generator.
pub fn default_registry(generator: Arc<Generator>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AdditionTool::new(generator.clone()));
    registry.register(DeletionTool::new(generator.clone()));
    registry.register(DivisionTool::new(generator));
    registry
}
