//! # Representation Tools
//!
//! The three builders. Each is a unit of configuration around the shared
//! [`Generator`], which renders the prompt, makes exactly one call and
//! validates what comes back.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use super::{QuestionArgs, Tool};
use crate::core::error::AgentError;
use crate::core::method::RepresentationMethod;
use crate::core::prompt;
use crate::core::validate::{RepairPolicy, Validated, validate};
use crate::inference::{CompletionProvider, CompletionRequest, Effort, complete};

/// Shared state for builder calls: the client and how to call it.
pub struct Generator {
    pub provider: Arc<dyn CompletionProvider>,
    pub model: String,
    pub effort: Effort,
    pub max_output_tokens: Option<u32>,
    pub policy: RepairPolicy,
}

impl Generator {
    /// One outbound call plus validation. No retries.
    pub async fn generate(
        &self,
        method: RepresentationMethod,
        question: &str,
    ) -> Result<Validated, AgentError> {
        let context = prompt::builder_context(method, question);
        let request = CompletionRequest {
            context: &context,
            model: &self.model,
            effort: self.effort,
            tools: &[],
            require_tool: false,
            json_output: true,
            max_output_tokens: self.max_output_tokens,
        };

        info!(
            "Generating {} scenario via {} (model={})",
            method,
            self.provider.name(),
            self.model
        );
        let completion = complete(self.provider.as_ref(), request).await?;
        debug!("Raw {} output: {}", method, completion.text);

        Ok(validate(method, &completion.text, self.policy)?)
    }
}

// ── Addition ────────────────────────────────────────────────────────────────

pub struct AdditionTool {
    generator: Arc<Generator>,
}

impl AdditionTool {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for AdditionTool {
    const METHOD: RepresentationMethod = RepresentationMethod::Addition;
    const DESCRIPTION: &'static str = "Constructs a representation of a math problem that requires \
        the user to add objects by dragging groups of them onto a single target.";

    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError> {
        self.generator.generate(Self::METHOD, &args.question).await
    }
}

// ── Deletion ────────────────────────────────────────────────────────────────

pub struct DeletionTool {
    generator: Arc<Generator>,
}

impl DeletionTool {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for DeletionTool {
    const METHOD: RepresentationMethod = RepresentationMethod::Deletion;
    const DESCRIPTION: &'static str = "Constructs a representation of a math problem that requires \
        the user to take objects away by clicking to delete them (subtraction).";

    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError> {
        self.generator.generate(Self::METHOD, &args.question).await
    }
}

// ── Division ────────────────────────────────────────────────────────────────

pub struct DivisionTool {
    generator: Arc<Generator>,
}

impl DivisionTool {
    pub fn new(generator: Arc<Generator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tool for DivisionTool {
    const METHOD: RepresentationMethod = RepresentationMethod::Division;
    const DESCRIPTION: &'static str = "Constructs a representation of a math problem that requires \
        the user to share objects equally by dragging them into groups.";

    async fn call(&self, args: QuestionArgs) -> Result<Validated, AgentError> {
        self.generator.generate(Self::METHOD, &args.question).await
    }
}
