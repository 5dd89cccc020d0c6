//! # Agent
//!
//! Runs one question through the pipeline:
//!
//! ```text
//! Received ─▶ MethodSelected ─▶ BuilderInvoked ─▶ Validated ─▶ Returned
//!     │              │                 │               │
//!     └──────────────┴─────────────────┴───────────────┴──▶ Failed
//! ```
//!
//! Requests share nothing but the provider client. A semaphore bounds how
//! many are talking to the provider at once, and each one is cut off after
//! the configured timeout. Dropping the returned future cancels the
//! in-flight HTTP call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{info, warn};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::core::config::ResolvedConfig;
use crate::core::error::AgentError;
use crate::core::method::RepresentationMethod;
use crate::core::router::{FixedSelector, MethodSelector, ModelSelector};
use crate::core::scenario::Scenario;
use crate::core::tools::{Generator, ToolRegistry, default_registry};
use crate::core::validate::{Correction, validate_question};
use crate::inference::{CompletionProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    MethodSelected,
    BuilderInvoked,
    Validated,
    Returned,
    Failed,
}

/// A fully validated result for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub request_id: Uuid,
    pub method: RepresentationMethod,
    pub scenario: Scenario,
    /// Repairs applied under the clamp policy; empty when strict.
    pub corrections: Vec<Correction>,
}

pub struct Agent {
    selector: Arc<dyn MethodSelector>,
    registry: Arc<ToolRegistry>,
    limiter: Arc<Semaphore>,
    timeout: Duration,
}

impl Agent {
    pub fn new(
        selector: Arc<dyn MethodSelector>,
        registry: Arc<ToolRegistry>,
        max_concurrent_requests: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            selector,
            registry,
            limiter: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            timeout,
        }
    }

    /// Wires the builders and the router around one shared provider.
    ///
    /// `fixed` skips routing and sends every question to that builder.
    pub fn from_config(
        config: &ResolvedConfig,
        provider: Arc<dyn CompletionProvider>,
        fixed: Option<RepresentationMethod>,
    ) -> Self {
        let generator = Arc::new(Generator {
            provider: provider.clone(),
            model: config.model_name.clone(),
            effort: config.effort,
            max_output_tokens: Some(config.max_output_tokens),
            policy: config.repair_policy,
        });
        let registry = Arc::new(default_registry(generator));
        let selector: Arc<dyn MethodSelector> = match fixed {
            Some(method) => Arc::new(FixedSelector(method)),
            None => Arc::new(ModelSelector::new(
                provider,
                registry.clone(),
                config.model_name.clone(),
                config.effort,
            )),
        };
        Self::new(
            selector,
            registry,
            config.max_concurrent_requests,
            config.request_timeout,
        )
    }

    /// Answers one question, or says exactly why it could not.
    pub async fn answer(&self, question: &str) -> Result<Answer, AgentError> {
        let request_id = Uuid::new_v4();
        transition(request_id, Stage::Received);

        let result = self.answer_inner(request_id, question).await;
        match &result {
            Ok(answer) => {
                transition(request_id, Stage::Returned);
                info!("[{}] answered with {}", request_id, answer.method);
            }
            Err(e) => {
                transition(request_id, Stage::Failed);
                warn!("[{}] failed ({}): {}", request_id, e.kind(), e);
            }
        }
        result
    }

    /// Answers many questions concurrently; results keep the input order.
    pub async fn answer_all(&self, questions: &[String]) -> Vec<Result<Answer, AgentError>> {
        join_all(questions.iter().map(|q| self.answer(q))).await
    }

    async fn answer_inner(&self, request_id: Uuid, question: &str) -> Result<Answer, AgentError> {
        validate_question(question)?;

        // Queueing for a permit does not count against the timeout.
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ProviderError::ChannelClosed)?;

        match tokio::time::timeout(self.timeout, self.run(request_id, question)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "request did not finish within {}s",
                self.timeout.as_secs_f64()
            ))
            .into()),
        }
    }

    async fn run(&self, request_id: Uuid, question: &str) -> Result<Answer, AgentError> {
        let selection = self.selector.select(question).await?;
        transition(request_id, Stage::MethodSelected);

        transition(request_id, Stage::BuilderInvoked);
        let validated = self
            .registry
            .execute(selection.method, &selection.question)
            .await?;
        transition(request_id, Stage::Validated);

        Ok(Answer {
            request_id,
            method: selection.method,
            scenario: validated.scenario,
            corrections: validated.corrections,
        })
    }
}

fn transition(request_id: Uuid, stage: Stage) {
    info!("[{}] -> {:?}", request_id, stage);
}
