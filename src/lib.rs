//! mathscene library exports for the binary and tests

use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub mod core;
pub mod inference;

#[cfg(test)]
pub mod test_support;

use crate::core::config::ResolvedConfig;
use crate::inference::{CompletionProvider, GeminiProvider, OpenRouterProvider};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    #[value(name = "openrouter")]
    OpenRouter,
}

/// Builds the one shared client for the resolved provider.
pub fn connect(config: &ResolvedConfig) -> Arc<dyn CompletionProvider> {
    match config.provider {
        Provider::Gemini => Arc::new(
            GeminiProvider::new(config.api_key.clone(), config.base_url.clone())
                .with_timeout(config.request_timeout),
        ),
        Provider::OpenRouter => Arc::new(
            OpenRouterProvider::new(config.api_key.clone(), config.base_url.clone())
                .with_timeout(config.request_timeout),
        ),
    }
}
