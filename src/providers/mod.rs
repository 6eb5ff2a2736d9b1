/*!
 * Completion service clients.
 *
 * - `openrouter`: OpenRouter chat completions, streaming and model listing
 * - `sse`: incremental decoder for server-sent event streams
 * - `models`: model metadata, categorization and the two-tier model cache
 * - `mock`: scripted provider used by tests
 */

use async_trait::async_trait;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderError;
use crate::providers::models::ModelInfo;

pub mod mock;
pub mod models;
pub mod openrouter;
pub mod sse;

pub use models::{ModelCatalog, ModelCategory};
pub use openrouter::OpenRouter;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion budget
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Smallest accepted completion budget
pub const MIN_MAX_TOKENS: u32 = 100;

/// Largest accepted completion budget
pub const MAX_MAX_TOKENS: u32 = 32000;

/// Keep the temperature in [0, 1]; NaN falls back to the default
pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        DEFAULT_TEMPERATURE
    } else {
        temperature.clamp(0.0, 1.0)
    }
}

pub fn clamp_max_tokens(max_tokens: u32) -> u32 {
    max_tokens.clamp(MIN_MAX_TOKENS, MAX_MAX_TOKENS)
}

/// A single-prompt completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model id; empty means the provider's configured model
    pub model: String,
    /// The user prompt
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the temperature, clamped to [0, 1]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = clamp_temperature(temperature);
        self
    }

    /// Set the completion budget, clamped to [100, 32000]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = clamp_max_tokens(max_tokens);
        self
    }
}

/// Common trait for completion services
///
/// The translation pipeline, response recovery and the assistant only talk
/// to this trait, so tests can swap in `mock::MockProvider`.
#[async_trait]
pub trait CompletionProvider: Send + Sync + Debug {
    /// Whether an API key and a model are available
    fn is_configured(&self) -> bool;

    /// The model used when a request does not name one
    fn default_model(&self) -> Option<String>;

    /// Complete a prompt and return the full text
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;

    /// Complete a prompt while reporting the accumulated text after every delta
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, ProviderError>;

    /// Text-capable models offered by the service
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    /// Abort the request currently in flight, if any
    fn cancel(&self);
}
