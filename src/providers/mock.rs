/*!
 * Mock completion provider for testing.
 *
 * Behaviors:
 * - `MockProvider::working()` - echoes the last prompt paragraph as a translation
 * - `MockProvider::scripted(..)` - returns queued responses in order, then works
 * - `MockProvider::failing()` - always fails with an API error
 * - `MockProvider::slow(..)` - waits before answering; honors cancellation
 */

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::errors::{CancelReason, ProviderError};
use crate::providers::models::{ModelInfo, ModelSource, normalize_models};
use crate::providers::{CompletionProvider, CompletionRequest};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a translation of the prompt's last paragraph
    Working,
    /// Fails every Nth request
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Waits before succeeding
    Slow { delay_ms: u64 },
}

/// Mock provider for testing pipeline behavior
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    configured: bool,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    scripted: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    models: Arc<Mutex<Option<Value>>>,
    current: Arc<Mutex<CancellationToken>>,
}

impl MockProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            configured: true,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            scripted: Arc::new(Mutex::new(VecDeque::new())),
            models: Arc::new(Mutex::new(Some(json!({"data": [
                {"id": "mock/translator", "name": "Mock Translator",
                 "pricing": {"prompt": 1.0, "completion": 2.0}, "context_length": 32000}
            ]})))),
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Working provider that first returns the given responses in order
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::working();
        for response in responses {
            provider.push_response(response);
        }
        provider
    }

    /// Pretend no API key or model is configured
    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Raw listing returned by `fetch_models`; `None` makes it fail
    pub fn with_models(self, models: Option<Value>) -> Self {
        *self.models.lock() = models;
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.scripted.lock().push_back(Ok(response.into()));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.scripted.lock().push_back(Err(error));
    }

    /// Number of completion requests received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of all completion requests received
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// The text the working behavior returns for a prompt
    pub fn translation_of(prompt: &str) -> String {
        let tail = prompt.rsplit("\n\n").next().unwrap_or(prompt);
        format!("[TRANSLATED] {}", tail.trim())
    }

    fn begin_request(&self, external: &CancellationToken) -> CancellationToken {
        let token = external.child_token();
        *self.current.lock() = token.clone();
        token
    }

    async fn respond(
        &self,
        request: &CompletionRequest,
        token: &CancellationToken,
    ) -> Result<String, ProviderError> {
        if !self.configured {
            return Err(ProviderError::Config("Mock provider is not configured".to_string()));
        }

        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if token.is_cancelled() {
            return Err(ProviderError::Cancelled {
                reason: CancelReason::UserCancelled,
            });
        }

        if let Some(scripted) = self.scripted.lock().pop_front() {
            return scripted;
        }

        match self.behavior {
            MockBehavior::Working => Ok(Self::translation_of(&request.prompt)),
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(Self::translation_of(&request.prompt))
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Slow { delay_ms } => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                        Ok(Self::translation_of(&request.prompt))
                    }
                    _ = token.cancelled() => Err(ProviderError::Cancelled {
                        reason: CancelReason::UserCancelled,
                    }),
                }
            }
        }
    }
}

#[async_trait]
impl ModelSource for MockProvider {
    async fn fetch_models(&self) -> Result<Value, ProviderError> {
        self.models.lock().clone().ok_or_else(|| ProviderError::ApiError {
            status_code: 503,
            message: "Simulated model listing failure".to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn default_model(&self) -> Option<String> {
        self.configured.then(|| "mock/translator".to_string())
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let token = self.begin_request(cancel);
        self.respond(&request, &token).await
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, ProviderError> {
        let token = self.begin_request(cancel);
        let text = self.respond(&request, &token).await?;

        // Deliver in a few pieces so callers see partial updates
        let chars: Vec<char> = text.chars().collect();
        let piece = chars.len().div_ceil(3).max(1);
        let mut accumulated = String::new();
        for part in chars.chunks(piece) {
            if token.is_cancelled() {
                return Err(ProviderError::Cancelled {
                    reason: CancelReason::UserCancelled,
                });
            }
            accumulated.extend(part);
            on_delta(&accumulated);
            tokio::task::yield_now().await;
        }

        Ok(text)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(normalize_models(&self.fetch_models().await?))
    }

    fn cancel(&self) {
        self.current.lock().cancel();
    }
}
