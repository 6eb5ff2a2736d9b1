/*!
 * OpenRouter chat completion client.
 *
 * Every network call races a per-call deadline and a cancellation token.
 * Only one completion is tracked for cancellation at a time: starting a new
 * one replaces the token that `cancel` acts on.
 */

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, error};
use parking_lot::Mutex;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::app_config::OpenRouterConfig;
use crate::errors::{CancelReason, ProviderError};
use crate::providers::models::{ModelInfo, ModelSource, normalize_models};
use crate::providers::sse::{SseDecoder, SseEvent, delta_content};
use crate::providers::{CompletionProvider, CompletionRequest};

/// Public OpenRouter endpoint
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Value of the `HTTP-Referer` header
pub const DEFAULT_REFERER: &str = "https://quillsyncai.com";

/// Value of the `X-Title` header
pub const APP_TITLE: &str = "QuillSync AI";

/// Deadline of a completion call
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Deadline of a metadata call
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatCompletionBody {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    transforms: Vec<&'static str>,
}

/// Chat message format
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Result of `generate_completion`
#[derive(Debug)]
pub enum Completion {
    /// Full text of a non-streaming completion
    Text(String),
    /// Open response whose body is an SSE stream
    Stream(Response),
}

/// OpenRouter client
#[derive(Debug)]
pub struct OpenRouter {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    referer: String,
    completion_timeout: Duration,
    metadata_timeout: Duration,
    current: Mutex<CancellationToken>,
}

impl OpenRouter {
    /// Create a client for the public endpoint
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(METADATA_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            referer: DEFAULT_REFERER.to_string(),
            completion_timeout: COMPLETION_TIMEOUT,
            metadata_timeout: METADATA_TIMEOUT,
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn from_config(config: &OpenRouterConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_referer(config.referer.clone())
            .with_timeouts(
                Duration::from_secs(config.timeout_secs),
                Duration::from_secs(config.metadata_timeout_secs),
            )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_timeouts(mut self, completion: Duration, metadata: Duration) -> Self {
        self.completion_timeout = completion;
        self.metadata_timeout = metadata;
        self
    }

    /// Abort the completion currently in flight
    pub fn cancel(&self) {
        let token = self.current.lock().clone();
        if !token.is_cancelled() {
            debug!("Cancelling in-flight completion");
            token.cancel();
        }
    }

    fn begin_request(&self, external: &CancellationToken) -> CancellationToken {
        let token = external.child_token();
        *self.current.lock() = token.clone();
        token
    }

    fn resolve_model(&self, requested: &str) -> Result<String, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "OpenRouter API key is required. Please set it in the configuration.".to_string(),
            ));
        }

        let model = if requested.trim().is_empty() {
            self.model.trim()
        } else {
            requested.trim()
        };
        if model.is_empty() {
            return Err(ProviderError::Config("No OpenRouter model selected".to_string()));
        }

        Ok(model.to_string())
    }

    /// Build the request body for a completion
    pub fn request_body(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<ChatCompletionBody, ProviderError> {
        Ok(ChatCompletionBody {
            model: self.resolve_model(&request.model)?,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: crate::providers::clamp_temperature(request.temperature),
            max_tokens: crate::providers::clamp_max_tokens(request.max_tokens),
            stream,
            transforms: vec!["middle-out"],
        })
    }

    /// Send a completion request.
    ///
    /// Without streaming the full text is returned; with streaming the open
    /// response is returned once the headers arrive, for `read_stream`.
    pub async fn generate_completion(
        &self,
        request: &CompletionRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<Completion, ProviderError> {
        let body = self.request_body(request, stream)?;
        let token = self.begin_request(cancel);

        guarded(&token, self.completion_timeout, async {
            let response = self.send_completion(&body).await?;
            if stream {
                Ok(Completion::Stream(response))
            } else {
                Ok(Completion::Text(parse_completion_text(response).await?))
            }
        })
        .await
    }

    /// Decode a streamed completion, reporting the accumulated text after each delta
    ///
    /// Fails with `TimedOut` when the server sends nothing for `idle_timeout`.
    pub async fn read_stream(
        response: Response,
        cancel: &CancellationToken,
        idle_timeout: Duration,
        on_delta: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, ProviderError> {
        let mut stream = std::pin::pin!(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut full_text = String::new();

        while let Some(chunk) = tokio::select! {
            chunk = tokio::time::timeout(idle_timeout, stream.next()) => {
                chunk.map_err(|_| ProviderError::Cancelled { reason: CancelReason::TimedOut })?
            }
            _ = cancel.cancelled() => {
                return Err(ProviderError::Cancelled { reason: CancelReason::UserCancelled });
            }
        } {
            let bytes = chunk.map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
            if apply_events(decoder.push(&bytes), &mut full_text, on_delta) {
                return Ok(full_text);
            }
        }

        apply_events(decoder.finish(), &mut full_text, on_delta);
        Ok(full_text)
    }

    /// Check the key by listing models; returns how many were found
    pub async fn test_connection(&self) -> Result<usize, ProviderError> {
        Ok(self.list_models().await?.len())
    }

    async fn send_completion(&self, body: &ChatCompletionBody) -> Result<Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Generating completion with model: {}, streaming: {}",
            body.model, body.stream
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", APP_TITLE)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        check_status(response).await
    }
}

/// Race a request against the deadline and the token
async fn guarded<T, F>(
    token: &CancellationToken,
    limit: Duration,
    request: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if token.is_cancelled() {
        return Err(ProviderError::Cancelled {
            reason: CancelReason::UserCancelled,
        });
    }

    tokio::select! {
        _ = token.cancelled() => Err(ProviderError::Cancelled { reason: CancelReason::UserCancelled }),
        outcome = tokio::time::timeout(limit, request) => {
            outcome.unwrap_or(Err(ProviderError::Cancelled { reason: CancelReason::TimedOut }))
        }
    }
}

/// Append deltas; returns true once `[DONE]` was seen
fn apply_events(
    events: Vec<SseEvent>,
    full_text: &mut String,
    on_delta: &(dyn for<'a> Fn(&'a str) + Send + Sync),
) -> bool {
    for event in events {
        match event {
            SseEvent::Done => return true,
            SseEvent::Data(payload) => {
                if let Some(content) = delta_content(&payload) {
                    full_text.push_str(&content);
                    on_delta(full_text);
                }
            }
        }
    }
    false
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    error!("OpenRouter API error ({}): {}", status, text);
    Err(classify_status(status.as_u16(), &text))
}

async fn parse_completion_text(response: Response) -> Result<String, ProviderError> {
    let data: Value = response
        .json()
        .await
        .map_err(|e| ProviderError::ParseError(e.to_string()))?;

    data.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            error!("Unexpected completion response format: {}", data);
            ProviderError::MalformedResponse(
                "Invalid response format from OpenRouter API".to_string(),
            )
        })
}

/// Error message of an API error body: `error.message`, `message`, or the raw text
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Map an HTTP error status and body to a provider error
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let message = error_message(body);
    match status {
        401 => ProviderError::Authentication(message),
        429 => ProviderError::RateLimitExceeded(message),
        400 if message.to_lowercase().contains("context") => {
            ProviderError::ContextTooLarge(message)
        }
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}

#[async_trait]
impl ModelSource for OpenRouter {
    async fn fetch_models(&self) -> Result<Value, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::Config(
                "OpenRouter API key is required. Please set it in the configuration.".to_string(),
            ));
        }

        let url = format!("{}/models", self.base_url);
        debug!("Fetching models from OpenRouter API: {}", url);

        guarded(&CancellationToken::new(), self.metadata_timeout, async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .header("HTTP-Referer", &self.referer)
                .header("X-Title", APP_TITLE)
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

            check_status(response)
                .await?
                .json::<Value>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl CompletionProvider for OpenRouter {
    fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.model.trim().is_empty()
    }

    fn default_model(&self) -> Option<String> {
        let model = self.model.trim();
        (!model.is_empty()).then(|| model.to_string())
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        match self.generate_completion(&request, false, cancel).await? {
            Completion::Text(text) => Ok(text),
            Completion::Stream(_) => Err(ProviderError::MalformedResponse(
                "Unexpected streaming response".to_string(),
            )),
        }
    }

    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String, ProviderError> {
        let body = self.request_body(&request, true)?;
        let token = self.begin_request(cancel);

        // The deadline covers the headers; after that it bounds each gap between reads
        let response = guarded(&token, self.completion_timeout, self.send_completion(&body)).await?;
        Self::read_stream(response, &token, self.completion_timeout, on_delta).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let raw = self.fetch_models().await?;
        Ok(normalize_models(&raw))
    }

    fn cancel(&self) {
        OpenRouter::cancel(self);
    }
}
