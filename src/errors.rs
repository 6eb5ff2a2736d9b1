/*!
 * Error types for the QuillSync application.
 *
 * Each component has its own error enum, defined with thiserror. The
 * translation and application layers wrap the lower-level errors so the
 * classification of a failure survives up to the user-facing message.
 */

use std::fmt;

use thiserror::Error;

/// Errors raised by the glossary store
#[derive(Error, Debug)]
pub enum GlossaryError {
    /// A required field is missing or empty
    #[error("Validation error: {0}")]
    Validation(String),

    /// The Chinese term already exists in the project
    #[error("A glossary entry for \"{term}\" already exists")]
    Duplicate {
        /// The conflicting term
        term: String,
    },

    /// No entry with this id
    #[error("Glossary entry with ID \"{id}\" not found")]
    NotFound {
        /// The unknown id
        id: String,
    },

    /// Import payload is not usable
    #[error("{0}")]
    Format(String),

    /// Term substitution could not be prepared
    #[error("Glossary substitution failed: {0}")]
    Substitution(String),

    /// The durable store failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for GlossaryError {
    fn from(error: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", error))
    }
}

/// Why an in-flight request was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The per-call deadline elapsed
    TimedOut,
    /// Someone called cancel
    UserCancelled,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::TimedOut => write!(f, "timed out"),
            CancelReason::UserCancelled => write!(f, "cancelled by user"),
        }
    }
}

/// Errors that can occur when working with the completion service
#[derive(Error, Debug)]
pub enum ProviderError {
    /// API key or model missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The prompt does not fit in the model's context window
    #[error("Context too large: {0}")]
    ContextTooLarge(String),

    /// The request was aborted before a response arrived
    #[error("Request {reason}")]
    Cancelled {
        /// Timeout or explicit cancellation
        reason: CancelReason,
    },

    /// The response parsed but lacks the expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether this error came from a cancelled or timed-out request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProviderError::Cancelled { .. })
    }

    /// Whether this error came from an explicit cancel call
    pub fn is_user_cancellation(&self) -> bool {
        matches!(
            self,
            ProviderError::Cancelled {
                reason: CancelReason::UserCancelled
            }
        )
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::Config(msg) => format!("AI is not configured: {}", msg),
            ProviderError::Authentication(_) => {
                "Authentication failed. Please check your OpenRouter API key.".to_string()
            }
            ProviderError::RateLimitExceeded(_) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            ProviderError::ContextTooLarge(_) => {
                "The text is too long for this model. Try a smaller chunk size.".to_string()
            }
            ProviderError::Cancelled {
                reason: CancelReason::TimedOut,
            } => "The request timed out. Please try again.".to_string(),
            ProviderError::Cancelled {
                reason: CancelReason::UserCancelled,
            } => "The request was cancelled.".to_string(),
            ProviderError::ApiError {
                status_code,
                message,
            } => format!("OpenRouter API error ({}): {}", status_code, message),
            other => other.to_string(),
        }
    }
}

/// Errors from the structured response recovery pipeline
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// No stage produced data of the expected shape
    #[error("Could not recover structured data from the response: {0}")]
    Unrecoverable(String),

    /// The correction request failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Another translation job is already running
    #[error("A translation is already in progress")]
    Busy,

    /// Chunking produced nothing to translate
    #[error("No content to translate")]
    NoContent,

    /// API key or model missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the glossary store
    #[error("Glossary error: {0}")]
    Glossary(#[from] GlossaryError),

    /// Structured output could not be recovered
    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),
}

impl TranslationError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            TranslationError::Provider(e) => e.user_message(),
            TranslationError::Recovery(RecoveryError::Provider(e)) => e.user_message(),
            other => other.to_string(),
        }
    }
}
