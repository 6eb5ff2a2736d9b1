/*!
 * Post-translation quality check.
 *
 * The model grades the finished translation against the source text and
 * the project glossary. Its answer goes through response recovery and is
 * normalized into a `VerificationResult`.
 */

use log::info;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::{RecoveryError, TranslationError};
use crate::glossary::GlossaryEntry;
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::translation::prompts::verification_prompt;
use crate::translation::recovery::{Shape, recover};

/// Low temperature keeps the JSON answer stable
pub const VERIFICATION_TEMPERATURE: f32 = 0.2;

pub const VERIFICATION_MAX_TOKENS: u32 = 2000;

/// A problem the model found in the translation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Issue {
    pub source_text: String,
    pub translated_text: String,
    pub issue: String,
    pub suggestion: String,
}

/// Outcome of a verification pass; scores are percentages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    #[serde(deserialize_with = "percentage")]
    pub completeness: u8,
    #[serde(deserialize_with = "percentage")]
    pub accuracy: u8,
    #[serde(default)]
    pub missing_content: Vec<String>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl VerificationResult {
    /// Whether the model reported nothing to fix
    pub fn is_clean(&self) -> bool {
        self.missing_content.is_empty() && self.issues.is_empty()
    }
}

/// Accept any number (or numeric string) and clamp it to 0..=100
fn percentage<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match &value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| serde::de::Error::custom(format!("expected a percentage, got {}", value)))?;

    Ok(number.round().clamp(0.0, 100.0) as u8)
}

/// Ask the model to grade a translation
pub async fn verify_translation(
    provider: &dyn CompletionProvider,
    model: &str,
    source: &str,
    translation: &str,
    glossary: &[GlossaryEntry],
    cancel: &CancellationToken,
) -> Result<VerificationResult, TranslationError> {
    let request = CompletionRequest::new(verification_prompt(source, translation, glossary))
        .model(model)
        .temperature(VERIFICATION_TEMPERATURE)
        .max_tokens(VERIFICATION_MAX_TOKENS);
    let response = provider.complete(request, cancel).await?;

    let recovered = recover(provider, model, &response, Shape::Object, cancel).await?;
    let result: VerificationResult = serde_json::from_value(recovered.value).map_err(|e| {
        RecoveryError::Unrecoverable(format!("invalid verification report: {}", e))
    })?;

    info!(
        "Verification complete: completeness {}%, accuracy {}%, {} issue(s)",
        result.completeness,
        result.accuracy,
        result.issues.len()
    );
    Ok(result)
}
