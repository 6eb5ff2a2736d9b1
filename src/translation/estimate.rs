/*!
 * Token and cost estimation for a translation job.
 *
 * Chinese ideographs count as half a token each and every other character
 * as a quarter token. The completion is assumed to be about as long as the
 * prompt, so the cost uses both prices on the same token count.
 */

use log::{debug, warn};
use serde::Serialize;

use crate::errors::ProviderError;
use crate::providers::ModelCatalog;
use crate::providers::models::ModelInfo;
use crate::text_utils::count_cjk;

/// Allowance for instructions and message framing
pub const PROMPT_OVERHEAD_TOKENS: u64 = 200;

/// Estimated size and price of a translation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEstimate {
    pub estimated_tokens: u64,
    /// In USD
    pub estimated_cost: f64,
    /// Display name of the model, or its id when unknown
    pub model: String,
    /// True when the estimate is a rough fallback
    pub is_estimate_error: bool,
}

/// Approximate token count of a text, overhead included
pub fn estimate_tokens(text: &str) -> u64 {
    let cjk = count_cjk(text);
    let other = text.chars().count() - cjk;
    let weighted = cjk as f64 / 2.0 + other as f64 / 4.0;
    weighted.ceil() as u64 + PROMPT_OVERHEAD_TOKENS
}

/// Estimate tokens and cost; an unknown model is priced at zero
pub fn estimate_tokens_and_cost(text: &str, model_info: Option<&ModelInfo>, model_id: &str) -> TokenEstimate {
    let tokens = estimate_tokens(text);

    let (cost, model) = match model_info {
        Some(info) => {
            let per_token = (info.pricing.prompt + info.pricing.completion) / 1_000_000.0;
            let name = if info.name.is_empty() { model_id } else { &info.name };
            (per_token * tokens as f64, name.to_string())
        }
        None => {
            warn!("Model {} not found in available models, using zero pricing", model_id);
            (0.0, model_id.to_string())
        }
    };

    debug!("Token estimate: {} tokens, ${:.6}", tokens, cost);
    TokenEstimate {
        estimated_tokens: tokens,
        estimated_cost: cost,
        model,
        is_estimate_error: false,
    }
}

/// Rough estimate used when the model lookup fails
pub fn fallback_estimate(text: &str, model_id: &str) -> TokenEstimate {
    TokenEstimate {
        estimated_tokens: (text.chars().count() as u64).div_ceil(3) + PROMPT_OVERHEAD_TOKENS,
        estimated_cost: 0.0,
        model: model_id.to_string(),
        is_estimate_error: true,
    }
}

/// Estimate using pricing from the model catalog
pub async fn estimate_with_catalog(
    catalog: &ModelCatalog,
    text: &str,
    model_id: &str,
) -> Result<TokenEstimate, ProviderError> {
    if text.is_empty() || model_id.is_empty() {
        return Err(ProviderError::Config("Text and model are required".to_string()));
    }
    let info = catalog.find_model(model_id).await?;
    Ok(estimate_tokens_and_cost(text, info.as_ref(), model_id))
}
