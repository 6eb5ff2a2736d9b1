/*!
 * AI-assisted glossary extraction.
 *
 * The model proposes terms for a sample of the source text. The answer is
 * recovered as a JSON array, validated, and optionally stored with the
 * same duplicate rules as a merge import.
 */

use std::collections::HashSet;

use log::info;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::{GlossaryError, TranslationError};
use crate::glossary::{ExportedEntry, GlossaryEntry, GlossaryStore, ImportStats, NewGlossaryEntry};
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::translation::prompts::glossary_extraction_prompt;
use crate::translation::recovery::{Shape, recover};

pub const GENERATION_TEMPERATURE: f32 = 0.3;

pub const GENERATION_MAX_TOKENS: u32 = 4096;

/// Result of a glossary generation run
#[derive(Debug, Clone, Default)]
pub struct GeneratedGlossary {
    /// Every valid term the model proposed
    pub proposed: Vec<NewGlossaryEntry>,
    /// Entries written to the store (empty unless auto-add)
    pub added: Vec<GlossaryEntry>,
    pub stats: ImportStats,
}

/// Extract glossary terms from `text` with the model's help
pub async fn generate_glossary_entries(
    provider: &dyn CompletionProvider,
    store: &GlossaryStore,
    project_id: &str,
    text: &str,
    auto_add: bool,
    fandom_context: &str,
    cancel: &CancellationToken,
) -> Result<GeneratedGlossary, TranslationError> {
    if project_id.trim().is_empty() {
        return Err(GlossaryError::Validation("Project ID is required".to_string()).into());
    }
    if text.trim().is_empty() {
        return Err(TranslationError::NoContent);
    }
    if !provider.is_configured() {
        return Err(TranslationError::Config(
            "OpenRouter API key is required. Please configure it first.".to_string(),
        ));
    }

    let model = provider.default_model().unwrap_or_default();
    if fandom_context.is_empty() {
        info!("Generating glossary entries for project {}", project_id);
    } else {
        info!(
            "Generating glossary entries for project {} with \"{}\" context",
            project_id, fandom_context
        );
    }

    let request = CompletionRequest::new(glossary_extraction_prompt(text, fandom_context))
        .model(model.as_str())
        .temperature(GENERATION_TEMPERATURE)
        .max_tokens(GENERATION_MAX_TOKENS);
    let response = provider.complete(request, cancel).await?;
    let recovered = recover(provider, &model, &response, Shape::Array, cancel).await?;

    let proposed = into_new_entries(project_id, recovered.value);

    if auto_add {
        let (added, stats) = store.add_generated(project_id, proposed.clone()).await?;
        info!("Generated glossary for project {}: {}", project_id, stats);
        return Ok(GeneratedGlossary {
            proposed,
            added,
            stats,
        });
    }

    let existing: HashSet<String> = store
        .entries(project_id)
        .await?
        .into_iter()
        .map(|e| e.chinese_term)
        .collect();
    let stats = ImportStats {
        total: proposed.len(),
        skipped: proposed
            .iter()
            .filter(|e| existing.contains(&e.chinese_term))
            .count(),
        ..ImportStats::default()
    };

    Ok(GeneratedGlossary {
        proposed,
        added: Vec::new(),
        stats,
    })
}

fn into_new_entries(project_id: &str, value: Value) -> Vec<NewGlossaryEntry> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ExportedEntry>(item).ok())
        .map(|e| {
            NewGlossaryEntry::new(project_id, &e.chinese_term, &e.translation)
                .category(e.category)
                .notes(&e.notes)
        })
        .collect()
}
