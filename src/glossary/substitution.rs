/*!
 * Glossary term substitution.
 *
 * All terms are compiled into one alternation ordered longest first. The
 * regex engine prefers earlier alternatives at a given position, so a longer
 * term always wins over a term it contains, and replaced text is never
 * scanned again.
 */

use std::collections::HashMap;

use regex::{Captures, Regex};

use crate::errors::GlossaryError;
use crate::glossary::models::GlossaryEntry;

/// Replace every glossary term in `text` with its translation
pub fn apply_glossary(text: &str, entries: &[GlossaryEntry]) -> Result<String, GlossaryError> {
    let mut terms: Vec<&GlossaryEntry> = entries
        .iter()
        .filter(|e| !e.chinese_term.is_empty() && !e.translation.is_empty())
        .collect();

    if text.is_empty() || terms.is_empty() {
        return Ok(text.to_string());
    }

    terms.sort_by_key(|e| std::cmp::Reverse(e.chinese_term.chars().count()));

    let mut replacements: HashMap<&str, &str> = HashMap::with_capacity(terms.len());
    for entry in &terms {
        replacements
            .entry(entry.chinese_term.as_str())
            .or_insert(entry.translation.as_str());
    }

    let pattern = terms
        .iter()
        .map(|e| regex::escape(&e.chinese_term))
        .collect::<Vec<_>>()
        .join("|");
    let matcher = Regex::new(&pattern).map_err(|e| GlossaryError::Substitution(e.to_string()))?;

    let replaced = matcher.replace_all(text, |caps: &Captures| {
        let matched = &caps[0];
        replacements.get(matched).copied().unwrap_or(matched).to_string()
    });

    Ok(replaced.into_owned())
}
