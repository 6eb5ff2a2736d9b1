/*!
 * Project glossary store.
 *
 * Validation, uniqueness and the import/export rules live here; persistence
 * is delegated to a `GlossaryRepository`.
 */

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, info};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::GlossaryError;
use crate::glossary::models::{
    Category, ExportedEntry, GlossaryEntry, ImportStats, ImportStrategy, NewGlossaryEntry,
};

/// Durable storage for glossary entries
#[async_trait]
pub trait GlossaryRepository: Send + Sync {
    /// All entries of a project in insertion order
    async fn list_glossary(&self, project_id: &str) -> Result<Vec<GlossaryEntry>>;

    async fn get_glossary_entry(&self, id: Uuid) -> Result<Option<GlossaryEntry>>;

    /// Insert or overwrite an entry by id
    async fn save_glossary_entry(&self, entry: &GlossaryEntry) -> Result<()>;

    /// Delete an entry; unknown ids are not an error
    async fn delete_glossary_entry(&self, id: Uuid) -> Result<()>;
}

/// Glossary operations for all projects
#[derive(Clone)]
pub struct GlossaryStore {
    repo: Arc<dyn GlossaryRepository>,
}

impl std::fmt::Debug for GlossaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlossaryStore").finish_non_exhaustive()
    }
}

impl GlossaryStore {
    pub fn new(repo: Arc<dyn GlossaryRepository>) -> Self {
        Self { repo }
    }

    /// All entries of a project
    pub async fn entries(&self, project_id: &str) -> Result<Vec<GlossaryEntry>, GlossaryError> {
        Ok(self.repo.list_glossary(project_id).await?)
    }

    /// Validate and store a new entry
    pub async fn add(&self, entry: NewGlossaryEntry) -> Result<GlossaryEntry, GlossaryError> {
        validate_fields(&entry.project_id, &entry.chinese_term, &entry.translation)?;

        let existing = self.repo.list_glossary(&entry.project_id).await?;
        if existing.iter().any(|e| e.chinese_term == entry.chinese_term) {
            return Err(GlossaryError::Duplicate {
                term: entry.chinese_term,
            });
        }

        let stored = entry.into_entry();
        self.repo.save_glossary_entry(&stored).await?;
        debug!("Added glossary entry {} -> {}", stored.chinese_term, stored.translation);
        Ok(stored)
    }

    /// Replace an existing entry
    pub async fn update(&self, entry: GlossaryEntry) -> Result<GlossaryEntry, GlossaryError> {
        let current = self
            .repo
            .get_glossary_entry(entry.id)
            .await?
            .ok_or_else(|| GlossaryError::NotFound {
                id: entry.id.to_string(),
            })?;

        validate_fields(&entry.project_id, &entry.chinese_term, &entry.translation)?;

        if current.chinese_term != entry.chinese_term || current.project_id != entry.project_id {
            let others = self.repo.list_glossary(&entry.project_id).await?;
            if others
                .iter()
                .any(|e| e.id != entry.id && e.chinese_term == entry.chinese_term)
            {
                return Err(GlossaryError::Duplicate {
                    term: entry.chinese_term,
                });
            }
        }

        self.repo.save_glossary_entry(&entry).await?;
        Ok(entry)
    }

    /// Delete an entry; unknown ids are ignored
    pub async fn delete(&self, id: Uuid) -> Result<(), GlossaryError> {
        Ok(self.repo.delete_glossary_entry(id).await?)
    }

    /// Delete several entries concurrently; fails if any deletion fails
    pub async fn delete_batch(&self, ids: &[Uuid]) -> Result<(), GlossaryError> {
        if ids.is_empty() {
            return Ok(());
        }
        try_join_all(ids.iter().map(|id| self.repo.delete_glossary_entry(*id))).await?;
        Ok(())
    }

    /// Import entries from a JSON array
    pub async fn import_glossary(
        &self,
        project_id: &str,
        json: &str,
        strategy: ImportStrategy,
    ) -> Result<ImportStats, GlossaryError> {
        let data: Value = serde_json::from_str(json)
            .map_err(|_| GlossaryError::Format("Invalid JSON format".to_string()))?;
        let items = data
            .as_array()
            .ok_or_else(|| GlossaryError::Format("Glossary data must be an array".to_string()))?;

        let existing = self.repo.list_glossary(project_id).await?;
        let known_terms: HashSet<String> = match strategy {
            ImportStrategy::Merge => existing.iter().map(|e| e.chinese_term.clone()).collect(),
            ImportStrategy::Replace => {
                let ids: Vec<Uuid> = existing.iter().map(|e| e.id).collect();
                self.delete_batch(&ids).await?;
                HashSet::new()
            }
        };

        let candidates: Vec<Option<NewGlossaryEntry>> = items
            .iter()
            .map(|item| parse_import_item(project_id, item))
            .collect();

        let (_, stats) = self.insert_candidates(candidates, known_terms).await?;
        info!("Imported glossary for project {}: {}", project_id, stats);
        Ok(stats)
    }

    /// Pretty-printed JSON array of a project's entries
    pub async fn export_glossary(&self, project_id: &str) -> Result<String, GlossaryError> {
        let entries = self.repo.list_glossary(project_id).await?;
        let exported: Vec<ExportedEntry> = entries.iter().map(ExportedEntry::from).collect();
        serde_json::to_string_pretty(&exported).map_err(|e| GlossaryError::Format(e.to_string()))
    }

    /// Store generated entries, skipping terms the project already has
    pub async fn add_generated(
        &self,
        project_id: &str,
        entries: Vec<NewGlossaryEntry>,
    ) -> Result<(Vec<GlossaryEntry>, ImportStats), GlossaryError> {
        let existing = self.repo.list_glossary(project_id).await?;
        let known_terms = existing.into_iter().map(|e| e.chinese_term).collect();

        let candidates = entries
            .into_iter()
            .map(|mut e| {
                e.project_id = project_id.to_string();
                let valid = !e.chinese_term.trim().is_empty() && !e.translation.trim().is_empty();
                valid.then_some(e)
            })
            .collect();

        self.insert_candidates(candidates, known_terms).await
    }

    async fn insert_candidates(
        &self,
        candidates: Vec<Option<NewGlossaryEntry>>,
        mut known_terms: HashSet<String>,
    ) -> Result<(Vec<GlossaryEntry>, ImportStats), GlossaryError> {
        let mut stats = ImportStats {
            total: candidates.len(),
            ..ImportStats::default()
        };
        let mut to_add = Vec::new();

        for candidate in candidates {
            match candidate {
                None => stats.invalid += 1,
                Some(entry) if known_terms.contains(&entry.chinese_term) => stats.skipped += 1,
                Some(entry) => {
                    known_terms.insert(entry.chinese_term.clone());
                    to_add.push(entry.into_entry());
                }
            }
        }

        try_join_all(to_add.iter().map(|e| self.repo.save_glossary_entry(e))).await?;
        stats.added = to_add.len();

        Ok((to_add, stats))
    }
}

fn validate_fields(project_id: &str, term: &str, translation: &str) -> Result<(), GlossaryError> {
    if project_id.trim().is_empty() {
        return Err(GlossaryError::Validation("Project ID is required".to_string()));
    }
    if term.trim().is_empty() {
        return Err(GlossaryError::Validation("Chinese term is required".to_string()));
    }
    if translation.trim().is_empty() {
        return Err(GlossaryError::Validation("Translation is required".to_string()));
    }
    Ok(())
}

fn parse_import_item(project_id: &str, item: &Value) -> Option<NewGlossaryEntry> {
    let term = non_empty_str(item, "chineseTerm")?;
    let translation = non_empty_str(item, "translation")?;
    let category = item
        .get("category")
        .and_then(Value::as_str)
        .map(Category::from_lenient)
        .unwrap_or_default();
    let notes = item.get("notes").and_then(Value::as_str).unwrap_or_default();

    Some(
        NewGlossaryEntry::new(project_id, term, translation)
            .category(category)
            .notes(notes),
    )
}

fn non_empty_str<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
