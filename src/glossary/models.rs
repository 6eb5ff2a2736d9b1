/*!
 * Glossary data types.
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of term a glossary entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Character,
    Location,
    Technique,
    Item,
    Concept,
    Title,
    Organization,
    #[default]
    Other,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 8] = [
        Category::Character,
        Category::Location,
        Category::Technique,
        Category::Item,
        Category::Concept,
        Category::Title,
        Category::Organization,
        Category::Other,
    ];

    /// Parse a category name, falling back to `Other` for unknown values
    pub fn from_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Character => "character",
            Category::Location => "location",
            Category::Technique => "technique",
            Category::Item => "item",
            Category::Concept => "concept",
            Category::Title => "title",
            Category::Organization => "organization",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// A stored glossary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryEntry {
    pub id: Uuid,
    pub project_id: String,
    pub chinese_term: String,
    pub translation: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub notes: String,
}

/// Input for a new glossary entry, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGlossaryEntry {
    pub project_id: String,
    pub chinese_term: String,
    pub translation: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub notes: String,
}

impl NewGlossaryEntry {
    pub fn new(project_id: &str, chinese_term: &str, translation: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            chinese_term: chinese_term.to_string(),
            translation: translation.to_string(),
            category: Category::Other,
            notes: String::new(),
        }
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }

    /// Assign a fresh id
    pub fn into_entry(self) -> GlossaryEntry {
        GlossaryEntry {
            id: Uuid::new_v4(),
            project_id: self.project_id,
            chinese_term: self.chinese_term,
            translation: self.translation,
            category: self.category,
            notes: self.notes,
        }
    }
}

/// Entry shape used by glossary import and export files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedEntry {
    pub chinese_term: String,
    pub translation: String,
    pub notes: String,
    pub category: Category,
}

impl From<&GlossaryEntry> for ExportedEntry {
    fn from(entry: &GlossaryEntry) -> Self {
        Self {
            chinese_term: entry.chinese_term.clone(),
            translation: entry.translation.clone(),
            notes: entry.notes.clone(),
            category: entry.category,
        }
    }
}

/// How an import treats existing entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportStrategy {
    /// Keep existing entries; skip imported terms that already exist
    #[default]
    Merge,
    /// Delete existing entries first
    Replace,
}

impl FromStr for ImportStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(ImportStrategy::Merge),
            "replace" => Ok(ImportStrategy::Replace),
            other => Err(format!("Unknown import strategy: {}", other)),
        }
    }
}

/// Outcome counts of an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub total: usize,
    pub added: usize,
    pub skipped: usize,
    pub invalid: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} added, {} skipped, {} invalid",
            self.total, self.added, self.skipped, self.invalid
        )
    }
}
