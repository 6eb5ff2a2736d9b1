/*!
 * Repository layer for database operations.
 *
 * Implements the storage traits used by the glossary store, the model
 * catalog and the translation orchestrator on top of SQLite.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::connection::DatabaseConnection;
use crate::glossary::models::{Category, GlossaryEntry};
use crate::glossary::store::GlossaryRepository;
use crate::providers::models::DurableCache;
use crate::translation::orchestrator::TranslationSink;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Repository on an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    // =========================================================================
    // Project Outputs
    // =========================================================================

    /// Last saved translation of a project
    pub async fn load_output(&self, project_id: &str) -> Result<Option<String>> {
        let project_id = project_id.to_string();

        self.db
            .execute_async(move |conn| {
                let content = conn
                    .query_row(
                        "SELECT content FROM project_outputs WHERE project_id = ?1",
                        params![project_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(content)
            })
            .await
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<GlossaryEntry> {
    let id: String = row.get(0)?;
    let category: String = row.get(4)?;

    Ok(GlossaryEntry {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        project_id: row.get(1)?,
        chinese_term: row.get(2)?,
        translation: row.get(3)?,
        category: Category::from_lenient(&category),
        notes: row.get(5)?,
    })
}

// =========================================================================
// Glossary
// =========================================================================

#[async_trait]
impl GlossaryRepository for Repository {
    async fn list_glossary(&self, project_id: &str) -> Result<Vec<GlossaryEntry>> {
        let project_id = project_id.to_string();

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, project_id, chinese_term, translation, category, notes
                    FROM glossary WHERE project_id = ?1 ORDER BY rowid
                    "#,
                )?;
                let entries = stmt
                    .query_map(params![project_id], row_to_entry)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(entries)
            })
            .await
    }

    async fn get_glossary_entry(&self, id: Uuid) -> Result<Option<GlossaryEntry>> {
        self.db
            .execute_async(move |conn| {
                let entry = conn
                    .query_row(
                        r#"
                        SELECT id, project_id, chinese_term, translation, category, notes
                        FROM glossary WHERE id = ?1
                        "#,
                        params![id.to_string()],
                        row_to_entry,
                    )
                    .optional()?;
                Ok(entry)
            })
            .await
    }

    async fn save_glossary_entry(&self, entry: &GlossaryEntry) -> Result<()> {
        let entry = entry.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO glossary (id, project_id, chinese_term, translation, category, notes, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
                    ON CONFLICT(id) DO UPDATE SET
                        project_id = excluded.project_id,
                        chinese_term = excluded.chinese_term,
                        translation = excluded.translation,
                        category = excluded.category,
                        notes = excluded.notes
                    "#,
                    params![
                        entry.id.to_string(),
                        entry.project_id,
                        entry.chinese_term,
                        entry.translation,
                        entry.category.as_str(),
                        entry.notes,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn delete_glossary_entry(&self, id: Uuid) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute("DELETE FROM glossary WHERE id = ?1", params![id.to_string()])?;
                if deleted == 0 {
                    debug!("Glossary entry {} was already absent", id);
                }
                Ok(())
            })
            .await
    }
}

// =========================================================================
// Key/Value Cache
// =========================================================================

#[async_trait]
impl DurableCache for Repository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();

        self.db
            .execute_async(move |conn| {
                let value = conn
                    .query_row(
                        "SELECT value FROM kv_cache WHERE key = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
    }
}

// =========================================================================
// Translation Output
// =========================================================================

#[async_trait]
impl TranslationSink for Repository {
    async fn save_output(&self, project_id: &str, content: &str) -> Result<()> {
        let project_id = project_id.to_string();
        let content = content.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO project_outputs (project_id, content, updated_at) VALUES (?1, ?2, datetime('now'))",
                    params![project_id, content],
                )?;
                Ok(())
            })
            .await
    }
}
