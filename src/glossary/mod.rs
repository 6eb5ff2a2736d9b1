/*!
 * Per-project glossary of Chinese terms and their fixed English renderings.
 *
 * - `models`: entry, category and import/export types
 * - `store`: validated CRUD, import and export over a repository
 * - `substitution`: pre-translation term replacement
 */

pub mod models;
pub mod store;
pub mod substitution;

pub use models::{Category, ExportedEntry, GlossaryEntry, ImportStats, ImportStrategy, NewGlossaryEntry};
pub use store::{GlossaryRepository, GlossaryStore};
pub use substitution::apply_glossary;
