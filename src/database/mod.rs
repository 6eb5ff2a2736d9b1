/*!
 * SQLite persistence for glossaries, the model list cache and saved
 * translations.
 */

pub mod connection;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use repository::Repository;
