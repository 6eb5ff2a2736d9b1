/*!
 * # QuillSync - AI-assisted Chinese to English translation
 *
 * A Rust library for translating webnovels and other long Chinese texts
 * through the OpenRouter chat-completions API, with a per-project glossary
 * that keeps names and terms consistent.
 *
 * ## Features
 *
 * - Per-project glossary with import/export and AI term extraction
 * - Chapter, word-count and automatic chunking of long texts
 * - Streaming, cancellable completions with per-call deadlines
 * - Token and cost estimates from the OpenRouter model catalog
 * - Optional AI verification of finished translations
 * - A chat assistant that routes commands and falls back to canned replies
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `glossary`: Glossary entries, the store and term substitution
 * - `database`: SQLite persistence for the glossary, caches and outputs
 * - `providers`: OpenRouter client, SSE decoding and the model catalog
 * - `translation`: Chunking, prompts, response recovery and the orchestrator
 * - `assistant`: Chat command routing and conversation
 * - `app_controller`: Wires the pieces together for the CLI
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod assistant;
pub mod database;
pub mod errors;
pub mod glossary;
pub mod providers;
pub mod text_utils;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use assistant::{Assistant, ChatInputs};
pub use errors::{GlossaryError, ProviderError, RecoveryError, TranslationError};
pub use glossary::{GlossaryEntry, GlossaryStore, NewGlossaryEntry};
pub use providers::{ModelCatalog, OpenRouter};
pub use translation::{TranslationOptions, TranslationOrchestrator, TranslationOutcome};
