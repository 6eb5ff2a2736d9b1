/*!
 * The translation pipeline.
 *
 * - `chunker`: splitting source text into request-sized chunks
 * - `prompts`: prompt templates sent to the completion service
 * - `estimate`: token and cost estimation
 * - `recovery`: structured JSON recovery from model responses
 * - `verification`: post-translation quality check
 * - `glossary_generation`: AI-assisted glossary extraction
 * - `orchestrator`: the single-flight translation job runner
 */

pub mod chunker;
pub mod estimate;
pub mod glossary_generation;
pub mod orchestrator;
pub mod prompts;
pub mod recovery;
pub mod verification;

pub use chunker::{ChunkingStrategy, auto_chunk, chunk_text, split_by_chapters, split_by_word_count};
pub use estimate::{TokenEstimate, estimate_tokens_and_cost};
pub use glossary_generation::{GeneratedGlossary, generate_glossary_entries};
pub use orchestrator::{
    CompletedTranslation, JobState, TranslationEvent, TranslationOptions, TranslationOrchestrator,
    TranslationOutcome, TranslationSink,
};
pub use recovery::{RecoveryStage, Shape};
pub use verification::{Issue, VerificationResult};
