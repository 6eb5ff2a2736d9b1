/*!
 * Prompt construction for the completion service.
 *
 * Every prompt the application sends lives here: chunk translation,
 * verification, glossary extraction, and the strict JSON correction
 * prompts used by response recovery.
 */

pub mod templates;

pub use templates::{
    PromptTemplate, glossary_correction_prompt, glossary_extraction_prompt, quick_translate_prompt,
    term_translation_prompt, translation_prompt, verification_correction_prompt, verification_prompt,
};
