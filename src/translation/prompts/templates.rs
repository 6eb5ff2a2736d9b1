/*!
 * Prompt templates for Chinese to English translation.
 *
 * Templates use `{placeholder}` markers that are filled in by `render`.
 * The glossary extraction and correction prompts ask for bare JSON so the
 * response recovery stages have the best chance on the first attempt.
 */

use crate::glossary::GlossaryEntry;
use crate::text_utils::truncate_chars;

/// Instruction line placed between the custom instructions and the chunk
pub const TRANSLATE_INSTRUCTION: &str = "Translate this Chinese text to English:";

/// How much of the source text the glossary extraction prompt includes
pub const GLOSSARY_SAMPLE_CHARS: usize = 5000;

/// A prompt with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    /// Verification of a finished translation.
    pub const VERIFICATION: &'static str = r#"I'll provide you with a Chinese text and its English translation.

Please verify the translation and check for:

1. Completeness: Ensure all content from the source is present in the translation.
2. Accuracy: Check if the meaning is conveyed correctly.
3. Glossary compliance: Verify if specific terms are translated consistently, based on this glossary.

Respond in JSON format with the following structure:
{
  "completeness": 0-100 (percentage of content translated),
  "accuracy": 0-100 (estimated accuracy),
  "missingContent": ["List of sections/sentences missing"],
  "issues": [{
    "sourceText": "Original text",
    "translatedText": "Problematic translation",
    "issue": "Description of the issue",
    "suggestion": "Suggested correction"
  }]
}

Chinese Text:
{source}

English Translation:
{translation}
"#;

    /// Glossary term extraction from source text.
    pub const GLOSSARY_EXTRACTION: &'static str = r#"You are a highly specialized glossary extraction expert for Chinese to English translation. Your ONLY output MUST be a valid JSON array. No explanations, markdown, or any other text.

TASK:
Extract proper nouns, terminology, and recurring phrases from this Chinese text that would need consistent translation. Chinese names, locations, titles, and setting-specific terms are particularly important.{fandom}

RULES:
1. Focus on proper nouns, special terminology, and phrases that would be confusing if translated inconsistently.
2. For characters, extract full names and individual name components (given name, family name, titles).
3. If the same concept appears in different forms, include each variant.
4. Take special care with character names, locations, cultivation techniques, mythological concepts and ranks.
5. Include terms even if you're unsure of the perfect translation.
6. Do NOT include common words or phrases unless they have special meaning in context.

REQUIRED OUTPUT FORMAT:
A valid JSON array where each item is an object with these fields:
- "chineseTerm": The original Chinese term (REQUIRED)
- "translation": Your suggested English translation (REQUIRED)
- "category": One of "character", "location", "technique", "item", "concept", "title", "organization", "other" (REQUIRED)
- "notes": Brief context or explanation (OPTIONAL)

EXAMPLE (do NOT include this in your output):
[
  {"chineseTerm": "林动", "translation": "Lin Dong", "category": "character", "notes": "Main protagonist"},
  {"chineseTerm": "元婴期", "translation": "Yuan Ying Stage", "category": "concept", "notes": "Cultivation stage"}
]

CRITICAL:
- Verify your output is valid JSON with balanced brackets and proper comma use
- Do NOT wrap the output in code fences
- Provide ONLY the JSON array as your complete answer

Now analyze this text:
{text}"#;

    /// Repair of a malformed glossary array.
    pub const GLOSSARY_CORRECTION: &'static str = r#"You are a specialized JSON validator for glossary entries. Fix this JSON array of glossary entries so it is valid and properly formatted.

CRITICAL REQUIREMENTS:
1. Your ONLY output MUST be the corrected, valid JSON array. No explanations, no markdown.
2. Ensure all JSON syntax is valid: balanced brackets, correct commas, properly quoted strings.
3. Each entry MUST have these fields:
   - "chineseTerm": string (REQUIRED)
   - "translation": string (REQUIRED)
   - "category": one of "character", "location", "technique", "item", "concept", "title", "organization", "other" (REQUIRED)
   - "notes": string, may be empty (REQUIRED)
4. If an entry is missing required fields, add them with suitable default values.

Here is the JSON to fix:
{raw}"#;

    /// Repair of a malformed verification object.
    pub const VERIFICATION_CORRECTION: &'static str = r#"You are a specialized JSON validator. Fix this translation verification report so it is a single valid JSON object.

CRITICAL REQUIREMENTS:
1. Your ONLY output MUST be the corrected, valid JSON object. No explanations, no markdown.
2. Ensure all JSON syntax is valid: balanced braces, correct commas, properly quoted strings.
3. The object MUST have these fields:
   - "completeness": number from 0 to 100 (REQUIRED)
   - "accuracy": number from 0 to 100 (REQUIRED)
   - "missingContent": array of strings, may be empty (REQUIRED)
   - "issues": array of objects with "sourceText", "translatedText", "issue", "suggestion" strings (REQUIRED)

Here is the JSON to fix:
{raw}"#;

    /// Create a template from a static string.
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Fill in the named placeholders.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut rendered = self.template.to_string();
        for (name, value) in values {
            rendered = rendered.replace(&format!("{{{}}}", name), value);
        }
        rendered
    }
}

/// Prompt for one chunk of the translation loop.
pub fn translation_prompt(chunk: &str, instructions: &str) -> String {
    let instructions = instructions.trim();
    if instructions.is_empty() {
        format!("{}\n\n{}", TRANSLATE_INSTRUCTION, chunk)
    } else {
        format!("{}\n\n{}\n\n{}", instructions, TRANSLATE_INSTRUCTION, chunk)
    }
}

/// Prompt asking the model to grade a translation against its source.
pub fn verification_prompt(source: &str, translation: &str, glossary: &[GlossaryEntry]) -> String {
    let mut prompt = PromptTemplate::new(PromptTemplate::VERIFICATION)
        .render(&[("source", source), ("translation", translation)]);

    if !glossary.is_empty() {
        let terms = glossary
            .iter()
            .map(|entry| format!("{}: {}", entry.chinese_term, entry.translation))
            .collect::<Vec<_>>()
            .join("\n");
        prompt.push_str("\nGlossary Terms to Check:\n");
        prompt.push_str(&terms);
    }

    prompt
}

/// Prompt for AI glossary extraction, with an optional setting hint.
pub fn glossary_extraction_prompt(text: &str, fandom_context: &str) -> String {
    let fandom = if fandom_context.trim().is_empty() {
        String::new()
    } else {
        format!(
            "\n\nIMPORTANT CONTEXT: This text is from the \"{}\" fandom/universe. Use this context to identify special terms, names, locations, and concepts specific to this setting.",
            fandom_context.trim()
        )
    };

    PromptTemplate::new(PromptTemplate::GLOSSARY_EXTRACTION).render(&[
        ("fandom", &fandom),
        ("text", truncate_chars(text, GLOSSARY_SAMPLE_CHARS)),
    ])
}

/// Strict correction prompt for a glossary array response.
pub fn glossary_correction_prompt(raw: &str) -> String {
    PromptTemplate::new(PromptTemplate::GLOSSARY_CORRECTION).render(&[("raw", raw)])
}

/// Strict correction prompt for a verification object response.
pub fn verification_correction_prompt(raw: &str) -> String {
    PromptTemplate::new(PromptTemplate::VERIFICATION_CORRECTION).render(&[("raw", raw)])
}

/// Single-shot translation used by the chat assistant.
pub fn quick_translate_prompt(text: &str) -> String {
    format!("Translate this Chinese text to English perfectly: \"{}\"", text)
}

/// Asks which English rendering a chat message intends for a term.
pub fn term_translation_prompt(message: &str, chinese_term: &str) -> String {
    format!(
        "I need to extract the English translation for a Chinese term from this message:\n\"{}\"\n\n\
         The Chinese term is: {}\n\n\
         Please extract ONLY the English translation that the user intends for this term.\n\
         Return only the translation, nothing else.",
        message, chinese_term
    )
}
