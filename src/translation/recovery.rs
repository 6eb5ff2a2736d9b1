/*!
 * Recovery of structured JSON from free-form model responses.
 *
 * Models asked for JSON may answer with prose, fenced code blocks or
 * slightly broken JSON. Recovery runs an ordered list of stages and stops
 * at the first one that yields data of the expected shape:
 *
 * 1. `direct_parse`: the whole response is JSON
 * 2. `extract_fenced`: a fenced code block, or the outermost bracketed span
 * 3. model correction: the raw response is sent back with a strict prompt
 * 4. `mechanical_repair`: textual fixes applied to the corrected output
 *
 * When every stage fails the error is terminal; callers should request a
 * new generation instead of retrying the parse.
 */

use std::fmt;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::errors::RecoveryError;
use crate::glossary::Category;
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::translation::prompts::{glossary_correction_prompt, verification_correction_prompt};

/// Temperature used for correction requests
pub const CORRECTION_TEMPERATURE: f32 = 0.0;

/// Completion budget for correction requests
pub const CORRECTION_MAX_TOKENS: u32 = 4096;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence pattern is valid"));

/// The JSON shape a caller expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A JSON array (glossary extraction)
    Array,
    /// A JSON object (verification report)
    Object,
}

impl Shape {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }

    fn delimiters(&self) -> (char, char) {
        match self {
            Shape::Array => ('[', ']'),
            Shape::Object => ('{', '}'),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Array => write!(f, "array"),
            Shape::Object => write!(f, "object"),
        }
    }
}

/// The stage that produced a recovered value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    DirectParse,
    FencedExtraction,
    ModelCorrection,
    MechanicalRepair,
}

/// A successfully recovered value
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub stage: RecoveryStage,
}

/// A pure recovery stage
pub type Stage = fn(&str, Shape) -> Result<Value, RecoveryError>;

/// Stages that need no model call, in order
pub const LOCAL_STAGES: [(RecoveryStage, Stage); 2] = [
    (RecoveryStage::DirectParse, direct_parse),
    (RecoveryStage::FencedExtraction, extract_fenced),
];

/// Parse the whole response
pub fn direct_parse(raw: &str, shape: Shape) -> Result<Value, RecoveryError> {
    parse_shape(raw.trim(), shape)
}

/// Parse the contents of a fenced code block, or the outermost bracketed span
pub fn extract_fenced(raw: &str, shape: Shape) -> Result<Value, RecoveryError> {
    let candidate = match FENCED_BLOCK.captures(raw).and_then(|c| c.get(1)) {
        Some(block) => block.as_str(),
        None => raw,
    };

    if let Ok(value) = parse_shape(candidate.trim(), shape) {
        return Ok(value);
    }

    let (open, close) = shape.delimiters();
    match (candidate.find(open), candidate.rfind(close)) {
        (Some(start), Some(end)) if start < end => parse_shape(&candidate[start..=end], shape),
        _ => Err(RecoveryError::Unrecoverable(format!(
            "no {} found in the response",
            shape
        ))),
    }
}

/// Apply fixed textual repairs, then parse once more
pub fn mechanical_repair(raw: &str, shape: Shape) -> Result<Value, RecoveryError> {
    let repaired = repair_syntax(raw.trim());

    let (open, close) = shape.delimiters();
    let mut repaired = repaired.trim().to_string();
    if !repaired.starts_with(open) {
        repaired.insert(0, open);
    }
    if !repaired.ends_with(close) {
        repaired.push(close);
    }

    parse_shape(&repaired, shape)
}

/// Run the stages that need no model call
pub fn recover_locally(raw: &str, shape: Shape) -> Result<Recovered, RecoveryError> {
    run_stages(&LOCAL_STAGES, raw, shape)
        .map(|(stage, value)| finish(value, stage, shape))
        .ok_or_else(|| RecoveryError::Unrecoverable(format!("response is not a JSON {}", shape)))
}

/// Recover a value of the expected shape, asking the model for a correction if needed
pub async fn recover(
    provider: &dyn CompletionProvider,
    model: &str,
    raw: &str,
    shape: Shape,
    cancel: &CancellationToken,
) -> Result<Recovered, RecoveryError> {
    if let Ok(recovered) = recover_locally(raw, shape) {
        return Ok(recovered);
    }

    debug!("Local JSON recovery failed, requesting a model correction");
    let prompt = match shape {
        Shape::Array => glossary_correction_prompt(raw),
        Shape::Object => verification_correction_prompt(raw),
    };
    let request = CompletionRequest::new(prompt)
        .model(model)
        .temperature(CORRECTION_TEMPERATURE)
        .max_tokens(CORRECTION_MAX_TOKENS);
    let corrected = provider.complete(request, cancel).await?;

    if let Some((_, value)) = run_stages(&LOCAL_STAGES, &corrected, shape) {
        return Ok(finish(value, RecoveryStage::ModelCorrection, shape));
    }

    warn!("Corrected response is still invalid JSON, attempting mechanical repair");
    match mechanical_repair(&corrected, shape) {
        Ok(value) => Ok(finish(value, RecoveryStage::MechanicalRepair, shape)),
        Err(e) => {
            warn!("Mechanical JSON repair failed: {}", e);
            Err(RecoveryError::Unrecoverable(format!(
                "could not parse a JSON {} after correction and repair",
                shape
            )))
        }
    }
}

/// Keep only well-formed glossary items and normalize their optional fields
///
/// Items must be objects with non-empty string `chineseTerm` and
/// `translation`. `notes` defaults to an empty string and `category` is
/// forced onto the known list, lowercased.
pub fn validate_glossary_entries(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|item| {
            let Value::Object(mut map) = item else {
                debug!("Dropping glossary item that is not an object");
                return None;
            };

            let term_ok = non_empty_string(map.get("chineseTerm"));
            let translation_ok = non_empty_string(map.get("translation"));
            if !term_ok || !translation_ok {
                debug!("Dropping glossary item with a missing term or translation");
                return None;
            }

            if !matches!(map.get("notes"), Some(Value::String(_))) {
                map.insert("notes".to_string(), Value::String(String::new()));
            }

            let category = map
                .get("category")
                .and_then(Value::as_str)
                .map(Category::from_lenient)
                .unwrap_or_default();
            map.insert("category".to_string(), Value::String(category.as_str().to_string()));

            Some(Value::Object(map))
        })
        .collect()
}

fn run_stages(stages: &[(RecoveryStage, Stage)], raw: &str, shape: Shape) -> Option<(RecoveryStage, Value)> {
    stages.iter().find_map(|(stage, run)| match run(raw, shape) {
        Ok(value) => Some((*stage, value)),
        Err(e) => {
            debug!("Recovery stage {:?} failed: {}", stage, e);
            None
        }
    })
}

fn finish(value: Value, stage: RecoveryStage, shape: Shape) -> Recovered {
    let value = match (shape, value) {
        (Shape::Array, Value::Array(items)) => Value::Array(validate_glossary_entries(items)),
        (_, other) => other,
    };
    debug!("Recovered JSON {} via {:?}", shape, stage);
    Recovered { value, stage }
}

fn parse_shape(text: &str, shape: Shape) -> Result<Value, RecoveryError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| RecoveryError::Unrecoverable(format!("invalid JSON: {}", e)))?;
    if shape.matches(&value) {
        Ok(value)
    } else {
        Err(RecoveryError::Unrecoverable(format!("expected a JSON {}", shape)))
    }
}

fn non_empty_string(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.trim().is_empty())
}

/// Fix common syntax slips in one pass over the text
///
/// Outside string literals, bare or single-quoted keys get double quotes and
/// a comma is inserted between adjacent objects. Inside string literals, raw
/// control characters and stray quotes are escaped. A quote inside a string
/// only closes it when the next non-blank character is structural
/// (`,` `:` `}` `]`) or the input ends.
fn repair_syntax(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !in_string {
            out.push(c);
            i += 1;
            match c {
                '"' => in_string = true,
                '}' => {
                    if next_non_blank(&chars, i) == Some('{') {
                        out.push(',');
                    }
                }
                '{' | ',' => {
                    while let Some(ws) = chars.get(i).filter(|ch| ch.is_whitespace()) {
                        out.push(*ws);
                        i += 1;
                    }
                    if let Some((key, next)) = bare_key_at(&chars, i) {
                        out.push('"');
                        out.push_str(&key);
                        out.push_str("\":");
                        i = next;
                    }
                }
                _ => {}
            }
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            }
            '"' => {
                if matches!(next_non_blank(&chars, i + 1), None | Some(',' | ':' | '}' | ']')) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

fn next_non_blank(chars: &[char], from: usize) -> Option<char> {
    chars.get(from..)?.iter().copied().find(|ch| !ch.is_whitespace())
}

/// A bare or single-quoted key at `start`, with the index just past its colon
fn bare_key_at(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    let single_quoted = chars.get(i) == Some(&'\'');
    if single_quoted {
        i += 1;
    }

    let first = *chars.get(i)?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let key_start = i;
    while chars.get(i).is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '_') {
        i += 1;
    }
    let key: String = chars[key_start..i].iter().collect();

    if single_quoted {
        if chars.get(i) != Some(&'\'') {
            return None;
        }
        i += 1;
    }
    while chars.get(i).is_some_and(|ch| ch.is_whitespace()) {
        i += 1;
    }
    (chars.get(i) == Some(&':')).then_some((key, i + 1))
}
