/*!
 * Splitting source text into translation chunks.
 *
 * Three strategies are available: chapter headings, paragraph-aware word
 * count packing, and an automatic choice between the two. Chunks are
 * translated in order, so every strategy preserves the order of the text.
 */

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text_utils::{CHAPTER_HEADING, count_words};

/// Default maximum number of words per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Texts longer than this many words are split when no chapters are found
pub const AUTO_SPLIT_THRESHOLD: usize = 2000;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

/// How the source text is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkingStrategy {
    /// Chapters when headings exist, word count for long texts, otherwise one chunk
    #[default]
    Auto,
    /// Split at chapter headings
    Chapter,
    /// Pack paragraphs up to the word limit
    WordCount,
}

impl fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkingStrategy::Auto => "auto",
            ChunkingStrategy::Chapter => "chapter",
            ChunkingStrategy::WordCount => "word-count",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ChunkingStrategy::Auto),
            "chapter" | "chapters" => Ok(ChunkingStrategy::Chapter),
            "word-count" | "wordcount" | "word_count" => Ok(ChunkingStrategy::WordCount),
            other => Err(format!("Unknown chunking strategy: {}", other)),
        }
    }
}

/// Split text with the given strategy
pub fn chunk_text(text: &str, strategy: ChunkingStrategy, chunk_size: usize) -> Vec<String> {
    match strategy {
        ChunkingStrategy::Auto => auto_chunk_with_limit(text, chunk_size),
        ChunkingStrategy::Chapter => split_by_chapters(text),
        ChunkingStrategy::WordCount => split_by_word_count(text, chunk_size),
    }
}

/// Pick a strategy from the content using the default chunk size
pub fn auto_chunk(text: &str) -> Vec<String> {
    auto_chunk_with_limit(text, DEFAULT_CHUNK_SIZE)
}

fn auto_chunk_with_limit(text: &str, chunk_size: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    if CHAPTER_HEADING.is_match(text) {
        return split_by_chapters(text);
    }

    if count_words(text) > AUTO_SPLIT_THRESHOLD {
        return split_by_word_count(text, chunk_size);
    }

    vec![text.trim().to_string()]
}

/// Split at chapter headings; text before the first heading is its own chunk
pub fn split_by_chapters(text: &str) -> Vec<String> {
    let starts: Vec<usize> = CHAPTER_HEADING.find_iter(text).map(|m| m.start()).collect();

    if starts.is_empty() {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut boundaries = Vec::with_capacity(starts.len() + 2);
    boundaries.push(0);
    boundaries.extend(starts.iter().copied().filter(|s| *s > 0));
    boundaries.push(text.len());

    boundaries
        .windows(2)
        .map(|w| text[w[0]..w[1]].trim())
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pack paragraphs into chunks of at most `limit` words.
///
/// Paragraphs larger than the limit are split into sentences which are packed
/// the same way. A single sentence longer than the limit becomes its own chunk.
pub fn split_by_word_count(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut pending_words = 0;

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let words = count_words(paragraph);

        if words > limit {
            flush(&mut chunks, &mut pending, "\n\n");
            pending_words = 0;

            let mut group: Vec<&str> = Vec::new();
            let mut group_words = 0;
            for sentence in split_sentences(paragraph) {
                let sentence_words = count_words(sentence);
                if !group.is_empty() && group_words + sentence_words > limit {
                    chunks.push(group.join(" "));
                    group.clear();
                    group_words = 0;
                }
                group.push(sentence);
                group_words += sentence_words;
            }

            // The last sentence group can still take following paragraphs
            if !group.is_empty() {
                pending.push(group.join(" "));
                pending_words = group_words;
            }
        } else if pending_words + words <= limit {
            pending.push(paragraph.to_string());
            pending_words += words;
        } else {
            flush(&mut chunks, &mut pending, "\n\n");
            pending.push(paragraph.to_string());
            pending_words = words;
        }
    }

    flush(&mut chunks, &mut pending, "\n\n");
    chunks
}

fn flush(chunks: &mut Vec<String>, pending: &mut Vec<String>, separator: &str) {
    if pending.is_empty() {
        return;
    }
    let chunk = pending.join(separator);
    pending.clear();
    if !chunk.trim().is_empty() {
        chunks.push(chunk);
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '？' | '！')
}

fn is_wide_terminator(c: char) -> bool {
    matches!(c, '。' | '？' | '！')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '”' | '’' | '」' | '』' | '）' | ')')
}

/// Split a paragraph after sentence-ending punctuation.
///
/// A break happens where the terminator (plus any closing quotes) is followed
/// by whitespace, or directly after a full-width terminator.
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }

        let mut end = idx + c.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if is_closer(next) {
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let split = match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => true,
            Some(_) => is_wide_terminator(c),
            None => false,
        };
        if !split {
            continue;
        }

        let sentence = paragraph[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        while let Some(&(_, next)) = chars.peek() {
            if next.is_whitespace() {
                chars.next();
            } else {
                break;
            }
        }
        start = chars.peek().map(|(i, _)| *i).unwrap_or(paragraph.len());
    }

    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}
