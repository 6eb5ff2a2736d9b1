/*!
 * Text helpers shared by the chunker, the estimator and the assistant.
 *
 * Word counts are whitespace based; Chinese characters are counted in the
 * CJK Unified Ideographs range U+4E00..=U+9FA5.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// Chapter heading such as `第12章 归来`
pub static CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第[0-9]+章\s.+").expect("chapter heading pattern is valid"));

/// Count whitespace-separated words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whether a character is a Chinese ideograph
pub fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Number of Chinese ideographs in the text
pub fn count_cjk(text: &str) -> usize {
    text.chars().filter(|c| is_cjk(*c)).count()
}

/// Whether the text contains at least one Chinese ideograph
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Maximal runs of Chinese ideographs, in order of appearance
pub fn cjk_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        match (is_cjk(c), start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                spans.push(&text[s..idx]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push(&text[s..]);
    }

    spans
}

/// Whether the text contains a chapter heading
pub fn has_chapter_headings(text: &str) -> bool {
    CHAPTER_HEADING.is_match(text)
}

/// First `max_chars` characters of the text
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
