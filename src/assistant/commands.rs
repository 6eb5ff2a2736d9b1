/*!
 * Argument extraction for assistant commands.
 *
 * Everything here is pure text processing: URLs, pasted HTML, glossary
 * term requests, URL patterns for chapter sites, CSS selector guesses and
 * the setting ("fandom") of a text.
 */

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::Serialize;
use url::Url;

use crate::glossary::Category;
use crate::text_utils::cjk_spans;

/// Notes stored with terms added from the chat
pub const CHAT_NOTES: &str = "Added via chat";

/// Pattern returned when a URL cannot be parsed
pub const FALLBACK_URL_PATTERN: &str = r"^https?://example\.com/path/to/chapter/\d+$";

static URL_IN_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url pattern is valid"));

static TERM_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) as | meaning |→|->").expect("delimiter pattern is valid"));

static TRAILING_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\s,;]+(?:category|notes?)\b").expect("clause pattern is valid"));

static TRAILING_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?,;:]+$").expect("punctuation pattern is valid"));

static CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)category:?\s*([a-zA-Z]+)").expect("category pattern is valid"));

static NOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)notes?:?\s*"([^"]*)""#).expect("notes pattern is valid"));

static HTML_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)html:\s*(.*)").expect("html marker pattern is valid"));

static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<div|<p|<span|<h\d|<ul|<table").expect("tag pattern is valid"));

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+/").expect("segment pattern is valid"));
static NUMERIC_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+$").expect("segment pattern is valid"));
static CHAPTER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/chapter[-_]?\d+").expect("segment pattern is valid"));
static ID_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/[a-zA-Z0-9]{4,}/").expect("segment pattern is valid"));
static ID_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/[a-zA-Z0-9]{4,}$").expect("segment pattern is valid"));

/// First http(s) URL in the message that parses
pub fn extract_url(message: &str) -> Option<Url> {
    URL_IN_TEXT
        .find_iter(message)
        .find_map(|m| Url::parse(m.as_str()).ok())
}

/// Pasted page HTML, if the message seems to contain some
pub fn extract_html(message: &str) -> Option<String> {
    if let Some(start) = message.find("<html") {
        return Some(message[start..].to_string());
    }
    if let Some(start) = message.find("<body") {
        return Some(format!("<html>{}", &message[start..]));
    }
    if let Some(content) = HTML_MARKER.captures(message).and_then(|c| c.get(1)) {
        if !content.as_str().trim().is_empty() {
            return Some(content.as_str().to_string());
        }
    }

    let tags: Vec<_> = HTML_TAG.find_iter(message).collect();
    if tags.len() > 3 {
        return Some(message[tags[0].start()..].to_string());
    }
    None
}

/// A request to add one glossary term
#[derive(Debug, Clone, PartialEq)]
pub struct TermRequest {
    pub chinese_term: String,
    /// None when the message has no recognizable delimiter
    pub translation: Option<String>,
    pub category: Category,
    pub notes: String,
}

/// Parse "add glossary 魔法 as magic category: concept notes: \"...\""
pub fn parse_term_request(message: &str) -> Option<TermRequest> {
    let chinese_term = cjk_spans(message).first()?.to_string();

    let translation = TERM_DELIMITER.find(message).and_then(|delimiter| {
        let rest = &message[delimiter.end()..];
        let segment = match TERM_DELIMITER.find(rest) {
            Some(next) => &rest[..next.start()],
            None => rest,
        };
        let segment = match TRAILING_CLAUSE.find(segment) {
            Some(clause) => &segment[..clause.start()],
            None => segment,
        };
        let cleaned = TRAILING_PUNCTUATION.replace(segment.trim(), "");
        let cleaned = cleaned.trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    });

    let category = CATEGORY
        .captures(message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<Category>().ok())
        .unwrap_or_default();

    let notes = NOTES
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| CHAT_NOTES.to_string());

    Some(TermRequest {
        chinese_term,
        translation,
        category,
        notes,
    })
}

/// Regular expression matching sibling chapter URLs of `url`
pub fn generate_regex_pattern(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK_URL_PATTERN.to_string();
    };

    let path = NUMERIC_SEGMENT.replace_all(parsed.path(), NoExpand(r"/\d+/"));
    let path = NUMERIC_TAIL.replace_all(&path, NoExpand(r"/\d+"));
    let path = CHAPTER_SEGMENT.replace(&path, NoExpand(r"/chapter[\-_]?\d+"));
    let path = ID_SEGMENT.replace_all(&path, NoExpand("/[a-zA-Z0-9]+/"));
    let path = ID_TAIL.replace_all(&path, NoExpand("/[a-zA-Z0-9]+"));

    let mut pattern = format!(
        "^{}{}",
        parsed.origin().ascii_serialization().replace('.', r"\."),
        path
    );
    if parsed.query().is_some_and(|q| !q.is_empty()) {
        pattern.push_str(r"\?.*");
    }
    pattern.push('$');
    pattern
}

/// Display name for a site: first host label without `www.`, capitalized
pub fn website_name(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next().unwrap_or(host);

    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Novel Site".to_string(),
    }
}

/// CSS selectors for the parts of a chapter page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSet {
    pub chapter_title: String,
    pub chapter_content: String,
    pub prev_chapter: String,
    pub next_chapter: String,
}

static TITLE_ATTRS: Lazy<Vec<Regex>> = Lazy::new(|| {
    attribute_patterns(&[
        r#"class=["'][^"']*?title[^"']*?["']"#,
        r#"class=["'][^"']*?chapter[^"']*?head[^"']*?["']"#,
        r#"id=["'][^"']*?title[^"']*?["']"#,
        r#"id=["'][^"']*?chapter[^"']*?head[^"']*?["']"#,
    ])
});

static CONTENT_ATTRS: Lazy<Vec<Regex>> = Lazy::new(|| {
    attribute_patterns(&[
        r#"class=["'][^"']*?chapter[^"']*?content[^"']*?["']"#,
        r#"class=["'][^"']*?article[^"']*?content[^"']*?["']"#,
        r#"class=["'][^"']*?novel[^"']*?content[^"']*?["']"#,
        r#"id=["'][^"']*?chapter[^"']*?content[^"']*?["']"#,
        r#"id=["'][^"']*?article[^"']*?content[^"']*?["']"#,
        r#"id=["'][^"']*?content[^"']*?["']"#,
    ])
});

static PREV_ATTRS: Lazy<Vec<Regex>> = Lazy::new(|| {
    attribute_patterns(&[
        r#"class=["'][^"']*?prev[^"']*?["']"#,
        r#"id=["'][^"']*?prev[^"']*?["']"#,
    ])
});

static NEXT_ATTRS: Lazy<Vec<Regex>> = Lazy::new(|| {
    attribute_patterns(&[
        r#"class=["'][^"']*?next[^"']*?["']"#,
        r#"id=["'][^"']*?next[^"']*?["']"#,
    ])
});

fn attribute_patterns(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
        .collect()
}

/// Guess selectors from class and id attributes, with generic defaults
pub fn detect_selectors(html: &str) -> SelectorSet {
    SelectorSet {
        chapter_title: first_selector(html, &TITLE_ATTRS).unwrap_or_else(|| "h1, h2, .title".to_string()),
        chapter_content: first_selector(html, &CONTENT_ATTRS)
            .unwrap_or_else(|| ".content, #content, article".to_string()),
        prev_chapter: first_selector(html, &PREV_ATTRS)
            .unwrap_or_else(|| "a:has(.prev), a.prev, .prev a".to_string()),
        next_chapter: first_selector(html, &NEXT_ATTRS)
            .unwrap_or_else(|| "a:has(.next), a.next, .next a".to_string()),
    }
}

fn first_selector(html: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        let attr = pattern.find(html)?.as_str();
        let (name, value) = attr.split_once('=')?;
        let value = value.trim_matches(|c| c == '"' || c == '\'').trim();
        if name.eq_ignore_ascii_case("id") {
            Some(format!("#{}", value))
        } else {
            Some(format!(".{}", value.split_whitespace().collect::<Vec<_>>().join(".")))
        }
    })
}

const FANDOMS: &[(&str, &[&str])] = &[
    (
        "Cultivation",
        &["cultivation", "cultivator", "dao", "immortal", "spiritual", "sect", "qi", "meridian", "dantian"],
    ),
    (
        "Xianxia",
        &["xianxia", "immortal", "fairy", "heavenly", "cultivate", "pill", "elixir", "spirit", "divine"],
    ),
    (
        "Wuxia",
        &["wuxia", "martial", "kungfu", "sword", "saber", "hero", "jianghu", "internal energy"],
    ),
    (
        "Fantasy",
        &["magic", "wizard", "spell", "sorcery", "elf", "dwarf", "dragon", "demon", "fairy"],
    ),
    (
        "Sci-Fi",
        &["mecha", "robot", "spaceship", "futuristic", "galaxy", "starship", "technology", "cyber"],
    ),
];

/// Setting of a text from genre keywords; empty when nothing matches
pub fn detect_fandom_context(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    FANDOMS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| *name)
        .unwrap_or("")
}
