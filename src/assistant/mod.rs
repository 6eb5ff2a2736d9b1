/*!
 * Chat assistant.
 *
 * Messages are first classified by the `CommandRouter`. Commands are
 * handled directly against the glossary store, the translation helpers or
 * an optional `ChapterFetcher`; everything else becomes a conversational
 * completion with the application context in the prompt. Without a
 * configured model the assistant answers with canned replies.
 *
 * - `router`: trigger phrase table
 * - `commands`: argument extraction helpers
 * - `context`: application context, history and the conversation prompt
 * - `fallback`: canned replies
 */

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, warn};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{GlossaryError, ProviderError};
use crate::glossary::{GlossaryStore, NewGlossaryEntry};
use crate::providers::models::DurableCache;
use crate::providers::{CompletionProvider, CompletionRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::text_utils::{cjk_spans, contains_cjk};
use crate::translation::glossary_generation::generate_glossary_entries;
use crate::translation::prompts::{quick_translate_prompt, term_translation_prompt};

pub mod commands;
pub mod context;
pub mod fallback;
pub mod router;

pub use commands::{SelectorSet, detect_fandom_context};
pub use context::{AppContext, ChatInputs, ChatMessage, ChatRole, Personality, ProjectRef};
pub use router::{CommandKind, CommandRouter};

use commands::{
    detect_selectors, extract_html, extract_url, generate_regex_pattern, parse_term_request, website_name,
};
use context::{STORED_HISTORY_LIMIT, conversation_prompt};
use fallback::fallback_response;

/// Durable cache key of the chat history
pub const CHAT_HISTORY_KEY: &str = "chat_history";

const QUICK_TRANSLATE_TEMPERATURE: f32 = 0.3;
const QUICK_TRANSLATE_MAX_TOKENS: u32 = 1000;
const TERM_EXTRACTION_TEMPERATURE: f32 = 0.2;
const TERM_EXTRACTION_MAX_TOKENS: u32 = 100;

/// How many generated terms a reply lists
const GENERATED_SAMPLE_SIZE: usize = 5;

/// A novel website the chapter fetcher can read
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteProfile {
    pub name: String,
    pub base_url: String,
    pub url_pattern: String,
    pub selectors: SelectorSet,
}

/// A chapter downloaded from a website
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedChapter {
    pub title: String,
    pub content: String,
}

/// Downloads chapters from configured novel websites
#[async_trait]
pub trait ChapterFetcher: Send + Sync {
    /// Save a website configuration
    async fn configure_website(&self, site: &WebsiteProfile) -> anyhow::Result<()>;

    /// Fetch the chapter at `url`
    async fn fetch_chapter(&self, url: &Url) -> anyhow::Result<FetchedChapter>;
}

/// The chat assistant
pub struct Assistant {
    provider: Arc<dyn CompletionProvider>,
    store: GlossaryStore,
    fetcher: Option<Arc<dyn ChapterFetcher>>,
    history_store: Option<Arc<dyn DurableCache>>,
    router: CommandRouter,
    personality: Personality,
    history: Mutex<Vec<ChatMessage>>,
}

impl fmt::Debug for Assistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assistant")
            .field("name", &self.personality.name)
            .field("history", &self.history.lock().len())
            .finish_non_exhaustive()
    }
}

impl Assistant {
    pub fn new(provider: Arc<dyn CompletionProvider>, store: GlossaryStore) -> Self {
        Self {
            provider,
            store,
            fetcher: None,
            history_store: None,
            router: CommandRouter::new(),
            personality: Personality::default(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ChapterFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Keep the chat history in `cache` between runs
    pub fn with_history_store(mut self, cache: Arc<dyn DurableCache>) -> Self {
        self.history_store = Some(cache);
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = personality;
        self
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    /// Load the stored history; a missing or unreadable history starts empty
    pub async fn load_history(&self) {
        let Some(cache) = &self.history_store else {
            return;
        };

        let loaded = match cache.get(CHAT_HISTORY_KEY).await {
            Ok(Some(data)) => serde_json::from_str::<Vec<ChatMessage>>(&data).unwrap_or_else(|e| {
                warn!("Stored chat history is invalid, starting fresh: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Error loading chat history: {:#}", e);
                Vec::new()
            }
        };
        *self.history.lock() = loaded;
    }

    pub async fn clear_history(&self) {
        self.history.lock().clear();
        self.save_history().await;
    }

    /// Answer a chat message and record both sides in the history
    pub async fn process_message(&self, message: &str, inputs: &ChatInputs) -> String {
        let reply = self.respond(message, inputs).await;

        {
            let mut history = self.history.lock();
            history.push(ChatMessage::user(message));
            history.push(ChatMessage::assistant(reply.clone()));
        }
        self.save_history().await;

        reply
    }

    /// Answer a chat message without touching the history
    pub async fn respond(&self, message: &str, inputs: &ChatInputs) -> String {
        let kind = self.router.classify(message);
        debug!("Chat message classified as {:?}", kind);

        match kind {
            CommandKind::Website => self.configure_website(message).await,
            CommandKind::DetectSelectors => detect_selectors_reply(message),
            CommandKind::DetectPattern => detect_pattern_reply(message),
            CommandKind::GenerateGlossary => self.generate_glossary(inputs).await,
            CommandKind::AddGlossary => self.add_to_glossary(message, inputs).await,
            CommandKind::Translate => self.quick_translate(message).await,
            CommandKind::Chapter => self.extract_chapter(message, inputs).await,
            CommandKind::Unrecognized => {
                "I'm not sure how to execute that command. Could you please be more specific?".to_string()
            }
            CommandKind::Conversation => self.converse(message, inputs).await,
        }
    }

    fn can_use_ai(&self) -> bool {
        self.provider.is_configured() && self.provider.default_model().is_some()
    }

    async fn complete(&self, prompt: String, temperature: f32, max_tokens: u32) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(prompt)
            .model(self.provider.default_model().unwrap_or_default())
            .temperature(temperature)
            .max_tokens(max_tokens);
        self.provider.complete(request, &CancellationToken::new()).await
    }

    async fn converse(&self, message: &str, inputs: &ChatInputs) -> String {
        if !self.can_use_ai() {
            return fallback_response(message).to_string();
        }

        let glossary_count = match &inputs.project {
            Some(project) => self.store.entries(&project.id).await.ok().map(|e| e.len()),
            None => None,
        };
        let context = AppContext::build(
            inputs,
            self.provider.is_configured(),
            self.provider.default_model().is_some(),
            glossary_count,
        );
        let history = self.history();
        let prompt = conversation_prompt(&self.personality, &context, &history, message);

        match self.complete(prompt, DEFAULT_TEMPERATURE, DEFAULT_MAX_TOKENS).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => fallback_response(message).to_string(),
            Err(e) => {
                error!("Error getting AI response: {}", e);
                fallback_response(message).to_string()
            }
        }
    }

    async fn configure_website(&self, message: &str) -> String {
        let Some(url) = extract_url(message) else {
            return "To add a website, please provide a URL. For example: 'Add website https://example.com/novel/123'"
                .to_string();
        };
        let base_url = url.origin().ascii_serialization();
        let pattern = generate_regex_pattern(url.as_str());

        let Some(html) = extract_html(message) else {
            return format!(
                "I'll help you add this website! Let me analyze the URL pattern...\n\n\
                 For {url}, here's what I detected:\n\n\
                 Base URL: {base_url}\n\
                 URL Pattern: {pattern}\n\n\
                 To complete the configuration, I need the website's HTML to detect selectors. \
                 Please copy the page's HTML and send it to me with: 'Detect selectors from this HTML: [paste HTML here]'"
            );
        };

        let site = WebsiteProfile {
            name: website_name(&url),
            base_url,
            url_pattern: pattern,
            selectors: detect_selectors(&html),
        };
        let summary = website_summary(&site);

        let Some(fetcher) = &self.fetcher else {
            return format!(
                "Here's the configuration I detected:\n\n{}\n\nNo chapter fetcher is set up, so I can't save it yet.",
                summary
            );
        };

        match fetcher.configure_website(&site).await {
            Ok(()) => format!(
                "✅ Website \"{}\" configured!\n\n{}\n\nYou can now fetch chapters from this site.",
                site.name, summary
            ),
            Err(e) => {
                error!("Error configuring website: {:#}", e);
                "I had trouble saving that website configuration. Please try again.".to_string()
            }
        }
    }

    async fn generate_glossary(&self, inputs: &ChatInputs) -> String {
        let Some(project) = &inputs.project else {
            return "Please select a project first before generating glossary terms.".to_string();
        };
        let text = inputs.input_text.trim();
        if text.is_empty() {
            return "I need some Chinese text in the input area to generate glossary terms. Please provide some text first."
                .to_string();
        }
        if !self.can_use_ai() {
            return "To generate glossary terms, you need to configure the OpenRouter API first.".to_string();
        }

        let fandom = detect_fandom_context(text);
        let result = generate_glossary_entries(
            self.provider.as_ref(),
            &self.store,
            &project.id,
            text,
            true,
            fandom,
            &CancellationToken::new(),
        )
        .await;

        let generated = match result {
            Ok(generated) => generated,
            Err(e) => {
                error!("Error with glossary generation: {}", e);
                return "I encountered an error while generating glossary terms. Please try again or check the logs for details."
                    .to_string();
            }
        };

        let mut reply = format!(
            "✅ Success! I've generated and added {} glossary terms",
            generated.stats.added
        );
        if generated.stats.skipped > 0 {
            reply.push_str(&format!(" ({} duplicates were skipped)", generated.stats.skipped));
        }
        if !fandom.is_empty() {
            reply.push_str(&format!(" for the \"{}\" context", fandom));
        }
        reply.push_str(".\n\n");

        if !generated.added.is_empty() {
            reply.push_str("Here are some of the terms I added:\n");
            for entry in generated.added.iter().take(GENERATED_SAMPLE_SIZE) {
                reply.push_str(&format!("- {} → {}\n", entry.chinese_term, entry.translation));
            }
            if generated.added.len() > GENERATED_SAMPLE_SIZE {
                reply.push_str(&format!(
                    "...and {} more terms.\n",
                    generated.added.len() - GENERATED_SAMPLE_SIZE
                ));
            }
        }

        reply.push_str("\nThese terms will be automatically applied during translation to ensure consistency!");
        reply
    }

    async fn add_to_glossary(&self, message: &str, inputs: &ChatInputs) -> String {
        if !contains_cjk(message) {
            return "Please provide the Chinese term you'd like to add to the glossary. For example: 'Add glossary term 魔法 as magic'"
                .to_string();
        }
        let Some(project) = &inputs.project else {
            return "Please select a project first before adding glossary terms.".to_string();
        };
        let Some(request) = parse_term_request(message) else {
            return "I couldn't find a Chinese term in your message. Please include the Chinese term you want to add."
                .to_string();
        };

        let term = request.chinese_term.clone();
        let unclear = || {
            format!(
                "I found the Chinese term \"{term}\", but I'm not sure what the translation should be. \
                 Please specify like: \"Add glossary term {term} as [translation]\""
            )
        };

        let translation = match request.translation {
            Some(translation) => translation,
            None if self.can_use_ai() => {
                match self
                    .complete(
                        term_translation_prompt(message, &term),
                        TERM_EXTRACTION_TEMPERATURE,
                        TERM_EXTRACTION_MAX_TOKENS,
                    )
                    .await
                {
                    Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                    Ok(_) => return unclear(),
                    Err(e) => {
                        error!("Error extracting translation using AI: {}", e);
                        return unclear();
                    }
                }
            }
            None => return unclear(),
        };

        let entry = NewGlossaryEntry::new(&project.id, &term, &translation)
            .category(request.category)
            .notes(&request.notes);

        match self.store.add(entry).await {
            Ok(stored) => format!(
                "✅ Successfully added \"{}\" → \"{}\" to your glossary as a {} term! Is there anything else you'd like to add?",
                stored.chinese_term, stored.translation, stored.category
            ),
            Err(GlossaryError::Duplicate { term }) => {
                format!("\"{}\" is already in your glossary, so I left the existing entry as it is.", term)
            }
            Err(e) => {
                error!("Error adding glossary term: {}", e);
                "I encountered an error while adding the term to your glossary. Please try again or add it manually."
                    .to_string()
            }
        }
    }

    async fn quick_translate(&self, message: &str) -> String {
        if !contains_cjk(message) {
            return "Please provide Chinese text to translate. For example: 'Translate 你好'".to_string();
        }
        if !self.can_use_ai() {
            return "To translate text, you need to configure the OpenRouter API first.".to_string();
        }

        let chinese_text = cjk_spans(message).concat();
        match self
            .complete(
                quick_translate_prompt(&chinese_text),
                QUICK_TRANSLATE_TEMPERATURE,
                QUICK_TRANSLATE_MAX_TOKENS,
            )
            .await
        {
            Ok(translation) => format!("Original: {}\n\nTranslation: {}", chinese_text, translation.trim()),
            Err(e) => {
                error!("Error translating text: {}", e);
                "I encountered an error while translating. Please try again with a shorter text or check your OpenRouter settings."
                    .to_string()
            }
        }
    }

    async fn extract_chapter(&self, message: &str, inputs: &ChatInputs) -> String {
        let Some(url) = extract_url(message) else {
            return "Please provide a URL to find or extract a chapter. For example: 'Find chapter from https://example.com/novel/123'"
                .to_string();
        };
        if inputs.project.is_none() {
            return "Please select a project first before extracting chapters.".to_string();
        }

        let Some(fetcher) = &self.fetcher else {
            return format!(
                "I'll help you extract a chapter from {url}\n\n\
                 No chapter fetcher is set up yet. If the website isn't configured, I can help you set it up. \
                 Just send me the website's HTML with a message like: 'Configure website {url} with this HTML: [paste HTML here]'"
            );
        };

        match fetcher.fetch_chapter(&url).await {
            Ok(chapter) => format!(
                "📖 Fetched \"{}\" ({} characters). You can translate it whenever you're ready!",
                chapter.title,
                chapter.content.chars().count()
            ),
            Err(e) => {
                error!("Error fetching chapter: {:#}", e);
                "I encountered an error while fetching the chapter. Please check that the website is configured."
                    .to_string()
            }
        }
    }

    async fn save_history(&self) {
        let Some(cache) = &self.history_store else {
            return;
        };

        let trimmed = {
            let history = self.history.lock();
            let start = history.len().saturating_sub(STORED_HISTORY_LIMIT);
            history[start..].to_vec()
        };

        match serde_json::to_string(&trimmed) {
            Ok(data) => {
                if let Err(e) = cache.set(CHAT_HISTORY_KEY, &data).await {
                    error!("Error saving chat history: {:#}", e);
                }
            }
            Err(e) => error!("Error serializing chat history: {}", e),
        }
    }
}

fn website_summary(site: &WebsiteProfile) -> String {
    format!(
        "Name: {}\nBase URL: {}\nURL Pattern: {}\nChapter Title: {}\nChapter Content: {}\nPrevious Chapter: {}\nNext Chapter: {}",
        site.name,
        site.base_url,
        site.url_pattern,
        site.selectors.chapter_title,
        site.selectors.chapter_content,
        site.selectors.prev_chapter,
        site.selectors.next_chapter
    )
}

fn detect_selectors_reply(message: &str) -> String {
    let Some(html) = extract_html(message) else {
        return "Please provide the website's HTML content so I can detect the selectors. \
                You can copy the entire page's HTML using browser developer tools."
            .to_string();
    };

    let selectors = detect_selectors(&html);
    format!(
        "I've analyzed the HTML and detected the following selectors:\n\n\
         Chapter Title: {}\n\
         Chapter Content: {}\n\
         Previous Chapter: {}\n\
         Next Chapter: {}\n\n\
         Would you like me to save this configuration? If so, send 'Add website <URL>' with the same HTML.",
        selectors.chapter_title, selectors.chapter_content, selectors.prev_chapter, selectors.next_chapter
    )
}

fn detect_pattern_reply(message: &str) -> String {
    match extract_url(message) {
        Some(url) => format!(
            "Here's the URL pattern I detected for {}:\n\nBase URL: {}\nURL Pattern: {}",
            url,
            url.origin().ascii_serialization(),
            generate_regex_pattern(url.as_str())
        ),
        None => "Please provide a URL for pattern detection. For example: 'Detect pattern from https://example.com/novel/123'"
            .to_string(),
    }
}
