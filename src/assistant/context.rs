/*!
 * Conversation context for the assistant.
 *
 * The application state the assistant can see is summarized in an
 * `AppContext`, serialized as JSON into the conversation prompt together
 * with the most recent chat history.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text_utils::count_cjk;

/// History messages included in a prompt
pub const PROMPT_HISTORY_LIMIT: usize = 10;

/// History messages kept in storage
pub const STORED_HISTORY_LIMIT: usize = 100;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRole::User => write!(f, "User"),
            ChatRole::Assistant => write!(f, "Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Who the assistant is and how it talks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Personality {
    pub name: String,
    pub traits: Vec<String>,
    pub speaking_style: String,
}

impl Default for Personality {
    fn default() -> Self {
        Self {
            name: "Quill-chan".to_string(),
            traits: ["helpful", "knowledgeable", "friendly", "efficient"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            speaking_style: "friendly but professional, using occasional anime-inspired emoticons"
                .to_string(),
        }
    }
}

/// The project the chat is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// What the front end knows when a message is sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatInputs {
    /// Which view or command the user is in
    pub current_tab: String,
    pub project: Option<ProjectRef>,
    /// Source text currently loaded for translation
    pub input_text: String,
    /// Latest translation output
    pub output_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub has_open_router_api_key: bool,
    pub has_open_router_model: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryStats {
    pub available: bool,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStats {
    pub available: bool,
    pub length: usize,
    pub chinese_char_count: usize,
    pub has_chinese_text: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputStats {
    pub available: bool,
    pub length: usize,
}

/// Application state summarized for the model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppContext {
    pub current_tab: String,
    pub current_project: ProjectContext,
    pub glossary_stats: GlossaryStats,
    pub input_stats: InputStats,
    pub output_stats: OutputStats,
    pub ai_available: bool,
}

impl AppContext {
    /// Summarize `inputs`; `glossary_entries` is None when the glossary could not be read
    pub fn build(
        inputs: &ChatInputs,
        has_api_key: bool,
        has_model: bool,
        glossary_entries: Option<usize>,
    ) -> Self {
        let current_project = match &inputs.project {
            Some(project) => ProjectContext {
                available: true,
                name: Some(project.name.clone()),
                id: Some(project.id.clone()),
                has_open_router_api_key: has_api_key,
                has_open_router_model: has_model,
            },
            None => ProjectContext {
                available: false,
                name: None,
                id: None,
                has_open_router_api_key: has_api_key,
                has_open_router_model: has_model,
            },
        };

        let chinese_char_count = count_cjk(&inputs.input_text);

        Self {
            current_tab: if inputs.current_tab.is_empty() {
                "unknown".to_string()
            } else {
                inputs.current_tab.clone()
            },
            current_project,
            glossary_stats: GlossaryStats {
                available: glossary_entries.is_some(),
                entry_count: glossary_entries.unwrap_or_default(),
            },
            input_stats: InputStats {
                available: !inputs.input_text.is_empty(),
                length: inputs.input_text.chars().count(),
                chinese_char_count,
                has_chinese_text: chinese_char_count > 0,
            },
            output_stats: OutputStats {
                available: !inputs.output_text.is_empty(),
                length: inputs.output_text.chars().count(),
            },
            ai_available: has_api_key && has_model,
        }
    }
}

/// The prompt for a conversational reply
pub fn conversation_prompt(
    personality: &Personality,
    context: &AppContext,
    history: &[ChatMessage],
    message: &str,
) -> String {
    let personality_json = serde_json::to_string(personality).unwrap_or_default();
    let context_json = serde_json::to_string(context).unwrap_or_default();
    let start = history.len().saturating_sub(PROMPT_HISTORY_LIMIT);
    let history_text = history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are {name}, a helpful anime-inspired assistant for the QuillSync AI translation application.\n\n\
         Your personality: {personality_json}\n\n\
         Current application context: {context_json}\n\n\
         Conversation history:\n{history_text}\n\n\
         User message: {message}\n\n\
         Respond in a {style} manner. Keep your responses helpful, concise, and focused on the user's needs related to translation, glossary management, chapter fetching, or settings configuration.\n\n\
         Format your response with proper paragraphs and spacing. Do not use asterisks (*) for emphasis or markdown formatting. If you create a list, use proper line breaks.\n\n\
         If you include any emoticons, make sure they're cute anime-style emoticons like (◕‿◕) or (≧◡≦), but use them sparingly.",
        name = personality.name,
        style = personality.speaking_style,
    )
}
