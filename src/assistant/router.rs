/*!
 * Command classification for chat messages.
 *
 * The router holds an ordered table of trigger phrases. A message matches
 * a row when it contains every word of one of the row's phrases (case
 * insensitive); the first matching row wins. Messages that match nothing
 * are treated as conversation.
 */

/// What a chat message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Add or configure a chapter website
    Website,
    /// Guess CSS selectors from pasted HTML
    DetectSelectors,
    /// Derive a URL pattern from a chapter URL
    DetectPattern,
    GenerateGlossary,
    AddGlossary,
    /// Quick single-shot translation
    Translate,
    /// Find or fetch a chapter by URL
    Chapter,
    /// Looks like a command but has no handler
    Unrecognized,
    /// Plain conversation
    Conversation,
}

/// One alternative of a row: every word must appear in the message
type Phrase = &'static [&'static str];

/// Trigger phrases in priority order
const COMMAND_TABLE: &[(&[Phrase], CommandKind)] = &[
    (&[&["add website"], &["configure website"]], CommandKind::Website),
    (&[&["detect", "selector"]], CommandKind::DetectSelectors),
    (&[&["detect pattern"], &["extract regex"]], CommandKind::DetectPattern),
    (&[&["generate glossary"]], CommandKind::GenerateGlossary),
    (&[&["add glossary"]], CommandKind::AddGlossary),
    (&[&["translate"]], CommandKind::Translate),
    (
        &[&["find chapter"], &["extract chapter"], &["fetch chapter"]],
        CommandKind::Chapter,
    ),
    (&[&["analyze"], &["detect"], &["extract"]], CommandKind::Unrecognized),
];

/// Table-driven classifier for chat messages
#[derive(Debug, Clone)]
pub struct CommandRouter {
    table: &'static [(&'static [Phrase], CommandKind)],
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self { table: COMMAND_TABLE }
    }
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first command whose trigger appears in `message`
    pub fn classify(&self, message: &str) -> CommandKind {
        let lower = message.to_lowercase();
        self.table
            .iter()
            .find(|(phrases, _)| {
                phrases
                    .iter()
                    .any(|words| words.iter().all(|w| lower.contains(w)))
            })
            .map(|(_, kind)| *kind)
            .unwrap_or(CommandKind::Conversation)
    }

    pub fn is_command(&self, message: &str) -> bool {
        self.classify(message) != CommandKind::Conversation
    }
}
