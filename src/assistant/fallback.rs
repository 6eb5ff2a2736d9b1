/*!
 * Canned replies used when the model is unavailable.
 */

/// Keyword rows checked in order; the first row with a matching keyword answers
const RESPONSES: &[(&[&str], &str)] = &[
    (
        &["help", "how do i"],
        "I'd be happy to help! QuillSync AI is a translation assistant for webnovels and other texts. \
         Use `quillsync translate <FILE>` to translate Chinese text, `quillsync glossary` to manage terms, \
         and `quillsync models` to pick an OpenRouter model. What would you like help with? (｡◕‿◕｡)",
    ),
    (
        &["glossary", "term"],
        "The glossary keeps translations of names and special terms consistent. You can add terms \
         yourself with `quillsync glossary add`, import a JSON file, or let the AI extract them with \
         `quillsync glossary generate`. Configure your OpenRouter API key first for the best results! (✿◠‿◠)",
    ),
    (
        &["translat", "chinese"],
        "To translate, run `quillsync translate <FILE>` on a file with Chinese text. Glossary terms are \
         applied before the text is sent. For long texts, try the `chapter` or `word-count` chunking \
         strategy to get better results! (ﾉ◕ヮ◕)ﾉ*:･ﾟ✧",
    ),
    (
        &["chapter", "novel"],
        "I can help you work out the URL pattern and page selectors of a novel site. Send me \
         'Add website <URL>' and, if you can, the page's HTML with 'Detect selectors from this HTML: ...' ヽ(・∀・)ﾉ",
    ),
    (
        &["setting", "config"],
        "Settings live in conf.json: your OpenRouter API key and model, project instructions, \
         auto-verification and the chunking strategy. You can also set the OPENROUTER_API_KEY \
         environment variable. (≧◡≦)",
    ),
];

const DEFAULT_RESPONSE: &str = "I'm here to help with your translation needs! I can assist with the glossary, \
     quick translations, and setting up novel websites. For more advanced help, please configure the \
     OpenRouter API to enable my AI capabilities. What would you like to do? (◕‿◕)";

/// A keyword-matched reply for `message`
pub fn fallback_response(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    RESPONSES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, response)| *response)
        .unwrap_or(DEFAULT_RESPONSE)
}
