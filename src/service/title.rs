//! Thread title generation.

use crate::error::{LoomError, Result};
use crate::providers::ModelRegistry;
use crate::session::{Message, Role, ThreadMessage, DEFAULT_THREAD_TITLE};

const MAX_TITLE_CHARS: usize = 10;

const TITLE_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates concise titles for conversations.";

const TITLE_USER_PROMPT: &str = "Based on the following conversation, generate a concise and \
descriptive title (maximum 10 characters). The title should capture the main topic or question. \
Only return the title text, nothing else.\nConversation:\n";

/// `User:`/`Assistant:`/`Tool:` lines for every non-system message.
pub fn build_transcript(messages: &[ThreadMessage]) -> String {
    let mut transcript = String::new();
    for msg in messages {
        let label = match msg.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
            Role::System => continue,
        };
        transcript.push_str(label);
        transcript.push_str(": ");
        transcript.push_str(&msg.content);
        transcript.push('\n');
    }
    transcript
}

/// Trim, strip one layer of surrounding double quotes and cap the title at
/// ten characters (counted as chars, not bytes).
pub fn clean_thread_title(raw: &str) -> String {
    let mut title = raw.trim();
    if title.len() >= 2 && title.starts_with('"') && title.ends_with('"') {
        title = title[1..title.len() - 1].trim();
    }

    if title.is_empty() {
        return DEFAULT_THREAD_TITLE.to_string();
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
        return format!("{}...", head);
    }
    title.to_string()
}

/// Ask the default model for a short title summarising `messages`.
pub async fn generate_thread_title(
    models: &ModelRegistry,
    messages: &[ThreadMessage],
) -> Result<String> {
    let transcript = build_transcript(messages);
    if transcript.is_empty() {
        return Ok(DEFAULT_THREAD_TITLE.to_string());
    }

    let model_id = models.default_model();
    let provider = models.get(model_id).ok_or_else(|| {
        LoomError::Provider(format!("title model not found: {}", model_id))
    })?;

    let prompt = [
        Message::system(TITLE_SYSTEM_PROMPT),
        Message::user(&format!("{}{}", TITLE_USER_PROMPT, transcript)),
    ];
    let response = provider.chat(model_id, &prompt, &[]).await?;
    Ok(clean_thread_title(&response.content))
}
