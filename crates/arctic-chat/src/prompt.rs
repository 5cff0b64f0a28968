//! Flattening of the transcript into the model's prompt text.

use arctic_core::types::Message;

/// Role marker that opens the model's reply.
const OPEN_ASSISTANT: &str = "assistant";

/// Render the transcript as `role\ncontent` blocks joined by newlines,
/// followed by an open assistant marker and a trailing newline.
pub fn assemble_prompt(messages: &[Message]) -> String {
    let mut parts: Vec<String> = messages
        .iter()
        .map(|m| format!("{}\n{}", m.role, m.content))
        .collect();
    parts.push(OPEN_ASSISTANT.to_string());
    parts.push(String::new());
    parts.join("\n")
}
