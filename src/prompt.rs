//! Prompt assembly for the language-model call.
//!
//! Builds the final prompt from the merged context, the recent conversation
//! history, and an optional caller-supplied instruction. No length
//! truncation happens here; callers size `top_k` and history to fit their
//! model.

use crate::models::{ChatMessage, Role};
use crate::retrieval::AttributedHit;

/// Maximum number of history turns included in the prompt.
pub const MAX_HISTORY_TURNS: usize = 5;

/// Placeholder used when the session has no prior turns.
const EMPTY_HISTORY: &str = "This is the first question.";

/// Built-in instruction for grounded answering. A caller-supplied
/// `custom_instruction` replaces this text entirely.
const DEFAULT_INSTRUCTION: &str = "\
You are a helpful assistant that answers questions based ONLY on the provided context.

IMPORTANT RULES:
1. Answer ONLY using information from the provided context
2. If the answer is not in the context, say \"I don't have that information in the document\"
3. Be concise and direct
4. Quote relevant parts of the context when appropriate
5. Answer in the same language as the question
6. Never invent information that is not in the context";

/// Assemble the full prompt: instruction, context block, recent history,
/// and the user question.
pub fn assemble_prompt(
    query: &str,
    hits: &[AttributedHit],
    history: &[ChatMessage],
    custom_instruction: Option<&str>,
) -> String {
    let context = hits
        .iter()
        .map(|h| h.context_line())
        .collect::<Vec<_>>()
        .join("\n\n");

    let history_text = format_history(history);
    let instruction = custom_instruction.unwrap_or(DEFAULT_INSTRUCTION);

    format!(
        "{}\n\nDocument context:\n{}\n\nConversation:\n{}\n\nUser question: {}\n\nAnswer:",
        instruction, context, history_text, query
    )
}

/// The last [`MAX_HISTORY_TURNS`] turns as alternating `user:` /
/// `assistant:` lines in chronological order.
fn format_history(history: &[ChatMessage]) -> String {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let lines: Vec<String> = history[start..]
        .iter()
        .map(|msg| match msg.role {
            Role::User => format!("user: {}", msg.content),
            Role::Assistant => format!("assistant: {}", msg.content),
        })
        .collect();
    if lines.is_empty() {
        EMPTY_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}
