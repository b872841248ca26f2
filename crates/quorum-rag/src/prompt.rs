//! Prompt assembly.

use quorum_core::{Chunk, ConversationTurn, Role};

use crate::llm::PromptMessage;

/// Context placeholder used when retrieval returned nothing.
pub const NO_CONTEXT: &str = "No relevant documents found.";

const SYSTEM_TEMPLATE: &str = "You are a helpful AI assistant for the company. \
You can answer questions using the provided context from company documents, \
or use your general knowledge for other questions.

Context from company documents:
{context}

Instructions:
- If the context contains relevant information, use it to answer the question accurately.
- If the context doesn't contain relevant information, use your general knowledge to provide a helpful answer.
- Be clear about whether you're answering from company documents or general knowledge.
- If you're unsure, say so honestly.";

/// Join retrieved chunk texts into the context block.
pub fn format_context(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System prompt, then history oldest first, then the new question.
pub fn build_prompt(
    chunks: &[Chunk],
    history: &[ConversationTurn],
    question: &str,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(
        SYSTEM_TEMPLATE.replace("{context}", &format_context(chunks)),
    ));
    messages.extend(history.iter().map(|turn| match turn.role {
        Role::Human => PromptMessage::user(turn.text.clone()),
        Role::Assistant => PromptMessage::assistant(turn.text.clone()),
    }));
    messages.push(PromptMessage::user(question));
    messages
}

/// The bare question with no template, context, or history.
pub fn direct_prompt(question: &str) -> Vec<PromptMessage> {
    vec![PromptMessage::user(question)]
}
