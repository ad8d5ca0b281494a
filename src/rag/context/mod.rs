//! Prompt assembly from retrieved chunks and conversation history.
//!
//! Chunks are rendered in retrieval order with a 1-based index and their
//! destination and source tags, so the model can cite where facts came from.
//! The final user message carries the context block and the question.

#[cfg(test)]
mod tests;

use crate::database::{ScoredDocument, SessionMessage};
use crate::generation::ChatMessage;

const UNKNOWN_DESTINATION: &str = "Kenya";
const UNKNOWN_SOURCE: &str = "unknown";

/// Outcome of prompt assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Nothing was retrieved; no generation should happen
    NoContext,
    Messages(Vec<ChatMessage>),
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    system_prompt: String,
    history_window: usize,
}

impl ContextAssembler {
    #[inline]
    pub fn new(system_prompt: impl Into<String>, history_window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history_window,
        }
    }

    #[inline]
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    pub fn build_prompt(
        &self,
        chunks: &[ScoredDocument],
        history: &[SessionMessage],
        question: &str,
    ) -> Prompt {
        if chunks.is_empty() {
            return Prompt::NoContext;
        }

        let window_start = history.len().saturating_sub(self.history_window);
        let recent = &history[window_start..];

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(
            recent
                .iter()
                .map(|message| ChatMessage::new(message.role.into(), message.content.clone())),
        );
        messages.push(ChatMessage::user(format!(
            "CONTEXT (use only this to answer):\n---\n{}\n---\n\nQUESTION: {}",
            render_context(chunks),
            question
        )));

        Prompt::Messages(messages)
    }
}

/// Numbered context block, most relevant chunk first
pub fn render_context(chunks: &[ScoredDocument]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let metadata = &chunk.document.metadata;
            format!(
                "[{}. {} | {}]\n{}",
                index + 1,
                metadata.destination.as_deref().unwrap_or(UNKNOWN_DESTINATION),
                metadata.source.as_deref().unwrap_or(UNKNOWN_SOURCE),
                chunk.document.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
