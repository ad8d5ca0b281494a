//! Question answering: retrieve, assemble, generate, persist.
//!
//! ```text
//! Received -> Retrieving -> NoContext ---------------------------------> Completed
//!                        \-> Assembling -> Generating -> Persisting ---> Completed
//! (any read-path or generation failure)                             ---> Failed
//! ```
//!
//! A failed history write is logged and the answer is still returned.


use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::RetrievalConfig;
use crate::database::{ScoredDocument, SessionHistory};
use crate::generation::Generator;
use crate::rag::context::{ContextAssembler, Prompt};
use crate::rag::retriever::{RetrievalFilter, Retriever};
use crate::{RagError, Result};

const UNKNOWN_TAG: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Retrieving,
    NoContext,
    Assembling,
    Generating,
    Persisting,
    Completed,
    Failed,
}

impl std::fmt::Display for Stage {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Stage::Received => "received",
            Stage::Retrieving => "retrieving",
            Stage::NoContext => "no_context",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
            Stage::Persisting => "persisting",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Question {
    pub text: String,
    pub session_id: Option<String>,
    /// Falls back to the configured default when absent
    pub top_k: Option<usize>,
    pub filter: RetrievalFilter,
}

impl Question {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    #[inline]
    pub fn with_filter(mut self, filter: RetrievalFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub destination: String,
    pub source: String,
    pub similarity: f64,
}

impl From<&ScoredDocument> for SourceRef {
    fn from(scored: &ScoredDocument) -> Self {
        let metadata = &scored.document.metadata;
        Self {
            destination: metadata
                .destination
                .clone()
                .unwrap_or_else(|| UNKNOWN_TAG.to_string()),
            source: metadata
                .source
                .clone()
                .unwrap_or_else(|| UNKNOWN_TAG.to_string()),
            similarity: (f64::from(scored.similarity) * 1000.0).round() / 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub context_used: usize,
}

pub struct AnswerPipeline {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: Arc<dyn Generator>,
    history: SessionHistory,
    default_top_k: usize,
    no_context_answer: String,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        history: SessionHistory,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            retriever,
            assembler: ContextAssembler::new(config.system_prompt.clone(), config.history_window),
            generator,
            history,
            default_top_k: config.default_top_k,
            no_context_answer: config.no_context_answer.clone(),
        }
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub async fn answer(&self, question: &Question) -> Result<Answer> {
        match self.run(question).await {
            Ok(answer) => {
                debug!(stage = %Stage::Completed, context_used = answer.context_used);
                Ok(answer)
            }
            Err(e) => {
                error!(stage = %Stage::Failed, kind = e.kind(), "Answer pipeline failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run(&self, question: &Question) -> Result<Answer> {
        debug!(stage = %Stage::Received, session = ?question.session_id);
        let text = question.text.trim();
        if text.is_empty() {
            return Err(RagError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }
        let top_k = question.top_k.unwrap_or(self.default_top_k);
        let session_id = question
            .session_id
            .as_deref()
            .filter(|id| !id.trim().is_empty());

        debug!(stage = %Stage::Retrieving, top_k);
        let chunks = self.retriever.retrieve(text, top_k, &question.filter).await?;

        let history = match session_id {
            Some(id) if !chunks.is_empty() => {
                self.history.recent(id, self.assembler.history_window()).await?
            }
            _ => Vec::new(),
        };

        let messages = match self.assembler.build_prompt(&chunks, &history, text) {
            Prompt::NoContext => {
                info!(stage = %Stage::NoContext, "No knowledge base match for question");
                return Ok(Answer {
                    answer: self.no_context_answer.clone(),
                    sources: Vec::new(),
                    context_used: 0,
                });
            }
            Prompt::Messages(messages) => messages,
        };
        debug!(stage = %Stage::Assembling, chunks = chunks.len(), history = history.len());

        debug!(stage = %Stage::Generating, messages = messages.len());
        let answer = self.generator.generate(&messages).await?;

        if let Some(id) = session_id {
            debug!(stage = %Stage::Persisting, session = id);
            if let Err(e) = self.history.append_turn(id, text, &answer).await {
                warn!("Failed to save turn for session {}: {}", id, e);
            }
        }

        Ok(Answer {
            answer,
            sources: chunks.iter().map(SourceRef::from).collect(),
            context_used: chunks.len(),
        })
    }
}
