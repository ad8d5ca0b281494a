// RAG module
// Retrieval, prompt assembly and the question-answering pipeline

pub mod context;
pub mod ingest;
pub mod pipeline;
pub mod retriever;

pub use context::{ContextAssembler, Prompt};
pub use ingest::{KnowledgeBase, PopulateReport, PopulateStatus, SeedEntry, load_seed_file};
pub use pipeline::{Answer, AnswerPipeline, Question, SourceRef, Stage};
pub use retriever::{RetrievalFilter, Retriever, normalize_filter_value};
