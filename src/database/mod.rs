// Database module
// SQLite persistence for knowledge-base vectors and conversation history

pub mod history;
pub mod sqlite;
pub mod vector_store;

pub use history::SessionHistory;
pub use sqlite::Database;
pub use sqlite::models::{
    Document, DocumentMetadata, FilterField, MessageRole, NewDocument, ScoredDocument,
    SearchFilters, SessionMessage,
};
pub use vector_store::VectorStore;
