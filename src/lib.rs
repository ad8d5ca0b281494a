use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(#[source] ServiceError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Generation error: {0}")]
    Generation(#[source] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single call to an external collaborator (embedder or generator).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("misconfigured: {0}")]
    Misconfigured(String),

    #[error("request rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RagError {
    /// Stable identifier for the failure kind, used at the HTTP boundary.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Embedding(_) => "embedding_error",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Store(_) => "store_error",
            Self::Generation(_) => "generation_error",
            Self::Io(_) => "io_error",
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Embedding(ServiceError::Timeout { .. })
                | Self::Generation(ServiceError::Timeout { .. })
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod generation;
pub mod rag;
pub mod server;
pub mod transport;
