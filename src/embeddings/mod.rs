// Embeddings module
// Embedder contract, vector math and the pluggable backends

#[cfg(test)]
mod tests;

pub mod hashing;
pub mod huggingface;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, EmbedderBackend};
use crate::{RagError, Result, ServiceError};

pub use hashing::HashingEmbedder;
pub use huggingface::HuggingFaceClient;
pub use ollama::OllamaClient;

/// Maps text to a fixed-length vector.
///
/// Every vector returned by one instance has the same length. `embed_many`
/// must be equivalent to calling `embed_one` per text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier reported by health checks
    fn model_name(&self) -> &str;

    /// Whether returned vectors are already unit length
    fn normalizes(&self) -> bool;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }
}

/// Build the embedder selected by `[embedder] backend`
pub fn from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedder.backend {
        EmbedderBackend::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbedderBackend::HuggingFace => Arc::new(HuggingFaceClient::new(config)?),
        EmbedderBackend::Hashing => Arc::new(HashingEmbedder::new(
            config.embedder.embedding_dimension as usize,
        )),
    };
    Ok(embedder)
}

/// Scale `vector` to unit length. Zero vectors are left as they are.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Cosine similarity clamped to `[-1, 1]`; 0.0 when either side is a zero vector
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Reject empty vectors and vectors containing NaN or infinity
pub(crate) fn check_vector(vector: &[f32], expected_dimension: Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(RagError::Embedding(ServiceError::Malformed(
            "embedding is empty".to_string(),
        )));
    }

    if vector.iter().any(|value| !value.is_finite()) {
        return Err(RagError::Embedding(ServiceError::Malformed(
            "embedding contains non-finite values".to_string(),
        )));
    }

    if let Some(expected) = expected_dimension {
        if vector.len() != expected {
            return Err(RagError::Embedding(ServiceError::Malformed(format!(
                "expected {} dimensions, got {}",
                expected,
                vector.len()
            ))));
        }
    }

    Ok(())
}
