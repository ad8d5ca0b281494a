
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::{Embedder, check_vector};
use crate::transport::HttpTransport;
use crate::{RagError, Result, ServiceError};

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: u32,
    dimension: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .embedder
            .ollama_url()
            .map_err(|e| RagError::Config(format!("Failed to generate Ollama URL: {}", e)))?;

        let transport = HttpTransport::new(config.embedder.timeout())
            .with_retry_attempts(config.embedder.retry_attempts);

        Ok(Self {
            base_url,
            model: config.embedder.model.clone(),
            batch_size: config.embedder.batch_size,
            dimension: config.embedder.embedding_dimension as usize,
            transport,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = self.transport.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.transport = self.transport.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.transport = self.transport.with_backoff_base(base);
        self
    }

    /// Test connection to Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;

        if models.iter().any(|m| m.name == self.model) {
            info!(
                "Health check passed for Ollama server at {} with model {}",
                self.base_url, self.model
            );
            Ok(())
        } else {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            Err(RagError::Embedding(ServiceError::Misconfigured(format!(
                "model '{}' is not available",
                self.model
            ))))
        }
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .transport
            .get("ollama list models", &url, None)
            .map_err(RagError::Embedding)?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(ServiceError::Malformed(e.to_string())))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed every text, splitting into requests of at most `batch_size`
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            results.extend(self.generate_embeddings_single_batch(chunk)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn generate_embeddings_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let url = self.endpoint("/api/embed")?;

        let request_json = serde_json::to_string(&request).map_err(|e| {
            RagError::Embedding(ServiceError::Malformed(format!(
                "Failed to serialize embedding request: {}",
                e
            )))
        })?;

        let response_text = self
            .transport
            .post_json("ollama embed", &url, None, &request_json)
            .map_err(RagError::Embedding)?;

        let batch_response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(ServiceError::Malformed(format!(
                "Failed to parse embedding response: {}",
                e
            )))
        })?;

        if batch_response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(ServiceError::Malformed(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                batch_response.embeddings.len()
            ))));
        }

        for embedding in &batch_response.embeddings {
            check_vector(embedding, Some(self.dimension))?;
        }

        Ok(batch_response.embeddings)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            RagError::Embedding(ServiceError::Misconfigured(format!(
                "Failed to build URL for {}: {}",
                path, e
            )))
        })
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn normalizes(&self) -> bool {
        false
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::Embedding(ServiceError::Malformed("no embedding returned".to_string()))
        })
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || client.generate_embeddings_batch(&texts))
            .await
            .map_err(|e| {
                RagError::Embedding(ServiceError::Unreachable(format!(
                    "embedding task failed: {}",
                    e
                )))
            })?
    }
}
