//! Hugging Face inference API backend (feature-extraction pipeline).
//!
//! The pipeline answers either with a pooled sentence vector or with one
//! vector per token; token matrices are mean pooled. Output is normalized.


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::embeddings::{Embedder, check_vector, normalize};
use crate::transport::HttpTransport;
use crate::{RagError, Result, ServiceError};

#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    inputs: &'a str,
    options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureResponse {
    Pooled(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
    Nested(Vec<Vec<Vec<f32>>>),
}

impl HuggingFaceClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.embedder.huggingface_url).map_err(|e| {
            RagError::Config(format!(
                "Invalid Hugging Face URL {}: {}",
                config.embedder.huggingface_url, e
            ))
        })?;
        let endpoint = base
            .join(&format!(
                "pipeline/feature-extraction/{}",
                config.embedder.model
            ))
            .map_err(|e| RagError::Config(format!("Invalid Hugging Face model path: {}", e)))?;

        Ok(Self {
            endpoint,
            model: config.embedder.model.clone(),
            api_key: config.embedder.api_key.clone(),
            dimension: config.embedder.embedding_dimension as usize,
            transport: HttpTransport::new(config.embedder.timeout())
                .with_retry_attempts(config.embedder.retry_attempts),
        })
    }

    #[inline]
    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Embedding(ServiceError::Misconfigured(
                "HF_API_KEY is not set".to_string(),
            ))
        })?;

        debug!("Requesting feature extraction (length: {})", text.len());

        let request = FeatureRequest {
            inputs: text,
            options: json!({ "wait_for_model": true }),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::Embedding(ServiceError::Malformed(e.to_string())))?;

        let response_text = self
            .transport
            .post_json("huggingface embed", &self.endpoint, Some(api_key), &body)
            .map_err(RagError::Embedding)?;

        let response: FeatureResponse = serde_json::from_str(&response_text).map_err(|e| {
            RagError::Embedding(ServiceError::Malformed(format!(
                "Unexpected feature-extraction response: {}",
                e
            )))
        })?;

        let mut vector = pool(response)?;
        check_vector(&vector, Some(self.dimension))?;
        normalize(&mut vector);
        Ok(vector)
    }
}

/// Collapse a feature-extraction response into one sentence vector
fn pool(response: FeatureResponse) -> Result<Vec<f32>> {
    match response {
        FeatureResponse::Pooled(vector) => Ok(vector),
        FeatureResponse::Tokens(tokens) => mean_pool(&tokens),
        FeatureResponse::Nested(mut batches) => match batches.pop() {
            Some(tokens) if batches.is_empty() => mean_pool(&tokens),
            _ => Err(RagError::Embedding(ServiceError::Malformed(
                "expected exactly one input in response".to_string(),
            ))),
        },
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Result<Vec<f32>> {
    let width = tokens.first().map_or(0, Vec::len);
    if width == 0 || tokens.iter().any(|token| token.len() != width) {
        return Err(RagError::Embedding(ServiceError::Malformed(
            "token matrix is empty or ragged".to_string(),
        )));
    }

    let mut pooled = vec![0.0_f32; width];
    for token in tokens {
        for (sum, value) in pooled.iter_mut().zip(token) {
            *sum += value;
        }
    }
    let count = tokens.len() as f32;
    for value in &mut pooled {
        *value /= count;
    }
    Ok(pooled)
}

#[async_trait]
impl Embedder for HuggingFaceClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn normalizes(&self) -> bool {
        true
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let client = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || client.generate_embedding(&text))
            .await
            .map_err(|e| {
                RagError::Embedding(ServiceError::Unreachable(format!(
                    "embedding task failed: {}",
                    e
                )))
            })?
    }
}
