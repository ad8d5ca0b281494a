//! OpenAI-compatible chat-completions client. Groq is the default endpoint.
//!
//! Generation is not idempotent billing-wise, so requests are sent once.


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::generation::{ChatMessage, Generator};
use crate::transport::HttpTransport;
use crate::{RagError, Result, ServiceError};

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let generator = &config.generator;
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            generator.base_url.trim_end_matches('/')
        ))
        .map_err(|e| {
            RagError::Config(format!("Invalid generator URL {}: {}", generator.base_url, e))
        })?;

        info!("Generator endpoint {} (model {})", endpoint, generator.model);

        Ok(Self {
            endpoint,
            model: generator.model.clone(),
            api_key: generator.api_key.clone(),
            temperature: generator.temperature,
            max_tokens: generator.max_tokens,
            transport: HttpTransport::new(generator.timeout()),
        })
    }

    #[inline]
    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::Generation(ServiceError::Misconfigured(
                "GROQ_API_KEY is not set".to_string(),
            ))
        })?;

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::Generation(ServiceError::Malformed(e.to_string())))?;

        debug!(
            "Requesting completion ({} messages, model {})",
            messages.len(),
            self.model
        );

        let response_text = self
            .transport
            .post_json("chat completion", &self.endpoint, Some(api_key), &body)
            .map_err(RagError::Generation)?;

        parse_completion(&response_text)
    }
}

fn parse_completion(response_text: &str) -> Result<String> {
    let response: CompletionResponse = serde_json::from_str(response_text).map_err(|e| {
        RagError::Generation(ServiceError::Malformed(format!(
            "Unexpected completion response: {}",
            e
        )))
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| {
            RagError::Generation(ServiceError::Malformed(
                "completion contained no answer".to_string(),
            ))
        })
}

#[async_trait]
impl Generator for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        tokio::task::spawn_blocking(move || client.complete(&messages))
            .await
            .map_err(|e| {
                RagError::Generation(ServiceError::Unreachable(format!(
                    "generation task failed: {}",
                    e
                )))
            })?
    }
}
