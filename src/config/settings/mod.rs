
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

pub const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_SYSTEM_PROMPT: &str = "You are Tembo, an expert AI travel assistant for Kenya.
You help tourists plan trips, find destinations, understand costs, and get travel advice.

RULES:
- Answer ONLY based on the CONTEXT provided. Do not invent facts.
- Always include prices in both KES and USD when available.
- If the context lacks enough information, say so honestly.
- Be warm and friendly. Use occasional Swahili: Karibu (welcome), Asante (thank you), Hakuna Matata (no worries).
- Keep answers practical and well structured.
";

const DEFAULT_NO_CONTEXT_ANSWER: &str = "Samahani (Sorry), I don't have information on that yet. \
Try asking about Masai Mara, Diani Beach, Amboseli, or Nairobi.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    #[default]
    Ollama,
    HuggingFace,
    Hashing,
}

impl std::fmt::Display for EmbedderBackend {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            EmbedderBackend::Ollama => write!(f, "ollama"),
            EmbedderBackend::HuggingFace => write!(f, "huggingface"),
            EmbedderBackend::Hashing => write!(f, "hashing"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub backend: EmbedderBackend,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub huggingface_url: String,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Ollama,
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            huggingface_url: "https://api-inference.huggingface.co".to_string(),
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            api_key: None,
            timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key: None,
            temperature: 0.5,
            max_tokens: 800,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub history_window: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,
    pub system_prompt: String,
    pub no_context_answer: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            history_window: 6,
            min_similarity: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            no_context_answer: DEFAULT_NO_CONTEXT_ANSWER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub database_file: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_file: "knowledge.db".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 10,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            seed_file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0}s (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid max tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxTokens(u32),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid history window: {0} (must be at most 100)")]
    InvalidHistoryWindow(usize),
    #[error("Invalid minimum similarity: {0} (must be between -1.0 and 1.0)")]
    InvalidMinSimilarity(f32),
    #[error("Invalid database file name: {0:?}")]
    InvalidDatabaseFile(String),
    #[error("Invalid max connections: {0} (must be between 1 and 64)")]
    InvalidMaxConnections(u32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default base directory, `<platform config dir>/travel-rag`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("travel-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Defaults rooted at `base_dir`, without touching the filesystem
    #[inline]
    pub fn with_base_dir<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str::<Config>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_overrides_from(|key| std::env::var(key).ok());

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Credentials from the environment win over the file.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("HF_API_KEY").or_else(|| non_empty("HUGGINGFACE_API_KEY")) {
            self.embedder.api_key = Some(key);
        }

        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.generator.api_key = Some(key);
        }
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedder.validate()?;
        self.generator.validate()?;
        self.retrieval.validate()?;
        self.store.validate()?;
        self.server.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.store.database_file)
    }

    /// Seed dataset location, defaulting to `seed.json` beside the config
    #[inline]
    pub fn seed_file_path(&self) -> PathBuf {
        self.server
            .seed_file
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("seed.json"))
    }
}

fn validate_timeout(secs: u64) -> Result<(), ConfigError> {
    if !(1..=600).contains(&secs) {
        return Err(ConfigError::InvalidTimeout(secs));
    }
    Ok(())
}

impl EmbedderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;
        Url::parse(&self.huggingface_url)
            .map_err(|_| ConfigError::InvalidUrl(self.huggingface_url.clone()))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        validate_timeout(self.timeout_secs)?;

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Model identifier as reported by `/health`
    #[inline]
    pub fn model_label(&self) -> String {
        match self.backend {
            EmbedderBackend::Hashing => format!("hashing/hashing-bow-{}", self.embedding_dimension),
            _ => format!("{}/{}", self.backend, self.model),
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if !(1..=32768).contains(&self.max_tokens) {
            return Err(ConfigError::InvalidMaxTokens(self.max_tokens));
        }

        validate_timeout(self.timeout_secs)
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.default_top_k));
        }

        if self.history_window > 100 {
            return Err(ConfigError::InvalidHistoryWindow(self.history_window));
        }

        if let Some(threshold) = self.min_similarity {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidMinSimilarity(threshold));
            }
        }

        Ok(())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.database_file.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidDatabaseFile(self.database_file.clone()));
        }

        if !(1..=64).contains(&self.max_connections) {
            return Err(ConfigError::InvalidMaxConnections(self.max_connections));
        }

        validate_timeout(self.acquire_timeout_secs)?;
        validate_timeout(self.busy_timeout_secs)
    }

    #[inline]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    #[inline]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        let url_str = format!("http://{}:{}", self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        Ok(())
    }

    #[inline]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
