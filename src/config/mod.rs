// Configuration management module
// TOML settings for the embedder, generator, retrieval, store and server

pub mod settings;

pub use settings::{
    Config, ConfigError, EmbedderBackend, EmbedderConfig, GeneratorConfig, RetrievalConfig,
    ServerConfig, StoreConfig,
};
