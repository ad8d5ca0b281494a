use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, EmbedderBackend};
use crate::database::{Database, VectorStore};
use crate::embeddings::{self, OllamaClient};
use crate::rag::{KnowledgeBase, PopulateStatus, load_seed_file};
use crate::server;

async fn open_knowledge_base(config: &Config) -> Result<KnowledgeBase> {
    let database = Database::new(config.database_path(), &config.store)
        .await
        .context("Failed to initialize database")?;
    let store = VectorStore::new(
        database,
        Some(config.embedder.embedding_dimension as usize),
    )
    .await
    .context("Failed to open vector store")?;
    let embedder = embeddings::from_config(config).context("Failed to create embedder")?;

    Ok(KnowledgeBase::new(embedder, Arc::new(store)))
}

/// Start the HTTP API
pub async fn serve(config: &Config) -> Result<()> {
    info!("Starting API server on {}", config.server.bind_address());
    server::serve(config)
        .await
        .context("API server terminated with an error")
}

/// Load the curated dataset unless the store already holds it
pub async fn seed(config: &Config, file: Option<&Path>) -> Result<()> {
    let seed_file = file.map_or_else(|| config.seed_file_path(), Path::to_path_buf);
    let entries = load_seed_file(&seed_file)
        .with_context(|| format!("Failed to load seed file {}", seed_file.display()))?;

    println!(
        "Loading {} entries from {}",
        style(entries.len()).cyan(),
        style(seed_file.display()).dim()
    );

    let knowledge_base = open_knowledge_base(config).await?;
    let report = knowledge_base
        .populate(&entries)
        .await
        .context("Failed to populate knowledge base")?;

    match report.status {
        PopulateStatus::Populated => println!(
            "{} Added {} documents ({} total)",
            style("✅").green(),
            report.documents_added,
            report.total_documents
        ),
        PopulateStatus::AlreadyPopulated => println!(
            "{} Knowledge base already holds {} documents, nothing to do",
            style("ℹ️").blue(),
            report.total_documents
        ),
    }

    Ok(())
}

/// Remove every document from the knowledge base
pub async fn reset(config: &Config) -> Result<()> {
    let knowledge_base = open_knowledge_base(config).await?;
    let removed = knowledge_base
        .reset()
        .await
        .context("Failed to clear knowledge base")?;

    println!("{} Removed {} documents", style("🗑️").red(), removed);
    Ok(())
}

/// Report store, embedder and generator readiness
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("📊 Travel RAG Status Report").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("🗄️  Knowledge Base:");
    match Database::new(config.database_path(), &config.store).await {
        Ok(database) => {
            println!("   ✅ SQLite: {}", config.database_path().display());
            match VectorStore::new(database, Some(config.embedder.embedding_dimension as usize))
                .await
            {
                Ok(store) => {
                    println!("{}", document_count_line(&store.count().await));
                    if let Some(dimension) = store.dimension().await {
                        println!("   🔢 Dimension: {}", dimension);
                    }
                }
                Err(e) => println!("   ❌ Vector store unavailable - {}", e),
            }
        }
        Err(e) => println!("   ❌ SQLite: Failed to connect - {}", e),
    }

    println!("🤖 Embedder:");
    println!("   📋 Model: {}", config.embedder.model_label());
    match config.embedder.backend {
        EmbedderBackend::Ollama => match OllamaClient::new(config) {
            Ok(client) => match tokio::task::spawn_blocking(move || client.health_check()).await {
                Ok(Ok(())) => println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.embedder.host, config.embedder.port
                ),
                Ok(Err(e)) => println!("   ⚠️  Ollama: Unhealthy - {}", e),
                Err(e) => println!("   ❌ Ollama: Health check failed - {}", e),
            },
            Err(e) => println!("   ❌ Ollama: Failed to connect - {}", e),
        },
        EmbedderBackend::HuggingFace => {
            if config.embedder.api_key.is_some() {
                println!("   ✅ Hugging Face: API key configured");
            } else {
                println!("   ⚠️  Hugging Face: HF_API_KEY is not set");
            }
        }
        EmbedderBackend::Hashing => println!("   ✅ Hashing: offline, always available"),
    }

    println!("💬 Generator:");
    println!("   📋 Model: {}", config.generator.model);
    println!("   🌐 Endpoint: {}", config.generator.base_url);
    if config.generator.api_key.is_some() {
        println!("   ✅ API key configured");
    } else {
        println!("   ⚠️  GROQ_API_KEY is not set");
    }

    Ok(())
}

fn document_count_line(count: &crate::Result<usize>) -> String {
    match count {
        Ok(count) => format!("   📚 Documents: {}", count),
        Err(e) => format!("   ❌ Documents: Failed to count - {}", e),
    }
}

/// Print the effective configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Embedder:").bold().yellow());
    println!("  Backend: {}", style(config.embedder.backend).cyan());
    println!("  Model: {}", style(&config.embedder.model).cyan());
    println!("  Dimension: {}", style(config.embedder.embedding_dimension).cyan());
    println!("  Batch Size: {}", style(config.embedder.batch_size).cyan());
    match config.embedder.backend {
        EmbedderBackend::Ollama => match config.embedder.ollama_url() {
            Ok(url) => println!("  Ollama URL: {}", style(url).cyan()),
            Err(e) => println!("  Ollama URL: {} ({})", style("Invalid").red(), e),
        },
        EmbedderBackend::HuggingFace => {
            println!("  Endpoint: {}", style(&config.embedder.huggingface_url).cyan());
        }
        EmbedderBackend::Hashing => {}
    }

    println!();
    println!("{}", style("Generator:").bold().yellow());
    println!("  Endpoint: {}", style(&config.generator.base_url).cyan());
    println!("  Model: {}", style(&config.generator.model).cyan());
    println!("  Temperature: {}", style(config.generator.temperature).cyan());
    println!("  Max Tokens: {}", style(config.generator.max_tokens).cyan());

    println!();
    println!("{}", style("Retrieval:").bold().yellow());
    println!("  Default top_k: {}", style(config.retrieval.default_top_k).cyan());
    println!("  History Window: {}", style(config.retrieval.history_window).cyan());
    match config.retrieval.min_similarity {
        Some(threshold) => println!("  Min Similarity: {}", style(threshold).cyan()),
        None => println!("  Min Similarity: {}", style("none").dim()),
    }

    println!();
    println!("{}", style("Server:").bold().yellow());
    println!("  Address: {}", style(config.server.bind_address()).cyan());
    println!("  Seed File: {}", style(config.seed_file_path().display()).cyan());
    println!("  Database: {}", style(config.database_path().display()).cyan());

    println!();
    println!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
