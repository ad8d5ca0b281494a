//! Loading the curated knowledge base.
//!
//! A seed file is a JSON array of `{content, source, category, region,
//! destination}` objects. Chunks are embedded and inserted in batches; each
//! batch is atomic.


use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{DocumentMetadata, NewDocument, VectorStore};
use crate::embeddings::{Embedder, normalize};
use crate::{RagError, Result};

pub const INGEST_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub content: String,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

pub fn load_seed_file<P: AsRef<Path>>(path: P) -> Result<Vec<SeedEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<SeedEntry> = serde_json::from_str(&raw).map_err(|e| {
        RagError::InvalidArgument(format!("Invalid seed file {}: {}", path.display(), e))
    })?;

    if let Some(position) = entries.iter().position(|e| e.content.trim().is_empty()) {
        return Err(RagError::InvalidArgument(format!(
            "Seed entry {} in {} has empty content",
            position,
            path.display()
        )));
    }

    debug!("Loaded {} seed entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulateStatus {
    Populated,
    AlreadyPopulated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateReport {
    pub status: PopulateStatus,
    pub documents_added: usize,
    pub total_documents: usize,
}

/// Embeds text chunks and writes them to the vector store
#[derive(Clone)]
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    batch_size: usize,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self {
            embedder,
            store,
            batch_size: INGEST_BATCH_SIZE,
        }
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Embed and insert every entry, returning the number of rows added
    pub async fn ingest(&self, entries: &[SeedEntry]) -> Result<usize> {
        let mut total_added = 0;

        for (batch_number, batch) in entries.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|entry| entry.content.clone()).collect();
            let vectors = self.embedder.embed_many(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(RagError::Embedding(crate::ServiceError::Malformed(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ))));
            }

            let records: Vec<NewDocument> = batch
                .iter()
                .zip(vectors)
                .map(|(entry, mut embedding)| {
                    if !self.embedder.normalizes() {
                        normalize(&mut embedding);
                    }
                    NewDocument {
                        content: entry.content.clone(),
                        embedding,
                        metadata: entry.metadata.clone(),
                    }
                })
                .collect();

            let added = self.store.insert_batch(&records).await?;
            total_added += added;
            info!(
                "Batch {}: added {} documents (total: {})",
                batch_number + 1,
                added,
                total_added
            );
        }

        Ok(total_added)
    }

    /// Load `entries` unless the store already holds at least that many
    /// records. A partially loaded store is cleared first.
    pub async fn populate(&self, entries: &[SeedEntry]) -> Result<PopulateReport> {
        let current = self.store.count().await?;
        if current >= entries.len() {
            info!(
                "Knowledge base already holds {} documents, skipping load",
                current
            );
            return Ok(PopulateReport {
                status: PopulateStatus::AlreadyPopulated,
                documents_added: 0,
                total_documents: current,
            });
        }

        if current > 0 {
            self.store.clear().await?;
        }

        let documents_added = self.ingest(entries).await?;
        let total_documents = self.store.count().await?;
        info!(
            "Knowledge base populated with {} documents",
            total_documents
        );

        Ok(PopulateReport {
            status: PopulateStatus::Populated,
            documents_added,
            total_documents,
        })
    }

    pub async fn reset(&self) -> Result<u64> {
        self.store.clear().await
    }
}
