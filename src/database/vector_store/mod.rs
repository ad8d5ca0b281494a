
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{NewDocument, ScoredDocument, SearchFilters};
use crate::database::sqlite::queries::DocumentQueries;
use crate::embeddings::cosine_similarity;
use crate::{RagError, Result};

/// Knowledge-base records with exact cosine nearest-neighbour search.
///
/// Filtering happens in SQL before ranking, so `top_k` counts matches only.
/// Every stored embedding has the same length; the first source of that
/// length is existing rows, then the configured dimension, then the first
/// inserted batch.
#[derive(Debug)]
pub struct VectorStore {
    database: Database,
    configured_dimension: Option<usize>,
    dimension: RwLock<Option<usize>>,
    min_similarity: Option<f32>,
}

impl VectorStore {
    pub async fn new(database: Database, configured_dimension: Option<usize>) -> Result<Self> {
        let stored = DocumentQueries::stored_dimension(database.pool()).await?;
        if let (Some(stored), Some(configured)) = (stored, configured_dimension) {
            if stored != configured {
                warn!(
                    "Stored embeddings have dimension {} but {} is configured; rebuild the store after changing embedders",
                    stored, configured
                );
            }
        }

        Ok(Self {
            database,
            configured_dimension,
            dimension: RwLock::new(stored.or(configured_dimension)),
            min_similarity: None,
        })
    }

    /// Drop results scoring below `threshold`. Without this, nothing is dropped.
    #[inline]
    pub fn with_min_similarity(mut self, threshold: Option<f32>) -> Self {
        self.min_similarity = threshold;
        self
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn dimension(&self) -> Option<usize> {
        *self.dimension.read().await
    }

    pub async fn insert_batch(&self, records: &[NewDocument]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut dimension = self.dimension.write().await;
        let expected = dimension.unwrap_or(records[0].embedding.len());

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            if record.content.trim().is_empty() {
                return Err(RagError::InvalidArgument(
                    "document content must not be empty".to_string(),
                ));
            }
            if record.embedding.len() != expected || expected == 0 {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: record.embedding.len(),
                });
            }
            ensure_finite(&record.embedding, "document embedding")?;
            prepared.push(NewDocument {
                content: record.content.clone(),
                embedding: record.embedding.clone(),
                metadata: record.metadata.clone().normalized(),
            });
        }

        let inserted = DocumentQueries::insert_batch(self.database.pool(), &prepared).await?;
        *dimension = Some(expected);

        debug!("Inserted batch of {} documents (dimension {})", inserted, expected);
        Ok(inserted)
    }

    /// The `top_k` most similar records passing `filters`, best first.
    /// Equal scores are ordered by ascending id. Records sharing the same
    /// content are returned once.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredDocument>> {
        if top_k == 0 {
            return Err(RagError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let Some(dimension) = self.dimension().await else {
            debug!("Search against a store with no established dimension");
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        ensure_finite(query, "query vector")?;

        let candidates = DocumentQueries::search_candidates(self.database.pool(), filters).await?;
        let candidate_count = candidates.len();

        let mut scored: Vec<ScoredDocument> = candidates
            .into_iter()
            .map(|document| ScoredDocument {
                similarity: cosine_similarity(query, &document.embedding),
                document,
            })
            .filter(|scored| {
                self.min_similarity
                    .is_none_or(|threshold| scored.similarity >= threshold)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });

        // Identical chunks keep their best-ranked copy and do not use up top_k slots
        let mut seen = HashSet::new();
        scored.retain(|result| seen.insert(result.document.content.clone()));
        scored.truncate(top_k);

        debug!(
            "Ranked {} candidates, returning {} (top_k {})",
            candidate_count,
            scored.len(),
            top_k
        );
        Ok(scored)
    }

    pub async fn count(&self) -> Result<usize> {
        let count = DocumentQueries::count(self.database.pool()).await?;
        Ok(count.max(0) as usize)
    }

    /// Remove every record and restart id assignment
    pub async fn clear(&self) -> Result<u64> {
        let mut dimension = self.dimension.write().await;
        let deleted = DocumentQueries::clear(self.database.pool()).await?;
        *dimension = self.configured_dimension;

        info!("Cleared {} documents from the knowledge base", deleted);
        Ok(deleted)
    }
}

fn ensure_finite(vector: &[f32], what: &str) -> Result<()> {
    match vector.iter().position(|value| !value.is_finite()) {
        Some(index) => Err(RagError::InvalidArgument(format!(
            "{} has a non-finite value at index {}",
            what, index
        ))),
        None => Ok(()),
    }
}
