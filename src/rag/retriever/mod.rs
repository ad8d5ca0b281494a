#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::debug;

use crate::database::{FilterField, ScoredDocument, SearchFilters, VectorStore};
use crate::embeddings::{Embedder, normalize};
use crate::{RagError, Result};

/// Placeholder strings HTTP clients send when they mean "no filter"
const FILTER_SENTINELS: &[&str] = &["null", "None"];

/// Map absent, blank and placeholder filter values to `None`
pub fn normalize_filter_value(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || FILTER_SENTINELS.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// Optional metadata constraints for a retrieval. Both apply together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalFilter {
    pub category: Option<String>,
    pub region: Option<String>,
}

impl RetrievalFilter {
    #[inline]
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            region: None,
        }
    }

    /// Only non-empty values become conditions
    pub fn to_search_filters(&self) -> Result<SearchFilters> {
        let mut filters = SearchFilters::new();
        for (field, value) in [
            (FilterField::Category, &self.category),
            (FilterField::Region, &self.region),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                filters = filters.with(field, value)?;
            }
        }
        Ok(filters)
    }
}

/// Turns question text into ranked knowledge-base chunks
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self { embedder, store }
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Best `top_k` chunks for `query`, most relevant first. No matches is an
    /// empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredDocument>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "query text must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RagError::InvalidArgument(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let filters = filter.to_search_filters()?;

        let mut vector = self.embedder.embed_one(query).await?;
        if !self.embedder.normalizes() {
            normalize(&mut vector);
        }

        let results = self.store.search(&vector, top_k, &filters).await?;

        debug!(
            "Retrieved {} chunks (top_k {}, filters {:?})",
            results.len(),
            top_k,
            filters
        );
        Ok(results)
    }
}
