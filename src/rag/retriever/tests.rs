use super::*;
use crate::config::StoreConfig;
use crate::database::{Database, DocumentMetadata, NewDocument};
use crate::embeddings::HashingEmbedder;
use async_trait::async_trait;
use tempfile::TempDir;

const DIMENSION: usize = 256;

/// Returns a fixed, non-normalized vector
struct ScaledEmbedder;

#[async_trait]
impl Embedder for ScaledEmbedder {
    fn model_name(&self) -> &str {
        "scaled"
    }

    fn normalizes(&self) -> bool {
        false
    }

    async fn embed_one(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![3.0, 4.0])
    }
}

async fn create_store(dimension: usize) -> (TempDir, Arc<VectorStore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let database = Database::new(temp_dir.path().join("kb.db"), &StoreConfig::default())
        .await
        .expect("Failed to open database");
    let store = VectorStore::new(database, Some(dimension))
        .await
        .expect("Failed to create store");
    (temp_dir, Arc::new(store))
}

async fn seed(store: &VectorStore, embedder: &HashingEmbedder, docs: &[(&str, &str, &str)]) {
    let records: Vec<NewDocument> = docs
        .iter()
        .map(|(content, category, region)| NewDocument {
            content: content.to_string(),
            embedding: embedder.embed_text(content),
            metadata: DocumentMetadata {
                source: Some("kws.go.ke".to_string()),
                category: Some(category.to_string()),
                region: Some(region.to_string()),
                destination: None,
            },
        })
        .collect();
    store.insert_batch(&records).await.expect("Failed to seed");
}

#[test]
fn sentinel_filters_mean_no_filter() {
    assert_eq!(normalize_filter_value(None), None);
    assert_eq!(normalize_filter_value(Some("")), None);
    assert_eq!(normalize_filter_value(Some("   ")), None);
    assert_eq!(normalize_filter_value(Some("null")), None);
    assert_eq!(normalize_filter_value(Some("None")), None);
    assert_eq!(
        normalize_filter_value(Some(" safari ")),
        Some("safari".to_string())
    );
}

#[test]
fn blank_filter_values_build_no_conditions() {
    let filter = RetrievalFilter {
        category: Some(String::new()),
        region: Some("Coast".to_string()),
    };
    let filters = filter.to_search_filters().expect("should build");
    assert_eq!(filters.get(FilterField::Category), None);
    assert_eq!(filters.get(FilterField::Region), Some("Coast"));
}

#[tokio::test]
async fn retrieves_relevant_chunk_first() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let (_temp_dir, store) = create_store(DIMENSION).await;
    seed(
        &store,
        &embedder,
        &[
            ("Diani Beach has white sand and coral reefs", "beach", "Coast"),
            ("Masai Mara entry fee is $80 per day", "safari", "Rift Valley"),
            ("Nairobi has a matatu bus network", "transport", "Nairobi"),
        ],
    )
    .await;

    let retriever = Retriever::new(embedder, store);
    let results = retriever
        .retrieve("Masai Mara entry fee", 2, &RetrievalFilter::default())
        .await
        .expect("Failed to retrieve");

    assert_eq!(results.len(), 2);
    assert!(results[0].document.content.starts_with("Masai Mara"));
}

#[tokio::test]
async fn category_filter_excludes_other_categories() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let (_temp_dir, store) = create_store(DIMENSION).await;
    seed(
        &store,
        &embedder,
        &[
            ("Diani Beach has white sand", "beach", "Coast"),
            ("Amboseli has elephants", "safari", "Rift Valley"),
        ],
    )
    .await;

    let retriever = Retriever::new(embedder, store);
    let results = retriever
        .retrieve("Diani Beach white sand", 5, &RetrievalFilter::category("safari"))
        .await
        .expect("Failed to retrieve");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.metadata.category.as_deref(), Some("safari"));
}

#[tokio::test]
async fn no_match_is_empty_not_error() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let (_temp_dir, store) = create_store(DIMENSION).await;
    let retriever = Retriever::new(embedder, store);

    let results = retriever
        .retrieve("anything at all", 5, &RetrievalFilter::category("nightlife"))
        .await
        .expect("Failed to retrieve");
    assert!(results.is_empty());
}

#[tokio::test]
async fn duplicate_chunks_do_not_use_up_top_k() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let (_temp_dir, store) = create_store(DIMENSION).await;
    seed(
        &store,
        &embedder,
        &[
            ("Lamu Old Town is a UNESCO site", "culture", "Coast"),
            ("Lamu Old Town is a UNESCO site", "culture", "Coast"),
            ("Lamu dhow trips leave from the seafront at sunset", "culture", "Coast"),
        ],
    )
    .await;

    let retriever = Retriever::new(embedder, store);
    let results = retriever
        .retrieve("Lamu UNESCO", 2, &RetrievalFilter::default())
        .await
        .expect("Failed to retrieve");

    let contents: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Lamu Old Town is a UNESCO site",
            "Lamu dhow trips leave from the seafront at sunset"
        ]
    );
    assert_eq!(results[0].document.id, 1);
}

#[tokio::test]
async fn normalizes_when_embedder_does_not() {
    let (_temp_dir, store) = create_store(2).await;
    store
        .insert_batch(&[NewDocument {
            content: "unit".to_string(),
            embedding: vec![0.6, 0.8],
            metadata: DocumentMetadata::default(),
        }])
        .await
        .expect("Failed to insert");

    let retriever = Retriever::new(Arc::new(ScaledEmbedder), store);
    let results = retriever
        .retrieve("anything", 1, &RetrievalFilter::default())
        .await
        .expect("Failed to retrieve");
    assert!((results[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn rejects_empty_query_and_zero_top_k() {
    let embedder = Arc::new(HashingEmbedder::new(DIMENSION));
    let (_temp_dir, store) = create_store(DIMENSION).await;
    let retriever = Retriever::new(embedder, store);

    assert!(matches!(
        retriever.retrieve("  ", 5, &RetrievalFilter::default()).await,
        Err(RagError::InvalidArgument(_))
    ));
    assert!(matches!(
        retriever.retrieve("Diani", 0, &RetrievalFilter::default()).await,
        Err(RagError::InvalidArgument(_))
    ));
}
