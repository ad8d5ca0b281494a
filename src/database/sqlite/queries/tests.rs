use super::*;
use crate::RagError;
use crate::config::StoreConfig;
use crate::database::sqlite::Database;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = StoreConfig {
        max_connections: 1,
        ..StoreConfig::default()
    };
    let database = Database::new(temp_dir.path().join("test.db"), &config)
        .await
        .expect("Failed to create test database");

    (temp_dir, database.pool().clone())
}

fn new_document(content: &str, embedding: Vec<f32>, category: Option<&str>) -> NewDocument {
    NewDocument {
        content: content.to_string(),
        embedding,
        metadata: DocumentMetadata {
            source: Some("Kenya Wildlife Service".to_string()),
            category: category.map(str::to_string),
            region: None,
            destination: None,
        },
    }
}

#[tokio::test]
async fn insert_batch_assigns_sequential_ids() {
    let (_temp_dir, pool) = create_test_pool().await;

    let documents = vec![
        new_document("Masai Mara entry fee", vec![1.0, 0.0], Some("parks")),
        new_document("Diani Beach resorts", vec![0.0, 1.0], Some("beaches")),
    ];
    let inserted = DocumentQueries::insert_batch(&pool, &documents)
        .await
        .expect("Failed to insert documents");
    assert_eq!(inserted, 2);

    let first = DocumentQueries::get_by_id(&pool, 1)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(first.content, "Masai Mara entry fee");
    assert_eq!(first.embedding, vec![1.0, 0.0]);
    assert_eq!(first.metadata.category.as_deref(), Some("parks"));

    let second = DocumentQueries::get_by_id(&pool, 2)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(second.content, "Diani Beach resorts");
}

#[tokio::test]
async fn insert_batch_spanning_several_statements() {
    let (_temp_dir, pool) = create_test_pool().await;

    let documents: Vec<NewDocument> = (0..250)
        .map(|i| new_document(&format!("chunk {}", i), vec![i as f32, 1.0], None))
        .collect();

    let inserted = DocumentQueries::insert_batch(&pool, &documents)
        .await
        .expect("Failed to insert documents");
    assert_eq!(inserted, 250);
    assert_eq!(DocumentQueries::count(&pool).await.expect("count"), 250);
}

#[tokio::test]
async fn insert_batch_is_all_or_nothing() {
    let (_temp_dir, pool) = create_test_pool().await;

    let documents = vec![
        new_document("valid chunk", vec![1.0, 0.0], None),
        new_document("", vec![0.0, 1.0], None),
    ];

    let result = DocumentQueries::insert_batch(&pool, &documents).await;
    assert!(matches!(result, Err(RagError::Store(_))));
    assert_eq!(DocumentQueries::count(&pool).await.expect("count"), 0);
}

#[tokio::test]
async fn search_candidates_applies_filters_conjunctively() {
    let (_temp_dir, pool) = create_test_pool().await;

    let mut coast = new_document("Diani Beach", vec![1.0, 0.0], Some("beaches"));
    coast.metadata.region = Some("Coast".to_string());
    let mut lamu = new_document("Lamu Old Town", vec![0.0, 1.0], Some("culture"));
    lamu.metadata.region = Some("Coast".to_string());
    let mara = new_document("Masai Mara", vec![1.0, 1.0], Some("parks"));

    DocumentQueries::insert_batch(&pool, &[coast, lamu, mara])
        .await
        .expect("Failed to insert documents");

    let all = DocumentQueries::search_candidates(&pool, &SearchFilters::new())
        .await
        .expect("Failed to search");
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].id < w[1].id));

    let coast_only = SearchFilters::from_pairs([("region", "Coast")]).expect("filters");
    let coast_docs = DocumentQueries::search_candidates(&pool, &coast_only)
        .await
        .expect("Failed to search");
    assert_eq!(coast_docs.len(), 2);

    let coast_beaches =
        SearchFilters::from_pairs([("region", "Coast"), ("category", "beaches")]).expect("filters");
    let beaches = DocumentQueries::search_candidates(&pool, &coast_beaches)
        .await
        .expect("Failed to search");
    assert_eq!(beaches.len(), 1);
    assert_eq!(beaches[0].content, "Diani Beach");

    let nothing = SearchFilters::from_pairs([("category", "nightlife")]).expect("filters");
    assert!(
        DocumentQueries::search_candidates(&pool, &nothing)
            .await
            .expect("Failed to search")
            .is_empty()
    );
}

#[tokio::test]
async fn clear_restarts_id_sequence() {
    let (_temp_dir, pool) = create_test_pool().await;

    DocumentQueries::insert_batch(&pool, &[new_document("first", vec![1.0], None)])
        .await
        .expect("Failed to insert");
    let deleted = DocumentQueries::clear(&pool).await.expect("Failed to clear");
    assert_eq!(deleted, 1);
    assert_eq!(DocumentQueries::count(&pool).await.expect("count"), 0);
    assert_eq!(
        DocumentQueries::stored_dimension(&pool).await.expect("dim"),
        None
    );

    DocumentQueries::insert_batch(&pool, &[new_document("again", vec![1.0, 2.0, 3.0], None)])
        .await
        .expect("Failed to insert");
    let document = DocumentQueries::get_by_id(&pool, 1)
        .await
        .expect("Failed to get document");
    assert!(document.is_some());
    assert_eq!(
        DocumentQueries::stored_dimension(&pool).await.expect("dim"),
        Some(3)
    );
}

#[tokio::test]
async fn session_messages_come_back_oldest_first() {
    let (_temp_dir, pool) = create_test_pool().await;

    for turn in 0..5 {
        ChatSessionQueries::append_turn(
            &pool,
            "s1",
            &format!("question {}", turn),
            &format!("answer {}", turn),
        )
        .await
        .expect("Failed to append turn");
    }
    ChatSessionQueries::append(&pool, "s2", MessageRole::User, "other session")
        .await
        .expect("Failed to append");

    let recent = ChatSessionQueries::recent(&pool, "s1", 4)
        .await
        .expect("Failed to load history");
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["question 3", "answer 3", "question 4", "answer 4"]);
    assert_eq!(recent[0].role, MessageRole::User);
    assert_eq!(recent[1].role, MessageRole::Assistant);

    assert_eq!(ChatSessionQueries::count(&pool, "s1").await.expect("count"), 10);
    assert_eq!(ChatSessionQueries::count(&pool, "s2").await.expect("count"), 1);
    assert!(
        ChatSessionQueries::recent(&pool, "missing", 6)
            .await
            .expect("Failed to load history")
            .is_empty()
    );
}

#[tokio::test]
async fn clear_all_sessions() {
    let (_temp_dir, pool) = create_test_pool().await;

    ChatSessionQueries::append_turn(&pool, "s1", "hi", "jambo")
        .await
        .expect("Failed to append turn");
    assert_eq!(ChatSessionQueries::clear_all(&pool).await.expect("clear"), 2);
    assert_eq!(ChatSessionQueries::count(&pool, "s1").await.expect("count"), 0);
}
