#[cfg(test)]
mod tests;

use super::StoreContext;
use super::models::*;
use crate::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Rows per multi-row INSERT; keeps bound parameters well under SQLite's limit
const INSERT_CHUNK_ROWS: usize = 100;

const DOCUMENT_COLUMNS: &str =
    "id, content, embedding, source, category, region, destination, created_at";

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert every document in one transaction. Either all rows land or none do.
    pub async fn insert_batch(pool: &SqlitePool, documents: &[NewDocument]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut transaction = pool
            .begin()
            .await
            .store_context("Failed to begin transaction for document insert")?;

        let mut inserted = 0;
        for chunk in documents.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "INSERT INTO documents (content, embedding, source, category, region, destination) ",
            );
            builder.push_values(chunk, |mut row, document| {
                row.push_bind(document.content.clone())
                    .push_bind(encode_embedding(&document.embedding))
                    .push_bind(document.metadata.source.clone())
                    .push_bind(document.metadata.category.clone())
                    .push_bind(document.metadata.region.clone())
                    .push_bind(document.metadata.destination.clone());
            });

            let result = builder
                .build()
                .execute(&mut *transaction)
                .await
                .store_context("Failed to insert documents")?;
            inserted += result.rows_affected() as usize;
        }

        transaction
            .commit()
            .await
            .store_context("Failed to commit document insert transaction")?;

        debug!("Inserted {} documents", inserted);
        Ok(inserted)
    }

    /// Documents passing every filter, in insertion order
    pub async fn search_candidates(
        pool: &SqlitePool,
        filters: &SearchFilters,
    ) -> Result<Vec<Document>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT ");
        builder.push(DOCUMENT_COLUMNS).push(" FROM documents");

        for (index, (field, value)) in filters.iter().enumerate() {
            builder.push(if index == 0 { " WHERE " } else { " AND " });
            builder.push(field.column()).push(" = ").push_bind(value.to_string());
        }
        builder.push(" ORDER BY id");

        let rows: Vec<DocumentRow> = builder
            .build_query_as()
            .fetch_all(pool)
            .await
            .store_context("Failed to load candidate documents")?;

        rows.into_iter().map(Document::try_from).collect()
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT ");
        builder
            .push(DOCUMENT_COLUMNS)
            .push(" FROM documents WHERE id = ")
            .push_bind(id);

        let row: Option<DocumentRow> = builder
            .build_query_as()
            .fetch_optional(pool)
            .await
            .store_context("Failed to get document by id")?;

        row.map(Document::try_from).transpose()
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .store_context("Failed to count documents")
    }

    /// Delete every document and restart id assignment
    pub async fn clear(pool: &SqlitePool) -> Result<u64> {
        let mut transaction = pool
            .begin()
            .await
            .store_context("Failed to begin transaction for clear")?;

        let deleted = sqlx::query("DELETE FROM documents")
            .execute(&mut *transaction)
            .await
            .store_context("Failed to delete documents")?
            .rows_affected();

        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'documents'")
            .execute(&mut *transaction)
            .await
            .store_context("Failed to reset document id sequence")?;

        transaction
            .commit()
            .await
            .store_context("Failed to commit clear transaction")?;

        Ok(deleted)
    }

    /// Vector length of stored embeddings, if any rows exist
    pub async fn stored_dimension(pool: &SqlitePool) -> Result<Option<usize>> {
        let bytes: Option<i64> =
            sqlx::query_scalar("SELECT length(embedding) FROM documents ORDER BY id LIMIT 1")
                .fetch_optional(pool)
                .await
                .store_context("Failed to read stored embedding dimension")?;

        Ok(bytes.map(|b| (b / 4) as usize))
    }
}

pub struct ChatSessionQueries;

impl ChatSessionQueries {
    pub async fn append(
        pool: &SqlitePool,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<i64> {
        let id = sqlx::query("INSERT INTO chat_sessions (session_id, role, content) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(role)
            .bind(content)
            .execute(pool)
            .await
            .store_context("Failed to append session message")?
            .last_insert_rowid();

        Ok(id)
    }

    /// Store a question and its answer together
    pub async fn append_turn(
        pool: &SqlitePool,
        session_id: &str,
        question: &str,
        answer: &str,
    ) -> Result<()> {
        let mut transaction = pool
            .begin()
            .await
            .store_context("Failed to begin transaction for session turn")?;

        for (role, content) in [(MessageRole::User, question), (MessageRole::Assistant, answer)] {
            sqlx::query("INSERT INTO chat_sessions (session_id, role, content) VALUES (?, ?, ?)")
                .bind(session_id)
                .bind(role)
                .bind(content)
                .execute(&mut *transaction)
                .await
                .store_context("Failed to append session message")?;
        }

        transaction
            .commit()
            .await
            .store_context("Failed to commit session turn")?;
        Ok(())
    }

    /// The newest `limit` messages of a session, oldest first
    pub async fn recent(
        pool: &SqlitePool,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionMessage>> {
        let mut messages: Vec<SessionMessage> = sqlx::query_as(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM chat_sessions
            WHERE session_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .store_context("Failed to load session history")?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn count(pool: &SqlitePool, session_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(pool)
            .await
            .store_context("Failed to count session messages")
    }

    pub async fn clear_all(pool: &SqlitePool) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM chat_sessions")
            .execute(pool)
            .await
            .store_context("Failed to delete session history")?
            .rows_affected();
        Ok(deleted)
    }
}
