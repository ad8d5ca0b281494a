
use tracing::debug;

use crate::database::sqlite::Database;
use crate::database::sqlite::models::{MessageRole, SessionMessage};
use crate::database::sqlite::queries::ChatSessionQueries;
use crate::{RagError, Result};

/// Per-session conversation log.
///
/// Messages are ordered by insertion. Concurrent writers to one session may
/// interleave; callers needing strict turn order serialize per session.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    database: Database,
}

impl SessionHistory {
    #[inline]
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn append(&self, session_id: &str, role: MessageRole, content: &str) -> Result<i64> {
        validate_session(session_id)?;
        validate_content(content)?;
        ChatSessionQueries::append(self.database.pool(), session_id, role, content).await
    }

    /// Record a question and its answer as two consecutive messages
    pub async fn append_turn(&self, session_id: &str, question: &str, answer: &str) -> Result<()> {
        validate_session(session_id)?;
        validate_content(question)?;
        validate_content(answer)?;

        ChatSessionQueries::append_turn(self.database.pool(), session_id, question, answer)
            .await?;
        debug!("Saved turn for session {}", session_id);
        Ok(())
    }

    /// Up to `limit` most recent messages, oldest first
    pub async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<SessionMessage>> {
        validate_session(session_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        ChatSessionQueries::recent(self.database.pool(), session_id, limit).await
    }

    pub async fn count(&self, session_id: &str) -> Result<usize> {
        let count = ChatSessionQueries::count(self.database.pool(), session_id).await?;
        Ok(count.max(0) as usize)
    }

    pub async fn clear(&self) -> Result<u64> {
        ChatSessionQueries::clear_all(self.database.pool()).await
    }
}

fn validate_session(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(RagError::InvalidArgument(
            "session id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(RagError::InvalidArgument(
            "message content must not be empty".to_string(),
        ));
    }
    Ok(())
}
