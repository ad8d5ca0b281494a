//! HTTP surface: chat, health and knowledge-base administration.


use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::{Database, SessionHistory, VectorStore};
use crate::generation::{Generator, OpenAiClient};
use crate::rag::{
    Answer, AnswerPipeline, KnowledgeBase, Question, RetrievalFilter, Retriever, load_seed_file,
    normalize_filter_value,
};
use crate::{RagError, Result, embeddings};

const DEFAULT_SESSION_ID: &str = "default";

/// Shared handles for request handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<AnswerPipeline>,
    knowledge_base: KnowledgeBase,
    seed_file: PathBuf,
    embedding_model: String,
    llm: String,
}

impl AppState {
    pub fn new(
        pipeline: Arc<AnswerPipeline>,
        knowledge_base: KnowledgeBase,
        seed_file: PathBuf,
    ) -> Self {
        let embedding_model = pipeline.retriever().embedder().model_name().to_string();
        let llm = pipeline.generator().model_name().to_string();
        Self {
            pipeline,
            knowledge_base,
            seed_file,
            embedding_model,
            llm,
        }
    }

    /// Wire the store, embedder and generator described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let database = Database::new(config.database_path(), &config.store).await?;

        let embedder = embeddings::from_config(config)?;
        let store = Arc::new(
            VectorStore::new(
                database.clone(),
                Some(config.embedder.embedding_dimension as usize),
            )
            .await?
            .with_min_similarity(config.retrieval.min_similarity),
        );

        if config.generator.api_key.is_none() {
            warn!("No generator API key configured; /chat requests with context will fail");
        }
        let generator: Arc<dyn Generator> = Arc::new(OpenAiClient::new(config)?);

        let retriever = Retriever::new(Arc::clone(&embedder), Arc::clone(&store));
        let pipeline = AnswerPipeline::new(
            retriever,
            generator,
            SessionHistory::new(database),
            &config.retrieval,
        );

        let mut state = Self::new(
            Arc::new(pipeline),
            KnowledgeBase::new(embedder, store),
            config.seed_file_path(),
        );
        state.embedding_model = config.embedder.model_label();
        Ok(state)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session_id")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub category_filter: Option<String>,
    #[serde(default)]
    pub region_filter: Option<String>,
    #[serde(default)]
    pub top_k: Option<i64>,
}

fn default_session_id() -> Option<String> {
    Some(DEFAULT_SESSION_ID.to_string())
}

impl ChatRequest {
    /// Validate and normalize into a pipeline question
    pub fn into_question(self) -> Result<Question> {
        let top_k = match self.top_k {
            Some(k) if k <= 0 => {
                return Err(RagError::InvalidArgument(format!(
                    "top_k must be a positive integer, got {}",
                    k
                )));
            }
            Some(k) => Some(k as usize),
            None => None,
        };

        Ok(Question {
            text: self.message,
            session_id: self.session_id,
            top_k,
            filter: RetrievalFilter {
                category: normalize_filter_value(self.category_filter.as_deref()),
                region: normalize_filter_value(self.region_filter.as_deref()),
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
}

/// Failure rendered as a JSON body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_type: &'static str,
    message: String,
}

impl ApiError {
    #[inline]
    pub fn service_unavailable(error: &RagError) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error_type: error.kind(),
            message: format!("DB error: {}", error),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(error: RagError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_type: error.kind(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error_type: self.error_type.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/setup", post(setup_handler))
        .route("/reset", post(reset_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "assistant": "Tembo AI",
        "country": "Kenya",
        "stack": format!("{} + sqlite + {}", state.llm, state.embedding_model),
    }))
}

async fn health_handler(State(state): State<AppState>) -> std::result::Result<Json<Value>, ApiError> {
    let count = state
        .knowledge_base
        .store()
        .count()
        .await
        .map_err(|e| ApiError::service_unavailable(&e))?;

    Ok(Json(json!({
        "status": "ok",
        "documents_in_kb": count,
        "embedding_model": state.embedding_model,
        "llm": state.llm,
    })))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<Answer>, ApiError> {
    let question = request.into_question()?;
    let answer = state.pipeline.answer(&question).await?;
    Ok(Json(answer))
}

async fn setup_handler(State(state): State<AppState>) -> std::result::Result<Json<Value>, ApiError> {
    let entries = load_seed_file(&state.seed_file)?;
    let report = state.knowledge_base.populate(&entries).await?;

    Ok(Json(json!({
        "status": "ok",
        "message": "Database populated",
        "details": report,
    })))
}

async fn reset_handler(State(state): State<AppState>) -> std::result::Result<Json<Value>, ApiError> {
    let removed = state.knowledge_base.reset().await?;
    Ok(Json(json!({
        "status": "ok",
        "documents_removed": removed,
    })))
}
