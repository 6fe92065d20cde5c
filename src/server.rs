//! HTTP API server.
//!
//! Exposes the ingestion and question-answering pipeline as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ingest/file` | Multipart file upload → extract, chunk, embed, store |
//! | `POST` | `/api/ingest/url` | Download a remote document and ingest it |
//! | `POST` | `/api/ask` | Classify and answer a question |
//! | `GET`  | `/api/debug/records` | Stored-record summary for troubleshooting |
//! | `GET`  | `/api/debug/search_term` | Deterministic substring presence check |
//! | `POST` | `/api/reset_vectorstore` | Drop the collection (dimension-mismatch remedy) |
//! | `DELETE` | `/api/documents/{source}` | Delete all records of one source |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `dependency_unavailable` (502),
//! `store_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::ask::{self, AskRequest};
use crate::cache::AnswerCache;
use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::ingest;
use crate::llm;
use crate::migrate;
use crate::store::sqlite::SqliteStore;
use crate::store::VectorStore;
use crate::db;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    router: Arc<ask::Router>,
}

/// Starts the HTTP server.
///
/// Connects to the database, runs migrations, wires up the router with the
/// configured embedding and completion providers, and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config).await?;
    migrate::apply_schema(&pool).await?;

    let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::new(pool));
    let embedder = embedding::create_embedder(&config.embedding)?;
    let completer = llm::create_completer(&config.llm)?;
    let cache = Arc::new(AnswerCache::new());

    let router = Arc::new(ask::Router::new(
        store.clone(),
        embedder.clone(),
        completer,
        cache,
        config.clone(),
    ));

    let state = AppState {
        config,
        store,
        embedder,
        router,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = AxumRouter::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/ingest/file", post(handle_ingest_file))
        .route("/api/ingest/url", post(handle_ingest_url))
        .route("/api/ask", post(handle_ask))
        .route("/api/debug/records", get(handle_debug_records))
        .route("/api/debug/search_term", get(handle_debug_search_term))
        .route("/api/reset_vectorstore", post(handle_reset))
        .route("/api/documents/{source}", delete(handle_delete_source))
        .layer(cors)
        .with_state(state);

    info!("API server listening on http://{}", bind_addr);
    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn dependency_unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "dependency_unavailable".to_string(),
        message: message.into(),
    }
}

fn store_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "store_error".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<ask::AskError> for AppError {
    fn from(e: ask::AskError) -> Self {
        match e {
            ask::AskError::PreconditionMissing(msg) => bad_request(msg),
            ask::AskError::Dependency(msg) => dependency_unavailable(msg),
            ask::AskError::Store(msg) => store_error(msg),
            ask::AskError::Other(err) => internal(err.to_string()),
        }
    }
}

/// Maps ingest pipeline errors to the most appropriate status code by
/// inspecting the message, so the pipeline keeps plain `anyhow` errors.
fn classify_ingest_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);
    if msg.contains("Failed to download") {
        bad_request(msg)
    } else if msg.contains("embedding failed") || msg.contains("provider is disabled") {
        dependency_unavailable(msg)
    } else if msg.contains("dimension mismatch") {
        store_error(msg)
    } else {
        internal(msg)
    }
}

// ============ GET / and /health ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Document QA API is running." }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Ingestion ============

#[derive(Serialize)]
struct IngestResponse {
    status: String,
    source: String,
    chunks: usize,
}

async fn handle_ingest_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let declared_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| extension_of(&filename));
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let summary = ingest::ingest_bytes(
            state.store.as_ref(),
            state.embedder.as_ref(),
            &state.config,
            &filename,
            &data,
            &declared_type,
        )
        .await
        .map_err(classify_ingest_error)?;

        return Ok(Json(IngestResponse {
            status: "success".to_string(),
            source: summary.source,
            chunks: summary.chunks,
        }));
    }

    Err(bad_request("multipart field 'file' is required"))
}

fn extension_of(filename: &str) -> String {
    match filename.rsplit('.').next() {
        Some(ext) if ext != filename => format!(".{}", ext),
        _ => "txt".to_string(),
    }
}

#[derive(Deserialize)]
struct IngestUrlRequest {
    url: String,
}

async fn handle_ingest_url(
    State(state): State<AppState>,
    Json(req): Json<IngestUrlRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if req.url.trim().is_empty() {
        return Err(bad_request("url must not be empty"));
    }

    let summary = ingest::ingest_url(
        state.store.as_ref(),
        state.embedder.as_ref(),
        &state.config,
        &req.url,
    )
    .await
    .map_err(classify_ingest_error)?;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        source: summary.source,
        chunks: summary.chunks,
    }))
}

// ============ Ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<ask::AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let response = state.router.ask(req).await?;
    Ok(Json(response))
}

// ============ Debug endpoints ============

#[derive(Serialize)]
struct RecordSummary {
    id: String,
    source: String,
    chunk_index: i64,
    timestamp: String,
    text: String,
}

#[derive(Serialize)]
struct DebugRecordsResponse {
    record_count: usize,
    embedding_dims: usize,
    records: Vec<RecordSummary>,
}

/// Summary of stored records for troubleshooting ingestion. Embedding
/// vectors are not echoed back; only the configured dimensionality is shown.
async fn handle_debug_records(
    State(state): State<AppState>,
) -> Result<Json<DebugRecordsResponse>, AppError> {
    let records = state
        .store
        .full_scan(&state.config.retrieval.collection, 100)
        .await
        .map_err(|e| store_error(e.to_string()))?;

    Ok(Json(DebugRecordsResponse {
        record_count: records.len(),
        embedding_dims: state.embedder.dims(),
        records: records
            .into_iter()
            .map(|r| RecordSummary {
                id: r.id,
                source: r.metadata.source,
                chunk_index: r.metadata.chunk_index,
                timestamp: r.metadata.timestamp,
                text: r.text,
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct SearchTermQuery {
    term: String,
}

#[derive(Serialize)]
struct TermMatch {
    source: String,
    chunk_index: i64,
    snippet: String,
}

#[derive(Serialize)]
struct SearchTermResponse {
    term: String,
    matches: Vec<TermMatch>,
    match_count: usize,
    record_count: usize,
}

/// Deterministic case-insensitive substring search across stored records.
/// Useful for quick presence checks when semantic retrieval looks off.
async fn handle_debug_search_term(
    State(state): State<AppState>,
    Query(query): Query<SearchTermQuery>,
) -> Result<Json<SearchTermResponse>, AppError> {
    if query.term.trim().is_empty() {
        return Err(bad_request("term must not be empty"));
    }

    let records = state
        .store
        .full_scan(
            &state.config.retrieval.collection,
            state.config.retrieval.scan_limit,
        )
        .await
        .map_err(|e| store_error(e.to_string()))?;

    let term_lower = query.term.to_ascii_lowercase();
    let mut matches = Vec::new();
    for record in &records {
        if let Some(pos) = record.text.to_ascii_lowercase().find(&term_lower) {
            matches.push(TermMatch {
                source: record.metadata.source.clone(),
                chunk_index: record.metadata.chunk_index,
                snippet: ask::snippet_around(&record.text, pos, 80),
            });
        }
    }

    Ok(Json(SearchTermResponse {
        term: query.term,
        match_count: matches.len(),
        record_count: records.len(),
        matches,
    }))
}

// ============ Maintenance ============

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: String,
}

/// Drops the collection. This is the administrative remedy for an embedding
/// dimension mismatch after switching models.
async fn handle_reset(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let collection = &state.config.retrieval.collection;
    state
        .store
        .delete_collection(collection)
        .await
        .map_err(|e| store_error(e.to_string()))?;

    Ok(Json(StatusResponse {
        status: "success".to_string(),
        message: format!("Collection '{}' deleted.", collection),
    }))
}

#[derive(Serialize)]
struct DeleteResponse {
    status: String,
    source: String,
    deleted: u64,
}

async fn handle_delete_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = state
        .store
        .delete_by_source(&state.config.retrieval.collection, &source)
        .await
        .map_err(|e| store_error(e.to_string()))?;

    Ok(Json(DeleteResponse {
        status: "success".to_string(),
        source,
        deleted,
    }))
}
