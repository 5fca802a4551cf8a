use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use kvsearch::store::keys;
use kvsearch::{
    connect, BatchReport, DocId, Document, EngineConfig, FieldValue, IndexReader, IndexWriter, KvStore, RowSource,
    SearchError, WordlistEntry,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, String)>;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Overrides the configured fuzziness for this query.
    pub fuzzy: Option<bool>,
    pub as_you_type: Option<bool>,
    pub min_score: Option<u64>,
}
fn default_k() -> usize {
    10
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: u64,
    /// Source file, for indexes built from a directory walk.
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub index: String,
    pub total_documents: u64,
    pub stemmer: Option<String>,
    pub tokenizer: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub config: Arc<EngineConfig>,
    pub index: String,
    pub writer: Arc<IndexWriter>,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Opens `index` in `store`, creating it when the store has no info
    /// table for it yet.
    pub fn new(store: Arc<dyn KvStore>, config: EngineConfig, index: &str, admin_token: Option<String>) -> Result<Self> {
        let writer = if store.exists(&keys::info(index))? {
            IndexWriter::open(store.clone(), index, &config)?
        } else {
            tracing::info!(index, "creating empty index");
            IndexWriter::create(store.clone(), index, &config)?
        };
        Ok(Self { store, config: Arc::new(config), index: index.to_string(), writer: Arc::new(writer), admin_token })
    }

    fn reader(&self, params: Option<&SearchParams>) -> kvsearch::Result<IndexReader> {
        let mut reader = IndexReader::open(self.store.clone(), &self.index, &self.config)?;
        if let Some(params) = params {
            if let Some(fuzzy) = params.fuzzy {
                reader.fuzziness(fuzzy);
            }
            if let Some(as_you_type) = params.as_you_type {
                reader.as_you_type(as_you_type);
            }
        }
        Ok(reader)
    }
}

pub fn build_app(config: EngineConfig, index: &str) -> Result<Router> {
    let store = connect(&config)?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::new(store, config, index, admin_token)?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/terms/:term", get(term_handler))
        .route("/stats", get(stats_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/:doc_id", put(update_doc).delete(delete_doc))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn status_for(err: &SearchError) -> StatusCode {
    match err {
        SearchError::Configuration(_)
        | SearchError::UnsupportedLanguage(_)
        | SearchError::UnsupportedTokenizer(_)
        | SearchError::InvalidDocument { .. }
        | SearchError::Json(_) => StatusCode::BAD_REQUEST,
        SearchError::StorageUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SearchError::Store { .. } | SearchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: SearchError) -> (StatusCode, String) {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<SearchResponse> {
    let reader = state.reader(Some(&params)).map_err(api_error)?;
    let mut found = reader.search(&params.q, usize::MAX).map_err(api_error)?;
    if let Some(min_score) = params.min_score {
        found = found.with_min_score(min_score);
    }
    let total_hits = found.hits.len();
    let k = params.k.clamp(1, 100);

    let mut results = Vec::with_capacity(k.min(total_hits));
    for hit in found.hits.into_iter().take(k) {
        let path = reader.file_path(hit.doc_id).map_err(api_error)?.map(|p| p.to_string_lossy().into_owned());
        results.push(SearchHit { doc_id: hit.doc_id, score: hit.score, path });
    }
    Ok(Json(SearchResponse { query: params.q, took_s: found.execution_time_ms / 1000.0, total_hits, results }))
}

pub async fn term_handler(State(state): State<AppState>, Path(term): Path<String>) -> ApiResult<WordlistEntry> {
    let reader = state.reader(None).map_err(api_error)?;
    match reader.word_from_wordlist(&term).map_err(api_error)? {
        Some(entry) => Ok(Json(entry)),
        None => Err((StatusCode::NOT_FOUND, format!("term `{term}` is not indexed"))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let info = state.reader(None).and_then(|r| r.info()).map_err(api_error)?;
    Ok(Json(StatsResponse {
        index: state.index.clone(),
        total_documents: info.total_documents,
        stemmer: info.stemmer,
        tokenizer: info.tokenizer,
    }))
}

// --- Admin endpoints ---
async fn index_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(rows): Json<Vec<serde_json::Value>>,
) -> ApiResult<BatchReport> {
    authorize(&state, &headers)?;
    let report = state.writer.run(&RowSource::from_values(rows)).map_err(api_error)?;
    Ok(Json(report))
}

async fn update_doc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    let mut document = Document::from_json(body).map_err(api_error)?;
    let primary_key = state.config.primary_key.as_str();
    match document.get(primary_key).map(FieldValue::as_doc_id) {
        None => document.set(primary_key, FieldValue::from(doc_id)),
        Some(Some(id)) if id == doc_id => {}
        Some(_) => return Err((StatusCode::BAD_REQUEST, format!("`{primary_key}` does not match the path id {doc_id}"))),
    }
    state.writer.update(doc_id, &document).map_err(api_error)?;
    state.store.flush().map_err(api_error)?;
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "updated": true })))
}

async fn delete_doc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<DocId>,
) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    let deleted = state.writer.delete(doc_id).map_err(api_error)?;
    if deleted {
        state.store.flush().map_err(api_error)?;
    } else {
        tracing::info!(doc_id, "document not indexed, nothing to delete");
    }
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "deleted": deleted })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
