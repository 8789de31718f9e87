use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use quarry_core::persist::{load_index, IndexPaths};
use quarry_core::query::parse_query;
use quarry_core::search::evaluate;
use quarry_core::tokenizer::Analyzer;
use quarry_core::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
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
    pub doc_id: u32,
    pub external_id: String,
    pub title: String,
    pub snippet: Option<String>,
}

/// Shared server state. The index is immutable once loaded; queries clone
/// the `Arc` out of the lock and evaluate without holding it. Reload swaps a
/// freshly loaded index in, so requests see the old or the new index, never
/// a partial one.
#[derive(Clone)]
pub struct AppState {
    pub index_dir: PathBuf,
    pub index: Arc<RwLock<Option<Arc<InvertedIndex>>>>,
    pub analyzer: Arc<Analyzer>,
    pub admin_token: Option<String>,
}

pub fn build_app(index_dir: String) -> Result<Router> {
    let paths = IndexPaths::new(&index_dir);
    let index = match load_index(&paths) {
        Ok(index) => {
            tracing::info!(
                num_docs = index.num_docs,
                num_terms = index.num_terms(),
                "index loaded"
            );
            Some(Arc::new(index))
        }
        Err(err) => {
            tracing::warn!(index_dir, "no usable index, queries will fail until a reload: {err:#}");
            None
        }
    };
    let state = AppState {
        index_dir: PathBuf::from(&index_dir),
        index: Arc::new(RwLock::new(index)),
        analyzer: Arc::new(Analyzer::default()),
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer());
    Ok(app)
}

// CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default.
fn cors_layer() -> CorsLayer {
    match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();

    let index = state.index.read().as_ref().cloned().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "no index loaded; build one with the indexer, then POST /index/reload".to_string(),
    ))?;

    let expr = parse_query(&params.q, &state.analyzer)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let doc_ids = evaluate(&expr, &index);
    let total_hits = doc_ids.len();

    let k = params.k.clamp(1, 100);
    let raw_terms = raw_query_terms(&params.q);
    let mut results: Vec<SearchHit> = Vec::new();
    for doc_id in doc_ids.into_iter().take(k) {
        if let Some(meta) = index.docs.get(&doc_id) {
            let snippet = meta
                .text_path
                .as_ref()
                .and_then(|rel| snippet_from_file(&state.index_dir.join(rel), &raw_terms));
            results.push(SearchHit {
                doc_id,
                external_id: meta.external_id.clone(),
                title: meta.title.clone(),
                snippet,
            });
        }
    }

    Ok(Json(SearchResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        total_hits,
        results,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<u32>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let index = state
        .index
        .read()
        .as_ref()
        .cloned()
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "no index loaded".to_string()))?;
    if let Some(meta) = index.docs.get(&doc_id) {
        let mut obj = serde_json::json!({
            "doc_id": doc_id,
            "external_id": meta.external_id,
            "title": meta.title,
        });
        if let Some(rel) = &meta.text_path {
            if let Ok(text) = std::fs::read_to_string(state.index_dir.join(rel)) {
                obj["text"] = serde_json::Value::String(text);
            }
        }
        return Ok(Json(obj));
    }
    Err((StatusCode::NOT_FOUND, format!("doc {doc_id} not found")))
}

/// Swap in a freshly persisted index. The running index stays in place when
/// the load fails.
async fn reload_handler(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_dir);
    match load_index(&paths) {
        Ok(index) => {
            let num_docs = index.num_docs;
            let num_terms = index.num_terms();
            *state.index.write() = Some(Arc::new(index));
            tracing::info!(num_docs, num_terms, "index reloaded");
            Ok(Json(serde_json::json!({ "reloaded": true, "num_docs": num_docs })))
        }
        Err(err) => Err((StatusCode::SERVICE_UNAVAILABLE, format!("reload failed: {err:#}"))),
    }
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
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

/// Words from the raw query usable for highlighting. Query syntax
/// (operators, parens, window markers) is dropped, terms are kept verbatim.
fn raw_query_terms(q: &str) -> Vec<String> {
    q.split_whitespace()
        .map(|t| t.trim_matches(|c| c == '(' || c == ')'))
        .filter(|t| !t.is_empty() && !t.starts_with('/'))
        .filter(|t| {
            !t.eq_ignore_ascii_case("and")
                && !t.eq_ignore_ascii_case("or")
                && !t.eq_ignore_ascii_case("not")
        })
        .map(str::to_string)
        .collect()
}

fn snippet_from_file(path: &PathBuf, raw_terms: &[String]) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    if text.is_empty() {
        return None;
    }
    // Center the snippet on the first case-insensitive match of any term.
    let mut first_idx: Option<usize> = None;
    for term in raw_terms {
        if let Some(pos) = find_case_insensitive(&text, term) {
            first_idx = Some(pos);
            break;
        }
    }
    let snippet = match first_idx {
        Some(idx) => {
            let start = idx.saturating_sub(100);
            let end = (idx + 200).min(text.len());
            text.get(start..end).unwrap_or(&text).to_string()
        }
        None => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn find_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.to_lowercase();
    let n = needle.to_lowercase();
    if n.is_empty() {
        return None;
    }
    h.find(&n)
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        let pattern = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build();
        if let Ok(pattern) = pattern {
            s = pattern
                .replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0]))
                .to_string();
        }
    }
    s
}
