use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use quarry_core::index::{DocMeta, IndexBuilder};
use quarry_core::persist::{save_index, IndexPaths, MetaFile};
use quarry_core::tokenizer::Analyzer;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;
use tower::ServiceExt;

// Doc 0 = "computer science data", doc 1 = "data science only".
fn build_tiny_index(dir: &std::path::Path) {
    fs::create_dir_all(dir.join("texts")).unwrap();
    let analyzer = Analyzer::default();
    let mut builder = IndexBuilder::new();
    for (name, body) in [("doc1.txt", "computer science data"), ("doc2.txt", "data science only")] {
        let tokens = analyzer.analyze(body);
        let doc_id = builder.add_document(
            DocMeta {
                external_id: name.to_string(),
                title: name.trim_end_matches(".txt").to_string(),
                text_path: None,
            },
            &tokens,
        );
        let rel = format!("texts/{doc_id}.txt");
        fs::write(dir.join(&rel), body).unwrap();
        builder.doc_meta_mut(doc_id).unwrap().text_path = Some(rel);
    }
    let index = builder.finish();
    let meta =
        MetaFile { num_docs: index.num_docs, created_at: "2026-01-01T00:00:00Z".into(), version: 1 };
    save_index(&IndexPaths::new(dir), &index, &meta).unwrap();
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let resp = app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn app_over_tiny_index(dir: &std::path::Path) -> Router {
    build_tiny_index(dir);
    quarry_server::build_app(dir.to_string_lossy().to_string()).unwrap()
}

#[tokio::test]
async fn boolean_and_search() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let (status, json) = get(app, "/search?q=computer%20AND%20science").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 1);
    let hits = json["results"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["doc_id"], 0);
    assert_eq!(hits[0]["title"], "doc1");
    let snippet = hits[0]["snippet"].as_str().unwrap();
    assert!(snippet.contains("<em>computer</em>"));
}

#[tokio::test]
async fn boolean_or_and_not() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let (status, json) = get(app.clone(), "/search?q=computer%20OR%20data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);

    let (status, json) = get(app, "/search?q=science%20NOT%20data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn proximity_search_respects_window() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let (status, json) = get(app.clone(), "/search?q=computer%20science%20/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 1);
    assert_eq!(json["results"][0]["doc_id"], 0);

    let (status, json) = get(app, "/search?q=computer%20science%20/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn unknown_term_is_empty_not_an_error() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let (status, json) = get(app, "/search?q=quantum").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn malformed_query_is_a_bad_request() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let resp = app
        .oneshot(Request::get("/search?q=computer%20AND").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let message = String::from_utf8_lossy(&body);
    assert!(message.contains("unexpected end of query"));
}

#[tokio::test]
async fn search_without_an_index_is_unavailable() {
    let dir = tempdir().unwrap();
    // No index built; the app still starts and reports 503 per query.
    let app = quarry_server::build_app(dir.path().to_string_lossy().to_string()).unwrap();

    let resp = app
        .oneshot(Request::get("/search?q=computer").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn doc_endpoint_returns_stored_text() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    let (status, json) = get(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["external_id"], "doc2.txt");
    assert_eq!(json["text"], "data science only");

    let resp = app.oneshot(Request::get("/doc/99").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_requires_admin_token() {
    let dir = tempdir().unwrap();
    let app = app_over_tiny_index(dir.path());

    // ADMIN_TOKEN is not set in the test environment, so reload is refused.
    let resp = app
        .oneshot(Request::post("/index/reload").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint() {
    let dir = tempdir().unwrap();
    let app = quarry_server::build_app(dir.path().to_string_lossy().to_string()).unwrap();
    let resp = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
