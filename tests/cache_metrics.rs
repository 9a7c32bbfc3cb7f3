use std::{collections::HashSet, fs, sync::Arc};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header::ACCEPT_ENCODING},
};
use metrics_util::debugging::DebuggingRecorder;
use tempfile::TempDir;
use tower::ServiceExt;
use vitrine::{
    cache::CacheStore,
    infra::http::{HttpState, build_router},
};

#[tokio::test]
async fn cache_and_delivery_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("index.html");
    fs::write(&path, b"<p>metrics</p>").expect("write asset");

    let store = Arc::new(CacheStore::new(dir.path()));
    store.upsert(&path).expect("upsert");
    assert!(store.upsert(&dir.path().join("gone.html")).is_err());

    let router = build_router(HttpState { store }, "/static", &[]);

    for (uri, expected) in [
        ("/static/index.html", StatusCode::OK),
        ("/static/missing.html", StatusCode::NOT_FOUND),
    ] {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_eq!(response.status(), expected);
    }

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "vitrine_cache_lookup_total",
        "vitrine_cache_upsert_total",
        "vitrine_cache_ingest_ms",
        "vitrine_http_responses_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
