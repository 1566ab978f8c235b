//! Endpoint contract tests against the assembled router.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use bundler_core::{BundlerConfig, JobDispatcher, JobStore, SqliteStore};
use bundler_fs::FileSystems;
use bundler_server::routes::{router, AppState};

fn test_app(staging: &Path) -> (Router, Arc<dyn JobStore>) {
    let store: Arc<dyn JobStore> = Arc::new(SqliteStore::memory().unwrap());
    let fs = Arc::new(FileSystems::with_local());
    let config = BundlerConfig {
        staging_directory: staging.to_string_lossy().into_owned(),
        base_url: "http://files.example.net/bundles".to_string(),
        ..Default::default()
    };
    let dispatcher = Arc::new(JobDispatcher::new(
        store.clone(),
        fs,
        &config,
        tokio::runtime::Handle::current(),
    ));
    let state = AppState {
        dispatcher,
        store: store.clone(),
        request_directory: None,
    };
    (router(state), store)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn submission_acknowledges_with_not_started_tracker() {
    let staging = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = inputs.path().join("a.bin");
    std::fs::write(&input, b"hello").unwrap();
    let (app, _store) = test_app(staging.path());

    let payload = serde_json::json!({
        "files": [input.to_string_lossy()],
        "type": "ZIP",
        "max_size": 100
    });
    let response = app
        .oneshot(
            Request::post("/BundleFilesJSON")
                .header("content-type", "application/json")
                .header("X-SSL-Client-CN", "alice")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let tracker = body_json(response).await;
    assert_eq!(tracker["state"], "NOT_STARTED");
    assert_eq!(tracker["user_name"], "alice");
    let job_id = tracker["job_id"].as_str().unwrap();
    assert_eq!(job_id.len(), 32);
    assert!(job_id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test(flavor = "multi_thread")]
async fn text_submission_reaches_complete_via_get_state() {
    let staging = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = inputs.path().join("payload.bin");
    std::fs::write(&input, b"payload for the text endpoint").unwrap();
    let (app, _store) = test_app(staging.path());

    let payload = serde_json::json!({
        "files": [input.to_string_lossy()],
        "type": "TAR",
        "user_name": "bob"
    });
    let response = app
        .clone()
        .oneshot(
            Request::post("/BundleFilesText")
                .header("content-type", "text/plain")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tracker = body_json(response).await;
    let job_id = tracker["job_id"].as_str().unwrap().to_string();
    assert_eq!(tracker["user_name"], "bob");

    let mut last = Value::Null;
    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/GetState?job_id={job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        last = body_json(response).await;
        if last["state"] == "COMPLETE" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    assert_eq!(last["state"], "COMPLETE");
    assert_eq!(last["threads"], 1);
    assert_eq!(last["threads_complete"], 1);
    assert_eq!(last["hashes_complete"], 1);
    assert_eq!(last["num_files"], 1);
    assert_eq!(last["files_complete"], 1);
    assert_eq!(last["size"], 29);
    assert_eq!(last["size_complete"], 29);
    let archives = last["archives"].as_array().unwrap();
    assert_eq!(archives.len(), 1);
    assert!(archives[0]["archive_url"]
        .as_str()
        .unwrap()
        .starts_with("http://files.example.net/bundles/"));
}

#[tokio::test(flavor = "multi_thread")]
async fn garbage_body_is_a_400() {
    let staging = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(staging.path());

    for (route, body) in [
        ("/BundleFilesJSON", "this is not json"),
        ("/BundleFiles", "{\"files\": 42}"),
        ("/BundleFilesText", "{{{{"),
    ] {
        let response = app
            .clone()
            .oneshot(Request::post(route).body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{route}");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn get_state_for_unknown_job_is_not_available() {
    let staging = tempfile::tempdir().unwrap();
    let (app, _store) = test_app(staging.path());

    let response = app
        .oneshot(
            Request::get("/GetState?job_id=DOESNOTEXIST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tracker = body_json(response).await;
    assert_eq!(tracker["state"], "NOT_AVAILABLE");
    assert_eq!(tracker["job_id"], "DOESNOTEXIST");
}

#[tokio::test(flavor = "multi_thread")]
async fn liveness_and_job_listing() {
    let staging = tempfile::tempdir().unwrap();
    let (app, store) = test_app(staging.path());

    let response = app
        .clone()
        .oneshot(Request::get("/isAlive").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("is alive"));

    // An invalid submission still registers its job id.
    let response = app
        .clone()
        .oneshot(
            Request::post("/BundleFiles")
                .body(Body::from("{\"files\": []}"))
                .unwrap(),
        )
        .await
        .unwrap();
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..200 {
        if store.get_job(&job_id).unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = app
        .oneshot(Request::get("/DataSourceTest").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ids = body_json(response).await;
    assert_eq!(ids, serde_json::json!([job_id]));
}
