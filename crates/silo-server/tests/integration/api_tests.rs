use axum::http::StatusCode;
use serde_json::json;

use crate::common::{get, test_router};

#[tokio::test]
async fn index_lists_caches_and_entry_points() {
    let (status, body) = get(test_router(), "/").await;
    assert_eq!(status, StatusCode::OK);

    let caches: Vec<&str> = body["available_caches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(caches, vec!["broken", "bulky", "people"]);

    let entry_points = body["entry_points"].as_array().unwrap();
    assert!(entry_points.contains(&json!("/raw/people.json")));
    assert!(entry_points.contains(&json!("/cache/people/simplify_ask.json")));
    assert!(entry_points.contains(&json!("/cache/people/simplify_ask-diff.json")));
}

#[tokio::test]
async fn health_reports_job_count() {
    let (status, body) = get(test_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["jobs"], json!(3));
}

#[tokio::test]
async fn raw_payload_is_served_with_and_without_suffix() {
    let (status, body) = get(test_router(), "/raw/people.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"query": {"results": {}}}));

    let (status, _) = get(test_router(), "/raw/people").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn transformer_artifact_is_served_by_slot() {
    let (status, body) = get(test_router(), "/cache/people/simplify_ask.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Alice": {"Age": [30]}}));
}

#[tokio::test]
async fn unknown_cache_is_a_404() {
    let (status, body) = get(test_router(), "/raw/nope.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("not_found"));

    let (status, _) = get(test_router(), "/cache/people/nope.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offloaded_artifact_is_reported_not_served() {
    let (status, body) = get(test_router(), "/raw/bulky.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offloaded"], json!(true));
    assert_eq!(body["job"], json!("bulky"));
}

#[tokio::test]
async fn job_status_reflects_runtime_state() {
    let (status, body) = get(test_router(), "/status/people.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["available"], json!(true));
    assert_eq!(body["statistics"]["run_counter"], json!(1));

    let (status, body) = get(test_router(), "/status/broken.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
}

#[tokio::test]
async fn status_overview_lists_all_jobs() {
    let (status, body) = get(test_router(), "/status.json").await;
    assert_eq!(status, StatusCode::OK);
    let reports = body.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["id"], json!("broken"));
    assert_eq!(reports[1]["id"], json!("people"));
}

#[tokio::test]
async fn unknown_status_is_a_404() {
    let (status, _) = get(test_router(), "/status/nope.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
