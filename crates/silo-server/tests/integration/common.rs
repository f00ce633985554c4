use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use silo_core::config::JobConfig;
use silo_core::stats::JobState;
use silo_core::store::{Artifact, DataStore, RAW_SLOT, diff_slot};
use silo_server::{AppState, router};

/// Router over a store populated with one healthy job, one offloaded job,
/// and one invalid job.
pub fn test_router() -> Router {
    let store = DataStore::new();

    let people = JobConfig::new("people", None);
    let mut people_state = JobState::new(&people);
    people_state.available = true;
    people_state.statistics.record_success(12);
    store.put("people", RAW_SLOT, Artifact::Value(json!({"query": {"results": {}}})));
    store.put(
        "people",
        "simplify_ask",
        Artifact::Value(json!({"Alice": {"Age": [30]}})),
    );
    store.put(
        "people",
        &diff_slot("simplify_ask"),
        Artifact::Value(json!({"init": true, "total_changes": 0})),
    );
    store.publish_status(people_state.snapshot("people"));

    store.put("bulky", RAW_SLOT, Artifact::Offloaded);

    let broken = JobConfig::new("broken", None);
    let mut broken_state = JobState::new(&broken);
    broken_state.invalidate();
    store.init_job("broken");
    store.publish_status(broken_state.snapshot("broken"));

    router(Arc::new(AppState {
        store,
        pretty_json: false,
    }))
}

/// One-shot GET returning status and parsed JSON body.
pub async fn get(router: Router, path: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("request build failed"),
        )
        .await
        .expect("request failed");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body read failed")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
