use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;

use silo_core::store::{Artifact, RAW_SLOT};

use crate::dto::{HealthResponse, IndexResponse, OffloadedResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the full read-only router over the store.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/raw/{id}", get(raw))
        .route("/cache/{id}/{slot}", get(cache_slot))
        .route("/status.json", get(all_statuses))
        .route("/status/{id}", get(job_status))
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    let jobs = state.store.jobs();

    let mut entry_points = Vec::new();
    let mut status_entry_points = Vec::new();
    for id in &jobs {
        status_entry_points.push(format!("/status/{id}.json"));
        let Some(record) = state.store.record(id) else {
            continue;
        };
        let mut slots: Vec<&String> = record.keys().collect();
        slots.sort();
        for slot in slots {
            if slot == RAW_SLOT {
                entry_points.push(format!("/raw/{id}.json"));
            } else {
                entry_points.push(format!("/cache/{id}/{slot}.json"));
            }
        }
    }

    json_response(
        &state,
        &IndexResponse {
            available_caches: jobs,
            entry_points,
            status_entry_points,
        },
    )
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    json_response(
        &state,
        &HealthResponse {
            status: "ok",
            jobs: state.store.jobs().len(),
        },
    )
}

async fn raw(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    serve_slot(&state, trim_json_suffix(&id), RAW_SLOT)
}

async fn cache_slot(
    State(state): State<Arc<AppState>>,
    Path((id, slot)): Path<(String, String)>,
) -> Response {
    serve_slot(&state, &id, trim_json_suffix(&slot))
}

async fn job_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = trim_json_suffix(&id);
    match state.store.status(id) {
        Some(report) => json_response(&state, &report),
        None => ApiError::NotFound(format!("no job with id '{id}'")).into_response(),
    }
}

async fn all_statuses(State(state): State<Arc<AppState>>) -> Response {
    json_response(&state, &state.store.statuses())
}

fn serve_slot(state: &AppState, id: &str, slot: &str) -> Response {
    match state.store.get(id, slot) {
        Some(Artifact::Value(value)) => json_response(state, &value),
        Some(Artifact::Offloaded) => json_response(
            state,
            &OffloadedResponse {
                offloaded: true,
                job: id.to_string(),
                slot: slot.to_string(),
            },
        ),
        None => {
            ApiError::NotFound(format!("no cached '{slot}' for job '{id}'")).into_response()
        }
    }
}

/// Routes accept the `.json`-suffixed paths the index advertises.
fn trim_json_suffix(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

/// Serialize a response honoring the master pretty-print setting.
fn json_response<T: Serialize>(state: &AppState, value: &T) -> Response {
    let serialized = if state.pretty_json {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };

    match serialized {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "Failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
