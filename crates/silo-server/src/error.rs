use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::dto::ErrorResponse;

/// Route-level errors. The serving layer never surfaces pipeline errors,
/// only "this cache entry does not exist here".
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                let body = ErrorResponse {
                    error: "not_found".to_string(),
                    message,
                };
                (StatusCode::NOT_FOUND, axum::Json(body)).into_response()
            }
        }
    }
}
