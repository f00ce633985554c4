use serde::Serialize;

/// Root listing of everything this instance serves.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub available_caches: Vec<String>,
    pub entry_points: Vec<String>,
    pub status_entry_points: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Served in place of an artifact that was offloaded to the file sink.
#[derive(Debug, Serialize)]
pub struct OffloadedResponse {
    pub offloaded: bool,
    pub job: String,
    pub slot: String,
}
