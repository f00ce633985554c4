//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::JobConfig;
use crate::diff::DiffReport;
use crate::error::AppError;
use crate::traits::{ArtifactSink, DiffSink, FetchError, Fetched, Fetcher};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that pops queued results and counts calls.
///
/// An exhausted queue keeps returning a default payload, so interval jobs
/// can run indefinitely in scheduler tests.
#[derive(Clone)]
pub struct MockFetcher {
    results: Arc<Mutex<Vec<Result<Value, AppError>>>>,
    pub calls: Arc<Mutex<u64>>,
}

impl MockFetcher {
    pub fn with_payloads(payloads: Vec<Value>) -> Self {
        Self::with_results(payloads.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<Value, AppError>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results)),
            calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _config: &JobConfig) -> Result<Fetched, FetchError> {
        *self.calls.lock().unwrap() += 1;

        let mut results = self.results.lock().unwrap();
        let result = if results.is_empty() {
            Ok(serde_json::json!({"default": true}))
        } else {
            results.remove(0)
        };

        match result {
            Ok(payload) => Ok(Fetched {
                payload,
                elapsed_ms: 5,
            }),
            Err(error) => Err(FetchError::new(error, 5)),
        }
    }
}

// ---------------------------------------------------------------------------
// MockDiffSink
// ---------------------------------------------------------------------------

/// Mock diff sink that records every report it receives.
#[derive(Clone, Default)]
pub struct MockDiffSink {
    pub reports: Arc<Mutex<Vec<DiffReport>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MockDiffSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose next sync call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            reports: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(Some(message.to_string()))),
        }
    }
}

impl DiffSink for MockDiffSink {
    async fn sync(&self, _config: &JobConfig, report: &DiffReport) -> Result<(), AppError> {
        if let Some(message) = self.fail_with.lock().unwrap().take() {
            return Err(AppError::RemoteApiError(message));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockArtifactSink
// ---------------------------------------------------------------------------

/// Mock artifact sink recording `(job_id, slot, artifact)` writes.
#[derive(Clone, Default)]
pub struct MockArtifactSink {
    pub written: Arc<Mutex<Vec<(String, String, Value)>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MockArtifactSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose next write fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            fail_with: Arc::new(Mutex::new(Some(message.to_string()))),
        }
    }
}

impl ArtifactSink for MockArtifactSink {
    async fn write(&self, job_id: &str, slot: &str, artifact: &Value) -> Result<(), AppError> {
        if let Some(message) = self.fail_with.lock().unwrap().take() {
            return Err(AppError::IoError(std::io::Error::other(message)));
        }
        self.written
            .lock()
            .unwrap()
            .push((job_id.to_string(), slot.to_string(), artifact.clone()));
        Ok(())
    }
}
