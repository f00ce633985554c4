use std::future::Future;

use serde_json::Value;

use crate::config::JobConfig;
use crate::diff::DiffReport;
use crate::error::AppError;

/// A successfully fetched payload plus how long the request took.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub payload: Value,
    pub elapsed_ms: u64,
}

/// A failed fetch, carrying the time spent up to the point of failure.
#[derive(Debug)]
pub struct FetchError {
    pub error: AppError,
    pub elapsed_ms: u64,
}

impl FetchError {
    pub fn new(error: AppError, elapsed_ms: u64) -> Self {
        Self { error, elapsed_ms }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (after {}ms)", self.error, self.elapsed_ms)
    }
}

/// Performs one HTTP request for a job, generic or ASK depending on the
/// job's source descriptor.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, config: &JobConfig)
    -> impl Future<Output = Result<Fetched, FetchError>> + Send;
}

/// Receives material diff reports for external syncing (e.g. a search index).
///
/// Implementations own their connection lifecycle; the pipeline only decides
/// whether to call them (`report.is_material()`) and what to pass.
pub trait DiffSink: Send + Sync + Clone {
    fn sync(
        &self,
        config: &JobConfig,
        report: &DiffReport,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Serializes artifacts to an external location (the file sink).
///
/// Writes are fire-and-forget from the pipeline's point of view: errors are
/// logged by the caller but never fail a fetch cycle.
pub trait ArtifactSink: Send + Sync + Clone {
    fn write(
        &self,
        job_id: &str,
        slot: &str,
        artifact: &Value,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// No-op diff sink for jobs without an external index target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiffSink;

impl DiffSink for NullDiffSink {
    async fn sync(&self, _config: &JobConfig, _report: &DiffReport) -> Result<(), AppError> {
        Ok(())
    }
}

/// No-op artifact sink for setups without a file target.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullArtifactSink;

impl ArtifactSink for NullArtifactSink {
    async fn write(&self, _job_id: &str, _slot: &str, _artifact: &Value) -> Result<(), AppError> {
        Ok(())
    }
}
