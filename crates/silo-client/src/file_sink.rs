use std::path::PathBuf;

use serde_json::Value;

use silo_core::error::AppError;
use silo_core::traits::ArtifactSink;

/// Writes artifacts to `<dir>/<job-id>/<slot>.json`.
///
/// Serves two purposes: mirroring the cache to disk for static serving, and
/// holding the payload of jobs that run with `keep_raw = false`.
#[derive(Clone)]
pub struct FileSink {
    dir: PathBuf,
    pretty: bool,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            dir: dir.into(),
            pretty,
        }
    }
}

impl ArtifactSink for FileSink {
    async fn write(&self, job_id: &str, slot: &str, artifact: &Value) -> Result<(), AppError> {
        let job_dir = self.dir.join(job_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        let body = if self.pretty {
            serde_json::to_string_pretty(artifact)?
        } else {
            artifact.to_string()
        };

        tokio::fs::write(job_dir.join(format!("{slot}.json")), body).await?;
        Ok(())
    }
}
