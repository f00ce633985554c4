use chrono::Utc;
use serde_json::Value;

use crate::config::JobConfig;
use crate::diff;
use crate::hash;
use crate::stats::JobState;
use crate::store::{Artifact, DataStore, RAW_SLOT, diff_slot};
use crate::traits::{ArtifactSink, DiffSink, FetchError, Fetched, Fetcher};
use crate::transform::TransformerRegistry;

/// What one fetch cycle ended with. The scheduler turns this into the next
/// wakeup (interval, retry delay, or stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch succeeded. `changed = false` means the payload hash matched the
    /// previous one and downstream stages were skipped.
    Completed { changed: bool },
    /// Recoverable fetch failure. `retry` reports the retry controller's
    /// decision for this failure.
    Failed { retry: bool },
    /// The job is permanently invalid; it must never be scheduled again.
    Invalidated,
}

/// Executes fetch cycles for a single job.
///
/// The runner exclusively owns the job's mutable state; the scheduler drives
/// it from one task per job, so no two cycles of the same job ever overlap.
pub struct JobRunner<F, D, A>
where
    F: Fetcher,
    D: DiffSink,
    A: ArtifactSink,
{
    config: JobConfig,
    state: JobState,
    store: DataStore,
    registry: TransformerRegistry,
    fetcher: F,
    diff_sink: Option<D>,
    artifact_sink: Option<A>,
}

impl<F, D, A> JobRunner<F, D, A>
where
    F: Fetcher,
    D: DiffSink,
    A: ArtifactSink,
{
    pub fn new(
        config: JobConfig,
        store: DataStore,
        registry: TransformerRegistry,
        fetcher: F,
        diff_sink: Option<D>,
        artifact_sink: Option<A>,
    ) -> Self {
        let state = JobState::new(&config);
        store.init_job(&config.id);
        store.publish_status(state.snapshot(&config.id));
        Self {
            config,
            state,
            store,
            registry,
            fetcher,
            diff_sink,
            artifact_sink,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Run one full fetch cycle: fetch → change detection → store → transform
    /// → diff → sinks.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        if !self.state.valid {
            return CycleOutcome::Invalidated;
        }

        match self.fetcher.fetch(&self.config).await {
            Ok(fetched) => self.on_success(fetched).await,
            Err(failure) => self.on_failure(failure),
        }
    }

    async fn on_success(&mut self, fetched: Fetched) -> CycleOutcome {
        let Fetched {
            payload,
            elapsed_ms,
        } = fetched;

        self.state.statistics.record_success(elapsed_ms);
        self.state.available = true;

        let (changed, content_hash) = hash::has_changed(self.state.last_hash.as_deref(), &payload);
        if !changed {
            tracing::debug!(
                job = %self.config.id,
                elapsed_ms,
                "Payload unchanged, skipping transform and diff"
            );
            self.publish_status();
            return CycleOutcome::Completed { changed: false };
        }

        tracing::info!(job = %self.config.id, elapsed_ms, "Fetched changed payload");
        self.state.last_hash = Some(content_hash);
        self.state.statistics.record_change();

        self.store_raw(&payload).await;
        self.apply_transformers(&payload).await;

        self.publish_status();
        CycleOutcome::Completed { changed: true }
    }

    fn on_failure(&mut self, failure: FetchError) -> CycleOutcome {
        let message = failure.error.to_string();
        tracing::warn!(
            job = %self.config.id,
            elapsed_ms = failure.elapsed_ms,
            error = %message,
            "Fetch failed"
        );

        // The retry decision compares against the *previous* failure time,
        // captured before this failure is recorded.
        let previous_error_at = self.state.statistics.last_error_timestamp;
        self.state.statistics.record_fetch_error(&message);

        if failure.error.is_fatal() {
            tracing::error!(
                job = %self.config.id,
                "Unrecoverable configuration error, disabling job"
            );
            self.state.invalidate();
            self.publish_status();
            return CycleOutcome::Invalidated;
        }

        let retry = self.should_retry(previous_error_at);
        self.publish_status();
        CycleOutcome::Failed { retry }
    }

    /// Retry policy: re-arm only when retries are enabled, the job is still
    /// valid, and the previous error (if any) is at least `retry_delay_secs`
    /// old. Suppresses retry storms when errors arrive faster than the delay.
    fn should_retry(&self, previous_error_at: Option<i64>) -> bool {
        if !self.config.retry_enabled() || !self.state.valid {
            return false;
        }
        match previous_error_at {
            None => true,
            Some(at) => Utc::now().timestamp() - at >= self.config.retry_delay_secs as i64,
        }
    }

    async fn store_raw(&mut self, payload: &Value) {
        if self.config.keep_raw {
            self.store
                .put(&self.config.id, RAW_SLOT, Artifact::Value(payload.clone()));
            self.write_artifact(RAW_SLOT, payload).await;
        } else if self.artifact_sink.is_some() {
            // Memory conservation: the payload lives in the file sink only.
            self.write_artifact(RAW_SLOT, payload).await;
            self.store.put(&self.config.id, RAW_SLOT, Artifact::Offloaded);
        } else {
            tracing::warn!(
                job = %self.config.id,
                "keep_raw is disabled but no file sink is configured, keeping payload in memory"
            );
            self.store
                .put(&self.config.id, RAW_SLOT, Artifact::Value(payload.clone()));
        }
    }

    /// Apply the job's transformers in configuration order. Each one gets a
    /// fresh clone of the payload and fails in isolation.
    async fn apply_transformers(&mut self, payload: &Value) {
        let names: Vec<String> = self.config.transformers.keys().cloned().collect();

        for name in names {
            let Some(result) = self.registry.apply(&name, payload.clone(), &self.config) else {
                tracing::error!(
                    job = %self.config.id,
                    transformer = %name,
                    "No transformer registered under this name, skipping"
                );
                self.state
                    .statistics
                    .record_side_error(&format!("unknown transformer '{name}'"));
                continue;
            };

            match result {
                Ok(artifact) => {
                    self.store
                        .put(&self.config.id, &name, Artifact::Value(artifact.clone()));
                    self.run_diff_stage(&name, &artifact).await;
                    self.write_artifact(&name, &artifact).await;
                    self.state.last_artifacts.insert(name.clone(), artifact);
                    if self.config.verbose {
                        tracing::debug!(job = %self.config.id, transformer = %name, "Applied transformer");
                    }
                }
                Err(error) => {
                    tracing::error!(
                        job = %self.config.id,
                        transformer = %name,
                        error = %error,
                        "Transformer failed"
                    );
                    self.state.statistics.record_side_error(&error.to_string());
                }
            }
        }
    }

    async fn run_diff_stage(&mut self, name: &str, artifact: &Value) {
        if self.config.diff.is_none() {
            return;
        }

        let previous = self.state.last_artifacts.get(name);
        let report = match diff::diff(&self.config, previous, artifact) {
            Ok(report) => report,
            Err(error) => {
                tracing::error!(
                    job = %self.config.id,
                    transformer = %name,
                    error = %error,
                    "Diff skipped"
                );
                self.state.statistics.record_side_error(&error.to_string());
                return;
            }
        };

        tracing::debug!(
            job = %self.config.id,
            transformer = %name,
            init = report.init,
            total_changes = report.total_changes,
            "Computed diff"
        );

        match serde_json::to_value(&report) {
            Ok(value) => {
                self.store
                    .put(&self.config.id, &diff_slot(name), Artifact::Value(value));
            }
            Err(error) => {
                tracing::error!(job = %self.config.id, error = %error, "Could not serialize diff report");
            }
        }

        if report.is_material() {
            self.sync_diff(&report).await;
        }
    }

    async fn sync_diff(&mut self, report: &diff::DiffReport) {
        let Some(sink) = self.diff_sink.clone() else {
            return;
        };
        if let Err(error) = sink.sync(&self.config, report).await {
            tracing::warn!(job = %self.config.id, error = %error, "Diff sync failed");
            self.state.statistics.record_side_error(&error.to_string());
        }
    }

    async fn write_artifact(&mut self, slot: &str, artifact: &Value) {
        let Some(sink) = self.artifact_sink.clone() else {
            return;
        };
        if let Err(error) = sink.write(&self.config.id, slot, artifact).await {
            tracing::warn!(job = %self.config.id, slot = %slot, error = %error, "File sink write failed");
            self.state.statistics.record_side_error(&error.to_string());
        }
    }

    fn publish_status(&self) {
        self.store.publish_status(self.state.snapshot(&self.config.id));
    }
}
