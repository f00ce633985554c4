use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::runner::{CycleOutcome, JobRunner};
use crate::traits::{ArtifactSink, DiffSink, Fetcher};

/// Drives periodic fetches for all jobs.
///
/// Owns one cancellable task per job instead of self-rescheduling timer
/// closures: each entry pairs the task handle with a token the controller
/// can cancel, so an invalidated job can never fire again.
#[derive(Default)]
pub struct Scheduler {
    jobs: HashMap<String, JobHandle>,
}

struct JobHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the runner task for a job. The task runs the first fetch
    /// immediately and then re-arms itself per interval/retry policy.
    pub fn spawn<F, D, A>(&mut self, runner: JobRunner<F, D, A>)
    where
        F: Fetcher + 'static,
        D: DiffSink + 'static,
        A: ArtifactSink + 'static,
    {
        let id = runner.config().id.clone();
        let cancel = CancellationToken::new();
        let span = tracing::info_span!("job", id = %id);
        let task = tokio::spawn(drive(runner, cancel.clone()).instrument(span));

        if let Some(previous) = self.jobs.insert(id.clone(), JobHandle { cancel, task }) {
            tracing::warn!(job = %id, "Replacing an already scheduled job");
            previous.cancel.cancel();
        }
    }

    pub fn is_scheduled(&self, job_id: &str) -> bool {
        self.jobs
            .get(job_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Cancel one job's pending timer and stop its task.
    pub fn cancel(&mut self, job_id: &str) {
        if let Some(handle) = self.jobs.remove(job_id) {
            handle.cancel.cancel();
        }
    }

    /// Cancel all jobs and wait for their tasks to wind down.
    pub async fn shutdown(mut self) {
        for handle in self.jobs.values() {
            handle.cancel.cancel();
        }
        for (id, handle) in self.jobs.drain() {
            if handle.task.await.is_err() {
                tracing::warn!(job = %id, "Job task panicked before shutdown");
            }
        }
    }

    /// Wait for every job task to end on its own (run-once jobs). Used by
    /// tests and one-shot CLI runs; long-running setups use `shutdown`.
    pub async fn join_all(mut self) {
        for (id, handle) in self.jobs.drain() {
            if handle.task.await.is_err() {
                tracing::warn!(job = %id, "Job task panicked");
            }
        }
    }
}

/// Per-job scheduling loop: run a cycle, then sleep until the next one.
///
/// - Success: sleep `interval_secs`; interval 0 means run-once, stop.
/// - Recoverable failure: sleep `retry_delay_secs` when the retry controller
///   armed a retry, otherwise fall back to the interval.
/// - Invalidated: stop immediately; nothing is left armed.
async fn drive<F, D, A>(mut runner: JobRunner<F, D, A>, cancel: CancellationToken)
where
    F: Fetcher,
    D: DiffSink,
    A: ArtifactSink,
{
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let outcome = runner.run_cycle().await;
        let interval = runner.config().interval_secs;

        let delay = match outcome {
            CycleOutcome::Invalidated => break,
            CycleOutcome::Completed { .. } => {
                if interval == 0 {
                    tracing::debug!("Run-once job finished");
                    break;
                }
                Duration::from_secs(interval)
            }
            CycleOutcome::Failed { retry } => {
                if retry {
                    tracing::info!(
                        retry_delay_secs = runner.config().retry_delay_secs,
                        "Re-arming retry after failure"
                    );
                    Duration::from_secs(runner.config().retry_delay_secs)
                } else if interval > 0 {
                    Duration::from_secs(interval)
                } else {
                    tracing::debug!("Run-once job failed without retry, stopping");
                    break;
                }
            }
        };

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::{JobConfig, JobSource};
    use crate::error::AppError;
    use crate::store::DataStore;
    use crate::testutil::MockFetcher;
    use crate::traits::{NullArtifactSink, NullDiffSink};
    use crate::transform::TransformerRegistry;

    fn test_config(id: &str, interval_secs: u64) -> JobConfig {
        let mut config = JobConfig::new(
            id,
            Some(JobSource::Http {
                url: "https://example.org/data.json".into(),
                params: indexmap::IndexMap::new(),
            }),
        );
        config.interval_secs = interval_secs;
        config.retry_delay_secs = 10;
        config
    }

    fn make_runner(
        config: JobConfig,
        fetcher: MockFetcher,
        store: &DataStore,
    ) -> JobRunner<MockFetcher, NullDiffSink, NullArtifactSink> {
        JobRunner::new(
            config,
            store.clone(),
            TransformerRegistry::new(),
            fetcher,
            None,
            None,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_job_fetches_exactly_once() {
        let store = DataStore::new();
        let fetcher = MockFetcher::with_payloads(vec![json!({"a": 1})]);
        let calls = fetcher.calls.clone();

        let mut scheduler = Scheduler::new();
        scheduler.spawn(make_runner(test_config("once", 0), fetcher, &store));
        scheduler.join_all().await;

        // Nothing left armed: advancing time produces no further fetches.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_job_refetches_on_schedule() {
        let store = DataStore::new();
        let fetcher = MockFetcher::with_payloads(vec![json!({"a": 1})]);
        let calls = fetcher.calls.clone();

        let mut scheduler = Scheduler::new();
        scheduler.spawn(make_runner(test_config("steady", 30), fetcher, &store));

        tokio::time::sleep(Duration::from_secs(95)).await;
        // Initial fetch plus ticks at 30s, 60s, 90s.
        assert_eq!(*calls.lock().unwrap(), 4);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_a_scheduled_job() {
        let store = DataStore::new();
        let fetcher = MockFetcher::with_payloads(vec![json!({"a": 1})]);
        let calls = fetcher.calls.clone();

        let mut scheduler = Scheduler::new();
        scheduler.spawn(make_runner(test_config("cancelled", 30), fetcher, &store));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*calls.lock().unwrap(), 1);
        scheduler.cancel("cancelled");

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(!scheduler.is_scheduled("cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_job_is_never_rescheduled() {
        let store = DataStore::new();
        let fetcher =
            MockFetcher::with_results(vec![Err(AppError::ConfigError("no source".into()))]);
        let calls = fetcher.calls.clone();

        let mut scheduler = Scheduler::new();
        scheduler.spawn(make_runner(test_config("doomed", 30), fetcher, &store));
        scheduler.join_all().await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(*calls.lock().unwrap(), 1);
        assert!(!store.status("doomed").unwrap().valid);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_uses_retry_delay_then_interval() {
        let store = DataStore::new();
        // First fetch fails, the armed retry succeeds, then the interval takes over.
        let fetcher = MockFetcher::with_results(vec![
            Err(AppError::Timeout(5)),
            Ok(json!({"a": 1})),
        ]);
        let calls = fetcher.calls.clone();

        let mut scheduler = Scheduler::new();
        scheduler.spawn(make_runner(test_config("recovering", 60), fetcher, &store));

        // Retry delay is 10s: the second attempt happens there, not at 60s.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(store.status("recovering").unwrap().available);

        scheduler.shutdown().await;
    }
}
