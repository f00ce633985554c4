use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Where a job's data comes from. Exactly one variant per job; a job whose
/// project file configures neither ends up with `JobConfig::source = None`
/// and is rejected by [`JobConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    /// Plain HTTP GET against a URL, with optional query-string parameters.
    Http {
        url: String,
        #[serde(default)]
        params: IndexMap<String, String>,
    },
    /// Semantic MediaWiki ASK query against an `api.php` endpoint.
    Ask { endpoint: String, query: String },
}

/// How array-shaped artifacts are keyed when computing structural diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Field holding the unique id of an array element. Required for
    /// array-shaped artifacts; ignored for plain keyed maps.
    pub id_field: Option<String>,
}

/// Remote search index this job syncs its diffs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    /// Base URL of the Elasticsearch-compatible server, e.g. `http://localhost:9200`.
    pub url: String,
    /// Index settings/mappings sent on index creation. Server defaults apply when absent.
    #[serde(default)]
    pub index_settings: Option<serde_json::Value>,
}

/// Immutable per-job configuration, produced once at startup by the project
/// loader. Runtime state (validity, availability, statistics) lives in
/// [`crate::stats::JobState`], keyed by `id`; config is never mutated after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique, stable job id (the project file stem).
    pub id: String,

    pub source: Option<JobSource>,

    /// Seconds between fetches. 0 = run exactly once.
    pub interval_secs: u64,

    /// Per-request network timeout in seconds.
    pub timeout_secs: u64,

    /// Delay before retrying a failed fetch. 0 disables retries.
    pub retry_delay_secs: u64,

    /// Transformer name → options, applied in insertion order.
    #[serde(default)]
    pub transformers: IndexMap<String, serde_json::Value>,

    /// Enables the diff engine for this job's transformed artifacts.
    #[serde(default)]
    pub diff: Option<DiffConfig>,

    #[serde(default)]
    pub search_index: Option<SearchIndexConfig>,

    /// When false, the raw payload is written to the file sink and the store
    /// keeps only an offloaded marker (memory conservation).
    #[serde(default = "default_true")]
    pub keep_raw: bool,

    /// Cap on the benchmark ring buffer (last N fetch durations).
    #[serde(default = "default_benchmark_size")]
    pub benchmark_size: usize,

    #[serde(default)]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

fn default_benchmark_size() -> usize {
    16
}

impl JobConfig {
    /// Minimal config used as a starting point by the loader and by tests.
    pub fn new(id: impl Into<String>, source: Option<JobSource>) -> Self {
        Self {
            id: id.into(),
            source,
            interval_secs: 180,
            timeout_secs: 60,
            retry_delay_secs: 10,
            transformers: IndexMap::new(),
            diff: None,
            search_index: None,
            keep_raw: true,
            benchmark_size: default_benchmark_size(),
            verbose: false,
        }
    }

    /// Check the parts of the config that would make the job unrunnable.
    ///
    /// A failure here is permanent: the job is published as invalid and
    /// never scheduled.
    pub fn validate(&self) -> Result<(), AppError> {
        match &self.source {
            None => {
                return Err(AppError::ConfigError(format!(
                    "job '{}' has no source (configure either a URL or an ASK endpoint + query)",
                    self.id
                )));
            }
            Some(JobSource::Http { url, .. }) if url.trim().is_empty() => {
                return Err(AppError::ConfigError(format!(
                    "job '{}' has an empty source URL",
                    self.id
                )));
            }
            Some(JobSource::Ask { endpoint, query }) => {
                if endpoint.trim().is_empty() {
                    return Err(AppError::ConfigError(format!(
                        "job '{}' has no API endpoint for its ASK query",
                        self.id
                    )));
                }
                if query.trim().is_empty() {
                    return Err(AppError::ConfigError(format!(
                        "job '{}' has an empty ASK query",
                        self.id
                    )));
                }
            }
            Some(JobSource::Http { .. }) => {}
        }
        Ok(())
    }

    pub fn runs_once(&self) -> bool {
        self.interval_secs == 0
    }

    pub fn retry_enabled(&self) -> bool {
        self.retry_delay_secs > 0
    }
}
