use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

use silo_core::config::{DiffConfig, JobConfig, JobSource, SearchIndexConfig};

/// Master settings from `settings.json`, also the per-job defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    /// Port the cache server listens on.
    pub port: u16,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub retry_delay_secs: u64,
    pub benchmark_size: usize,
    pub keep_raw: bool,
    pub pretty_json: bool,
    pub verbose: bool,
    /// When set, every artifact is mirrored to `<file_dir>/<job>/<slot>.json`.
    pub file_dir: Option<PathBuf>,
    pub search_index: Option<SearchIndexConfig>,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            port: 1337,
            interval_secs: 180,
            timeout_secs: 60,
            retry_delay_secs: 10,
            benchmark_size: 16,
            keep_raw: true,
            pretty_json: false,
            verbose: false,
            file_dir: None,
            search_index: None,
        }
    }
}

/// One job file (`<id>.json`), every field optional on top of the master
/// defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawJobSettings {
    /// Generic HTTP source.
    url: Option<String>,
    params: Option<IndexMap<String, String>>,

    /// ASK source: MediaWiki `api.php` endpoint plus a query, either inline
    /// or in a sibling `<id>.ask` file.
    endpoint: Option<String>,
    query: Option<String>,

    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
    retry_delay_secs: Option<u64>,
    transformers: Option<IndexMap<String, serde_json::Value>>,
    diff: Option<DiffConfig>,
    search_index: Option<SearchIndexConfig>,
    keep_raw: Option<bool>,
    benchmark_size: Option<usize>,
    verbose: Option<bool>,
}

/// A loaded project directory.
#[derive(Debug)]
pub struct Project {
    pub settings: MasterSettings,
    pub jobs: Vec<JobConfig>,
}

/// Read a project directory: `settings.json` for master settings, every
/// other `*.json` file as one job (file stem = job id), `*.ask` files as
/// query text for their sibling job file.
///
/// File stems are unique within a directory, which is what guarantees
/// unique job ids.
pub fn read(dir: &Path) -> Result<Project> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("could not read project directory {}", dir.display()))?;

    let mut job_files: Vec<(String, PathBuf)> = Vec::new();
    let mut ask_queries: HashMap<String, String> = HashMap::new();
    let mut settings = MasterSettings::default();

    for entry in entries {
        let path = entry?.path();
        let (Some(stem), Some(extension)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };

        match extension {
            "json" if stem == "settings" => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("could not read {}", path.display()))?;
                settings = serde_json::from_str(&content)
                    .with_context(|| format!("could not parse {}", path.display()))?;
            }
            "json" => job_files.push((stem.to_string(), path.clone())),
            "ask" => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("could not read {}", path.display()))?;
                ask_queries.insert(stem.to_string(), content);
            }
            _ => {}
        }
    }

    // Deterministic job order regardless of directory iteration order.
    job_files.sort();

    let mut jobs = Vec::new();
    for (id, path) in job_files {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let raw: RawJobSettings = serde_json::from_str(&content)
            .with_context(|| format!("could not parse {}", path.display()))?;
        jobs.push(build_job(id, raw, &settings, &ask_queries));
    }

    Ok(Project { settings, jobs })
}

/// Merge one job file over the master defaults into a JobConfig.
///
/// An unresolvable source (none configured, or both configured) yields
/// `source = None`; validation downstream turns that into an invalid,
/// never-scheduled job with a published status.
fn build_job(
    id: String,
    raw: RawJobSettings,
    settings: &MasterSettings,
    ask_queries: &HashMap<String, String>,
) -> JobConfig {
    let ask_query = raw
        .query
        .clone()
        .or_else(|| ask_queries.get(&id).cloned());

    let source = match (&raw.url, &raw.endpoint) {
        (Some(_), Some(_)) => {
            tracing::error!(
                job = %id,
                "Job configures both a URL and an ASK endpoint, exactly one is allowed"
            );
            None
        }
        (Some(url), None) => Some(JobSource::Http {
            url: url.clone(),
            params: raw.params.clone().unwrap_or_default(),
        }),
        (None, Some(endpoint)) => Some(JobSource::Ask {
            endpoint: endpoint.clone(),
            query: ask_query.unwrap_or_default(),
        }),
        (None, None) => None,
    };

    let mut job = JobConfig::new(id, source);
    job.interval_secs = raw.interval_secs.unwrap_or(settings.interval_secs);
    job.timeout_secs = raw.timeout_secs.unwrap_or(settings.timeout_secs);
    job.retry_delay_secs = raw.retry_delay_secs.unwrap_or(settings.retry_delay_secs);
    job.transformers = raw.transformers.unwrap_or_default();
    job.diff = raw.diff;
    job.search_index = raw.search_index.or_else(|| settings.search_index.clone());
    job.keep_raw = raw.keep_raw.unwrap_or(settings.keep_raw);
    job.benchmark_size = raw.benchmark_size.unwrap_or(settings.benchmark_size);
    job.verbose = raw.verbose.unwrap_or(settings.verbose);
    job
}
