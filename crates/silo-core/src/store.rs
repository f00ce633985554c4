use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::stats::JobStatusReport;

/// Store slot holding the raw payload.
pub const RAW_SLOT: &str = "raw";

/// Store slot holding the diff report for a transformer's artifact.
pub fn diff_slot(transformer: &str) -> String {
    format!("{transformer}-diff")
}

/// One cached artifact.
///
/// `Offloaded` marks an artifact that exists but was persisted to the file
/// sink instead of being held in memory; it serializes as boolean `true`.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Value(Value),
    Offloaded,
}

impl Artifact {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Artifact::Value(v) => Some(v),
            Artifact::Offloaded => None,
        }
    }

    pub fn is_offloaded(&self) -> bool {
        matches!(self, Artifact::Offloaded)
    }
}

impl Serialize for Artifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Artifact::Value(v) => v.serialize(serializer),
            Artifact::Offloaded => serializer.serialize_bool(true),
        }
    }
}

/// All artifacts of one job, keyed by slot name (`raw`, transformer names,
/// `<transformer>-diff`).
pub type JobRecord = HashMap<String, Artifact>;

/// In-memory cache shared between the pipeline (writer) and the serving
/// layer (reader).
///
/// Each job's runner writes only to its own record, so writers never
/// conflict; readers get eventually-consistent clones with no transactional
/// guarantee across keys. Locks are held only for the map operation itself,
/// never across an await point.
#[derive(Clone, Default)]
pub struct DataStore {
    records: Arc<RwLock<HashMap<String, JobRecord>>>,
    statuses: Arc<RwLock<HashMap<String, JobStatusReport>>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the (empty) record for a job so the serving layer can list it
    /// before the first fetch completes.
    pub fn init_job(&self, job_id: &str) {
        self.records
            .write()
            .expect("store lock poisoned")
            .entry(job_id.to_string())
            .or_default();
    }

    pub fn put(&self, job_id: &str, slot: &str, artifact: Artifact) {
        self.records
            .write()
            .expect("store lock poisoned")
            .entry(job_id.to_string())
            .or_default()
            .insert(slot.to_string(), artifact);
    }

    pub fn get(&self, job_id: &str, slot: &str) -> Option<Artifact> {
        self.records
            .read()
            .expect("store lock poisoned")
            .get(job_id)
            .and_then(|record| record.get(slot))
            .cloned()
    }

    pub fn record(&self, job_id: &str) -> Option<JobRecord> {
        self.records
            .read()
            .expect("store lock poisoned")
            .get(job_id)
            .cloned()
    }

    /// All known job ids, sorted for stable listings.
    pub fn jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .read()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn publish_status(&self, report: JobStatusReport) {
        self.statuses
            .write()
            .expect("store lock poisoned")
            .insert(report.id.clone(), report);
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatusReport> {
        self.statuses
            .read()
            .expect("store lock poisoned")
            .get(job_id)
            .cloned()
    }

    pub fn statuses(&self) -> Vec<JobStatusReport> {
        let mut reports: Vec<JobStatusReport> = self
            .statuses
            .read()
            .expect("store lock poisoned")
            .values()
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_and_get_roundtrip() {
        let store = DataStore::new();
        store.put("wiki", RAW_SLOT, Artifact::Value(json!({"a": 1})));
        let artifact = store.get("wiki", RAW_SLOT).unwrap();
        assert_eq!(artifact.as_value(), Some(&json!({"a": 1})));
        assert!(store.get("wiki", "missing").is_none());
        assert!(store.get("other", RAW_SLOT).is_none());
    }

    #[test]
    fn offloaded_serializes_as_true() {
        let serialized = serde_json::to_value(Artifact::Offloaded).unwrap();
        assert_eq!(serialized, json!(true));
        let serialized = serde_json::to_value(Artifact::Value(json!([1, 2]))).unwrap();
        assert_eq!(serialized, json!([1, 2]));
    }

    #[test]
    fn init_job_makes_record_listable() {
        let store = DataStore::new();
        store.init_job("b-job");
        store.init_job("a-job");
        assert_eq!(store.jobs(), vec!["a-job".to_string(), "b-job".to_string()]);
        assert!(store.record("a-job").unwrap().is_empty());
    }

    #[test]
    fn jobs_write_to_independent_records() {
        let store = DataStore::new();
        store.put("one", RAW_SLOT, Artifact::Value(json!(1)));
        store.put("two", RAW_SLOT, Artifact::Value(json!(2)));
        store.put("one", "simplify_ask", Artifact::Offloaded);
        assert_eq!(store.record("one").unwrap().len(), 2);
        assert_eq!(store.record("two").unwrap().len(), 1);
    }

    #[test]
    fn diff_slot_naming() {
        assert_eq!(diff_slot("simplify_ask"), "simplify_ask-diff");
    }
}
