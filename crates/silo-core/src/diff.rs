use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::config::JobConfig;
use crate::error::AppError;

/// Structural delta between two successive versions of an artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    /// True only on the very first diff for a job (nothing to compare against).
    pub init: bool,
    pub total_changes: usize,
    pub added: Vec<Value>,
    pub changed: Vec<Value>,
    pub removed: Vec<String>,
}

impl DiffReport {
    fn init_report() -> Self {
        Self {
            init: true,
            ..Self::default()
        }
    }

    /// Whether downstream sync targets should receive this report.
    pub fn is_material(&self) -> bool {
        self.init || self.total_changes > 0
    }
}

/// Compute the added/changed/removed sets between two artifact versions.
///
/// Array-shaped artifacts are indexed by the job's configured `id_field`;
/// plain keyed maps are compared directly. Anything else is not diffable.
pub fn diff(config: &JobConfig, old: Option<&Value>, new: &Value) -> Result<DiffReport, AppError> {
    let Some(old) = old else {
        return Ok(DiffReport::init_report());
    };

    let old_map = index_artifact(config, old)?;
    if old_map.is_empty() {
        return Ok(DiffReport::init_report());
    }
    let new_map = index_artifact(config, new)?;

    let mut report = DiffReport::default();

    for (id, old_value) in &old_map {
        match new_map.get(id) {
            None => report.removed.push(id.clone()),
            Some(new_value) if new_value != old_value => {
                report.changed.push((*new_value).clone());
            }
            Some(_) => {}
        }
    }

    for (id, new_value) in &new_map {
        if !old_map.contains_key(id) {
            report.added.push((*new_value).clone());
        }
    }

    report.total_changes = report.added.len() + report.changed.len() + report.removed.len();
    Ok(report)
}

/// Index an artifact into an id → element map for comparison.
fn index_artifact<'a>(
    config: &JobConfig,
    artifact: &'a Value,
) -> Result<BTreeMap<String, &'a Value>, AppError> {
    match artifact {
        Value::Array(elements) => {
            let id_field = config
                .diff
                .as_ref()
                .and_then(|d| d.id_field.as_deref())
                .ok_or_else(|| {
                    AppError::DiffConfigError(format!(
                        "job '{}' diffs an array-shaped artifact but configures no id field",
                        config.id
                    ))
                })?;

            let mut map = BTreeMap::new();
            for element in elements {
                match element.get(id_field).and_then(value_as_id) {
                    Some(id) => {
                        map.insert(id, element);
                    }
                    None => {
                        tracing::warn!(
                            job = %config.id,
                            %id_field,
                            "Skipping array element without id field"
                        );
                    }
                }
            }
            Ok(map)
        }
        Value::Object(entries) => Ok(entries.iter().map(|(k, v)| (k.clone(), v)).collect()),
        _ => Err(AppError::DiffConfigError(format!(
            "job '{}' artifact is neither array- nor map-shaped, cannot diff",
            config.id
        ))),
    }
}

/// Ids may be strings or numbers in the source data.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
