use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::JobConfig;
use crate::error::AppError;

/// A transformer turns a raw payload into a derived artifact.
///
/// Each invocation receives an owned deep clone of the payload, so
/// transformers can mutate freely without ever observing each other's edits.
/// The job config is passed along so a transformer can read its own options
/// from `config.transformers[name]`.
pub type TransformerFn = Arc<dyn Fn(Value, &JobConfig) -> Result<Value, AppError> + Send + Sync>;

/// Named registry of transformer functions, populated once at startup.
///
/// Job configs are validated against the registry at load time, so a job
/// referencing an unknown transformer fails fast instead of erroring on
/// every fetch.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, TransformerFn>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in transformers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("simplify_ask", simplify_ask);
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        transformer: impl Fn(Value, &JobConfig) -> Result<Value, AppError> + Send + Sync + 'static,
    ) {
        self.transformers.insert(name.into(), Arc::new(transformer));
    }

    pub fn get(&self, name: &str) -> Option<&TransformerFn> {
        self.transformers.get(name)
    }

    /// Invoke the named transformer. `None` means nothing is registered
    /// under that name.
    pub fn apply(
        &self,
        name: &str,
        payload: Value,
        config: &JobConfig,
    ) -> Option<Result<Value, AppError>> {
        let transformer: &dyn Fn(Value, &JobConfig) -> Result<Value, AppError> =
            self.transformers.get(name)?.as_ref();
        Some(transformer(payload, config))
    }

    /// Reject job configs that reference transformers nobody registered.
    pub fn validate(&self, config: &JobConfig) -> Result<(), AppError> {
        for name in config.transformers.keys() {
            if !self.transformers.contains_key(name) {
                return Err(AppError::ConfigError(format!(
                    "job '{}' references unknown transformer '{name}'",
                    config.id
                )));
            }
        }
        Ok(())
    }
}

/// Flatten the Semantic MediaWiki ASK result format into a concise map:
/// each `query.results.<page>` entry becomes a map of its printouts, and
/// printout arrays of `{fulltext: ...}` page objects collapse into plain
/// string arrays.
pub fn simplify_ask(payload: Value, _config: &JobConfig) -> Result<Value, AppError> {
    let results = payload
        .get("query")
        .and_then(|q| q.get("results"))
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::TransformError {
            name: "simplify_ask".into(),
            message: "payload has no query.results object".into(),
        })?;

    let mut simplified = Map::new();

    for (page_name, page) in results {
        let printouts = page
            .get("printouts")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut properties = Map::new();
        for (property_name, property) in printouts {
            properties.insert(property_name, simplify_property(property));
        }
        simplified.insert(page_name.clone(), Value::Object(properties));
    }

    Ok(Value::Object(simplified))
}

/// Collapse `[{fulltext: "..."}]` page-reference arrays to `["..."]`.
fn simplify_property(property: Value) -> Value {
    let Value::Array(elements) = &property else {
        return property;
    };

    let is_page_reference = elements
        .first()
        .and_then(|e| e.get("fulltext"))
        .is_some();
    if !is_page_reference {
        return property;
    }

    Value::Array(
        elements
            .iter()
            .filter_map(|e| e.get("fulltext").cloned())
            .collect(),
    )
}
