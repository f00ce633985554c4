use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use url::Url;

use silo_core::config::JobConfig;
use silo_core::diff::DiffReport;
use silo_core::error::AppError;
use silo_core::traits::DiffSink;

/// Syncs diff reports to an Elasticsearch-compatible search index over its
/// bulk HTTP protocol.
///
/// One index per job (`silo_<job-id>`). The index is dropped and recreated
/// on the init report, so restarts always start from a full sync.
#[derive(Clone)]
pub struct SearchIndexSink {
    client: Client,
}

impl SearchIndexSink {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("silo/", env!("CARGO_PKG_VERSION"), " (API cache)"))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { client })
    }

    async fn recreate_index(
        &self,
        base: &Url,
        index: &str,
        index_settings: Option<&Value>,
    ) -> Result<(), AppError> {
        let index_url = join(base, index)?;

        // A missing index on delete is fine; anything else is logged by the caller.
        let delete = self.client.delete(index_url.clone()).send().await;
        if let Err(error) = delete {
            tracing::debug!(%index, %error, "Search index delete failed");
        }

        let body = index_settings.cloned().unwrap_or_else(|| json!({}));
        let response = self
            .client
            .put(index_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Search index create failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} creating search index {index}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

impl DiffSink for SearchIndexSink {
    async fn sync(&self, config: &JobConfig, report: &DiffReport) -> Result<(), AppError> {
        let Some(search) = &config.search_index else {
            return Ok(());
        };

        let base = Url::parse(&search.url)
            .map_err(|e| AppError::ConfigError(format!("invalid search index URL: {e}")))?;
        let index = index_name(&config.id);

        if report.init {
            self.recreate_index(&base, &index, search.index_settings.as_ref())
                .await?;
        }

        let body = bulk_body(config, &index, report);
        if body.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(join(&base, "_bulk")?)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::NetworkError(format!("Search index bulk sync failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} from search index bulk endpoint",
                response.status().as_u16()
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("bulk response is not valid JSON: {e}")))?;
        if result.get("errors").and_then(Value::as_bool) == Some(true) {
            return Err(AppError::RemoteApiError(
                "search index rejected part of the bulk sync".into(),
            ));
        }

        tracing::debug!(
            job = %config.id,
            %index,
            added = report.added.len(),
            changed = report.changed.len(),
            removed = report.removed.len(),
            "Synced diff to search index"
        );
        Ok(())
    }
}

fn index_name(job_id: &str) -> String {
    format!("silo_{}", job_id.to_lowercase())
}

fn join(base: &Url, path: &str) -> Result<Url, AppError> {
    base.join(path)
        .map_err(|e| AppError::ConfigError(format!("invalid search index URL path: {e}")))
}

/// Build the newline-delimited bulk payload for one diff report.
///
/// Documents are addressed by the job's diff id field; elements without it
/// cannot be addressed in the index and are skipped.
fn bulk_body(config: &JobConfig, index: &str, report: &DiffReport) -> String {
    let id_field = config.diff.as_ref().and_then(|d| d.id_field.as_deref());
    let mut lines = Vec::new();

    for id in &report.removed {
        lines.push(json!({"delete": {"_index": index, "_id": id}}).to_string());
    }

    for document in &report.added {
        if let Some(id) = document_id(config, id_field, document) {
            lines.push(json!({"create": {"_index": index, "_id": id}}).to_string());
            lines.push(document.to_string());
        }
    }

    for document in &report.changed {
        if let Some(id) = document_id(config, id_field, document) {
            lines.push(json!({"index": {"_index": index, "_id": id}}).to_string());
            lines.push(document.to_string());
        }
    }

    if lines.is_empty() {
        String::new()
    } else {
        let mut body = lines.join("\n");
        body.push('\n');
        body
    }
}

fn document_id(config: &JobConfig, id_field: Option<&str>, document: &Value) -> Option<String> {
    let id = id_field.and_then(|field| match document.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    });
    if id.is_none() {
        tracing::warn!(
            job = %config.id,
            "Skipping search index document without an id field"
        );
    }
    id
}
