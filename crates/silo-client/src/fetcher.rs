use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::Value;

use silo_core::config::{JobConfig, JobSource};
use silo_core::error::AppError;
use silo_core::traits::{FetchError, Fetched, Fetcher};

/// HTTP fetcher using reqwest.
///
/// Handles both job source variants: plain GETs with query parameters, and
/// Semantic MediaWiki ASK queries. Each request uses the job's own timeout;
/// failures carry the elapsed time up to the point of failure so the
/// statistics stay meaningful.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("silo/", env!("CARGO_PKG_VERSION"), " (API cache)"))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, config: &JobConfig) -> Result<Fetched, FetchError> {
        let started = Instant::now();

        let result = match &config.source {
            None => Err(AppError::ConfigError(format!(
                "job '{}' has no source to fetch from",
                config.id
            ))),
            Some(JobSource::Http { url, params }) => {
                self.fetch_generic(config, url, params).await
            }
            Some(JobSource::Ask { endpoint, query }) => {
                self.fetch_ask(config, endpoint, query).await
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(payload) => Ok(Fetched {
                payload,
                elapsed_ms,
            }),
            Err(error) => Err(FetchError::new(error, elapsed_ms)),
        }
    }
}

impl HttpFetcher {
    /// Plain GET. The body is JSON-parsed when possible and kept as a raw
    /// string otherwise; a non-JSON body is not an error here.
    async fn fetch_generic(
        &self,
        config: &JobConfig,
        url: &str,
        params: &indexmap::IndexMap<String, String>,
    ) -> Result<Value, AppError> {
        let body = self
            .get_body(config, self.client.get(url).query(params), url)
            .await?;
        Ok(parse_generic_body(body))
    }

    /// ASK query against a MediaWiki `api.php` endpoint. JSON is mandatory
    /// here, and an embedded `error` object fails the fetch even on HTTP 200.
    async fn fetch_ask(
        &self,
        config: &JobConfig,
        endpoint: &str,
        query: &str,
    ) -> Result<Value, AppError> {
        let stripped = strip_whitespace(query);
        let request = self.client.get(endpoint).query(&[
            ("action", "ask"),
            ("query", stripped.as_str()),
            ("format", "json"),
        ]);
        let body = self.get_body(config, request, endpoint).await?;
        parse_ask_body(&body)
    }

    async fn get_body(
        &self,
        config: &JobConfig,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<String, AppError> {
        let response = request
            .timeout(Duration::from_secs(config.timeout_secs))
            .send()
            .await
            .map_err(|e| classify_transport_error(e, config.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

fn classify_transport_error(error: reqwest::Error, timeout_secs: u64) -> AppError {
    if error.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if error.is_connect() {
        AppError::NetworkError(format!("Connection failed: {error}"))
    } else {
        AppError::HttpError(error.to_string())
    }
}

/// ASK endpoints reject queries containing whitespace padding; project files
/// are written multi-line for readability, so collapse before sending.
fn strip_whitespace(query: &str) -> String {
    query.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_generic_body(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

fn parse_ask_body(body: &str) -> Result<Value, AppError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("ASK response is not valid JSON: {e}")))?;

    if let Some(error) = payload.get("error") {
        return Err(AppError::RemoteApiError(error.to_string()));
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_whitespace_collapses_multiline_queries() {
        let query = "[[Category: Person]]\n |?Has name\n |?Knows\n";
        assert_eq!(strip_whitespace(query), "[[Category:Person]]|?Hasname|?Knows");
    }

    #[test]
    fn generic_body_parses_json() {
        assert_eq!(
            parse_generic_body(r#"{"a": 1}"#.to_string()),
            json!({"a": 1})
        );
    }

    #[test]
    fn generic_body_falls_back_to_raw_string() {
        assert_eq!(
            parse_generic_body("<html>not json</html>".to_string()),
            json!("<html>not json</html>")
        );
    }

    #[test]
    fn ask_body_requires_json() {
        let err = parse_ask_body("<html>gateway error</html>").unwrap_err();
        assert!(matches!(err, AppError::ParseError(_)));
    }

    #[test]
    fn ask_body_with_embedded_error_is_a_remote_error() {
        let body = r#"{"error": {"code": "badquery", "info": "unbalanced brackets"}}"#;
        let err = parse_ask_body(body).unwrap_err();
        assert!(matches!(err, AppError::RemoteApiError(_)));
        assert!(err.to_string().contains("badquery"));
    }

    #[test]
    fn ask_body_passes_through_results() {
        let body = r#"{"query": {"results": {}}}"#;
        assert_eq!(
            parse_ask_body(body).unwrap(),
            json!({"query": {"results": {}}})
        );
    }
}
