use thiserror::Error;

/// Application-wide error types for silo.
#[derive(Error, Debug)]
pub enum AppError {
    /// Job configuration is broken (missing source, unknown transformer).
    /// Fatal for the job: it is marked invalid and never scheduled again.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request returned a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Connection-level failure (DNS, refused, reset).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request exceeded the per-job timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The remote API answered HTTP 200 but embedded an error object
    /// in the response body (ASK endpoints do this).
    #[error("Remote API error: {0}")]
    RemoteApiError(String),

    /// Response body was not valid JSON where JSON was required.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A transformer function failed for one job.
    #[error("Transformer '{name}' failed: {message}")]
    TransformError { name: String, message: String },

    /// Diffing was requested but the job lacks the configuration for it
    /// (array-shaped artifact without an id field).
    #[error("Diff configuration error: {0}")]
    DiffConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem operation failed (file sink).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Returns true if this error is transient and the fetch is worth retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::HttpError(_)
                | AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RemoteApiError(_)
                | AppError::ParseError(_)
        )
    }

    /// Returns true if this error permanently invalidates the job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors() {
        assert!(AppError::NetworkError("reset".into()).is_recoverable());
        assert!(AppError::Timeout(30).is_recoverable());
        assert!(AppError::HttpError("HTTP 503".into()).is_recoverable());
        assert!(AppError::RemoteApiError("query too long".into()).is_recoverable());
        assert!(AppError::ParseError("not json".into()).is_recoverable());
        assert!(!AppError::ConfigError("no source".into()).is_recoverable());
    }

    #[test]
    fn fatal_errors() {
        assert!(AppError::ConfigError("no source".into()).is_fatal());
        assert!(!AppError::Timeout(30).is_fatal());
        assert!(
            !AppError::TransformError {
                name: "simplify_ask".into(),
                message: "bad shape".into(),
            }
            .is_fatal()
        );
    }
}
