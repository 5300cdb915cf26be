//! Error types for dataset-dl
//!
//! Every failure the download engine can produce is a variant of [`Error`]. Whether a
//! failure is worth retrying is decided in one place, the [`IsRetryable`] impl in
//! [`crate::retry`], so callers never carry a separate "permanent" flag around.
//!
//! [`IsRetryable`]: crate::retry::IsRetryable

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dataset-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dataset-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources[2].log_url")
        key: Option<String>,
    },

    /// The HTTP request could not be built or sent
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote answered with a non-2xx status
    #[error("URL {url} gave response code {status}")]
    HttpStatus {
        /// The URL that was requested
        url: String,
        /// The status returned by the server
        status: reqwest::StatusCode,
    },

    /// Streaming the response body into the store failed
    #[error("failed to copy body into {name}: {reason}")]
    BodyCopy {
        /// Stored artifact name being written
        name: String,
        /// Underlying failure
        reason: String,
    },

    /// A download attempt exceeded its deadline
    #[error("download of {url} exceeded deadline of {deadline:?}")]
    Timeout {
        /// The URL that was being fetched
        url: String,
        /// The configured per-attempt deadline
        deadline: Duration,
    },

    /// A naming or scope pattern did not match its input
    #[error("pattern {pattern} does not match {input}")]
    MalformedSource {
        /// The string the pattern was applied to
        input: String,
        /// The pattern source
        pattern: String,
    },

    /// Content store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A confirmed duplicate could not be removed
    #[error("could not delete duplicate {name}: {source}")]
    DuplicateDelete {
        /// The duplicate artifact
        name: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// A new artifact could not be copied to its canonical alias
    #[error("could not copy {name} to {alias}: {source}")]
    AliasCopy {
        /// The freshly stored artifact
        name: String,
        /// The canonical alias path
        alias: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// The sequenced source log could not be retrieved
    #[error("source log {url}: {reason}")]
    SourceLog {
        /// The log URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Publishing a cycle notification failed
    #[error("notification error: {0}")]
    Notify(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// The operation was cancelled by shutdown
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors surfaced by a [`ContentStore`](crate::store::ContentStore) implementation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named artifact does not exist
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Filesystem-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_message_names_url_and_code() {
        let err = Error::HttpStatus {
            url: "http://example.com/file.gz".to_string(),
            status: reqwest::StatusCode::NOT_FOUND,
        };
        let msg = err.to_string();
        assert!(msg.contains("http://example.com/file.gz"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn duplicate_delete_keeps_store_source() {
        let err = Error::DuplicateDelete {
            name: "Maxmind/2024/01/02/x.tar.gz".to_string(),
            source: StoreError::Backend("bucket unavailable".to_string()),
        };
        let source = std::error::Error::source(&err).expect("source should be set");
        assert_eq!(source.to_string(), "bucket unavailable");
    }

    #[test]
    fn config_helper_sets_key() {
        match Error::config("bad regex", "sources[0].dedup_pattern") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("sources[0].dedup_pattern"));
                assert_eq!(message, "bad regex");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
