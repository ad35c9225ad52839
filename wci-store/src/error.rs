/// Error types for the persistence tiers and the run lease
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure reading or writing a persistence tier
#[derive(Error, Debug)]
pub enum StoreError {
    /// Local filesystem access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request to the object store failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Object store answered with a non-success status
    #[error("object store returned {status} for {key}")]
    HttpStatus { status: u16, key: String },

    /// Stored document could not be encoded or decoded
    #[error("failed to serialize {key}: {source}")]
    Serde {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Object key escapes the store root or is empty
    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure acquiring the run lease
#[derive(Error, Debug)]
pub enum LeaseError {
    /// Another live run holds the lease
    #[error("run lease held by {holder} until {expires_at}")]
    Held {
        holder: String,
        expires_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Type alias for Results using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
