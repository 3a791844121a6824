//! Error types for devhooks-core operations.
//!
//! None of these are fatal to the host: callers at the hook boundary log and
//! swallow them. They exist so the library can say *what* went wrong.

use std::path::PathBuf;

/// All errors that can occur in devhooks-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    // ─────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session store unwritable: {path}: {details}")]
    StoreUnwritable { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Home directory not found")]
    HomeNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Sync Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Collector request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Collector rejected batch: HTTP {status}: {body}")]
    CollectorStatus { status: u16, body: String },

    #[error("Sync timed out after {0}s")]
    Timeout(u64),

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },
}

impl TrackerError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TrackerError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TrackerError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;

// Conversion for string error compatibility
impl From<TrackerError> for String {
    fn from(err: TrackerError) -> String {
        err.to_string()
    }
}
