//! Resource-store error types.
//!
//! These are internal currency. The public store API catches them at the
//! boundary, writes them to the error log, and reports plain
//! `false`/`None` returns — callers never see a structured error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, rebuilding, or writing resource data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failure.
    #[error("failed to {operation} {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The group archive could not be read or rebuilt.
    #[error("group archive error at {path}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// A layer file or archive entry held malformed JSON.
    #[error("malformed JSON in {origin}")]
    MalformedJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// A resource document was not a JSON object at the top level.
    #[error("resource {origin} is not a JSON object")]
    NotAnObject { origin: String },

    /// A document could not be serialized for writing.
    #[error("failed to serialize {origin}")]
    Serialize {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// No group archive is active although the operation requires one.
    #[error("no active group archive")]
    NoActiveArchive,
}

/// Result type alias for store-internal operations.
pub type Result<T> = std::result::Result<T, StoreError>;
