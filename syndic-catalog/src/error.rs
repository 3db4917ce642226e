//! Error types for syndic-catalog.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

/// All errors that can arise from catalog API calls.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog answered `success: false`; the full payload is kept for
    /// diagnostics.
    #[error("catalog rejected {action}: {payload}")]
    Api { action: String, payload: Value },

    /// A payload failed to encode or the envelope `result` failed to decode.
    #[error("failed to decode {action} payload: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    /// `success: true` but the `result` key was absent.
    #[error("{action} succeeded without a result payload")]
    MissingResult { action: String },

    /// The upload file could not be opened for a multipart post.
    #[error("cannot open upload {path}: {source}")]
    Upload {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An automation group's key/value store was not a JSON object.
    #[error("automation store on group {group:?} is corrupt: {source}")]
    AutomationPayload {
        group: String,
        #[source]
        source: serde_json::Error,
    },
}
