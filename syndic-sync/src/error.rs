//! Error types for syndic-sync.

use std::path::PathBuf;

use thiserror::Error;

use syndic_catalog::CatalogError;
use syndic_core::{ConfigError, LockError};

/// All errors that can arise from mirroring operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The download could not be started or the stream broke mid-transfer.
    #[error("transfer failed for {url}: {source}")]
    Transfer {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered the download request with a non-success status.
    #[error("transfer failed for {url}: HTTP {status}")]
    TransferStatus { url: String, status: u16 },

    /// An error from the catalog API.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// An error from the lease lock.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// An error from configuration loading.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The group definitions YAML failed to parse.
    #[error("failed to parse group definitions at {path}: {source}")]
    GroupsParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A source dataset URL without the expected `/dataset/<id>` segment.
    #[error("cannot extract a dataset id from {url}")]
    InvalidSourceUrl { url: String },

    /// The source catalog has no record behind the given dataset URL.
    #[error("source dataset not found at {url}")]
    SourceDatasetMissing { url: String },

    /// A dataset expected to exist was not returned by the catalog.
    #[error("dataset {id} not found")]
    DatasetMissing { id: String },

    /// A derived-artifact conversion failed.
    #[error("conversion for task {task} failed: {detail}")]
    Convert { task: String, detail: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Transfer`].
pub(crate) fn transfer_err(
    url: &str,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> SyncError {
    SyncError::Transfer {
        url: url.to_owned(),
        source: source.into(),
    }
}
