//! Error types for syndic-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::DatasetRef;

/// All errors that can arise from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.syndic/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config YAML file did not exist at the expected path.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The requested catalog instance is not declared in the config.
    #[error("unknown catalog instance {name:?}")]
    UnknownInstance { name: String },
}

/// All errors that can arise from lease lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Underlying I/O failure while reading or writing lease files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lease payload failed to encode.
    #[error("lease serialization error: {0}")]
    Lease(#[from] serde_json::Error),

    /// The wait deadline passed without this worker becoming the holder.
    #[error("failed to acquire lease for {scope} after {}s", waited.as_secs())]
    AcquisitionTimeout { scope: DatasetRef, waited: Duration },
}
