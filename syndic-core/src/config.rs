//! YAML configuration — catalog instances and lease lock settings.
//!
//! # File layout
//!
//! ```text
//! ~/.syndic/
//!   config.yaml   (instances + lock settings)
//! ```
//!
//! ```yaml
//! instances:
//!   data-town:
//!     base_url: https://data.town.example
//!     api_key: "xxxx"
//! lock:
//!   root: /var/syndic_locks
//!   ttl_seconds: 3600
//!   wait_seconds: 600
//! ```
//!
//! # API pattern
//!
//! Loading has two forms:
//! - `load_at(path)` — explicit path; used in tests with `TempDir`
//! - `load()` — derives `~/.syndic/config.yaml` from `dirs::home_dir()`,
//!   delegates to `load_at`
//!
//! Tests must NEVER call the no-arg wrapper; always use `load_at`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lock::LockSettings;
use crate::types::InstanceName;

/// Connection details for one catalog instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Base URL of the catalog, without a trailing slash.
    pub base_url: String,
    /// Credential sent in the `Authorization` header; omit for anonymous reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Lease lock settings, all optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_root")]
    pub root: PathBuf,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            root: default_lock_root(),
            ttl_seconds: default_ttl_seconds(),
            wait_seconds: default_wait_seconds(),
        }
    }
}

impl LockConfig {
    /// Materialize the runtime settings for [`crate::lock`].
    pub fn settings(&self) -> LockSettings {
        LockSettings {
            root: self.root.clone(),
            ttl: Duration::from_secs(self.ttl_seconds),
            wait: Duration::from_secs(self.wait_seconds),
            retry_interval: Duration::from_secs(1),
        }
    }
}

fn default_lock_root() -> PathBuf {
    PathBuf::from("/var/syndic_locks")
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_wait_seconds() -> u64 {
    600
}

/// Root of the syndic YAML config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
    #[serde(default)]
    pub lock: LockConfig,
}

impl Config {
    /// Load the config from an explicit path.
    ///
    /// Returns `ConfigError::ConfigNotFound` if absent,
    /// `ConfigError::Parse` (with path + line context) if malformed YAML.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// `load_at` convenience wrapper — reads `~/.syndic/config.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::load_at(&home.join(".syndic").join("config.yaml"))
    }

    /// Look up the connection details for a named instance.
    pub fn instance(&self, name: &InstanceName) -> Result<&InstanceConfig, ConfigError> {
        self.instances
            .get(&name.0)
            .ok_or_else(|| ConfigError::UnknownInstance {
                name: name.0.clone(),
            })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
