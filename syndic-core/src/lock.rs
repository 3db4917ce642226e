//! Lease-based mutual exclusion over one dataset on one instance.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   <instance>/
//!     <dataset>/
//!       <lease-id>.json   ({"id": "<uuid>", "time": "<rfc3339>"})
//! ```
//!
//! Every competing worker writes its own lease file into the scope directory,
//! then polls the directory until its lease is the holder. The holder is the
//! live lease with the smallest `(time, id)`; ties on `time` fall back to the
//! lease id, so two workers can never both believe they hold the scope.
//!
//! A lease older than the TTL is dead: it no longer blocks anyone, and the
//! next worker to become holder deletes it along with any unreadable lease
//! files. A worker that gives up waiting removes its own lease before
//! returning, so abandoned waiters do not pile up.
//!
//! Coordination is filesystem-only. All workers must see the same lock root
//! (shared volume) for exclusion to hold across hosts.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::LockError;
use crate::types::DatasetRef;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime settings for lease acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    /// Directory under which per-scope lease directories are created.
    pub root: PathBuf,
    /// Age past which a lease is considered dead.
    pub ttl: Duration,
    /// How long `acquire` keeps polling before giving up.
    pub wait: Duration,
    /// Pause between polls.
    pub retry_interval: Duration,
}

impl LockSettings {
    /// Settings with production defaults rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: Duration::from_secs(3600),
            wait: Duration::from_secs(600),
            retry_interval: Duration::from_secs(1),
        }
    }
}

/// Whether `acquire_with_mode` actually takes the lock.
///
/// `Bypass` is for callers that already hold the scope's lease and re-enter
/// code that locks; it returns an empty guard without touching the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Exclusive,
    Bypass,
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// On-disk lease payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Lease {
    id: Uuid,
    time: DateTime<Utc>,
}

/// `<root>/<instance>/<dataset>/`
pub fn scope_dir(settings: &LockSettings, scope: &DatasetRef) -> PathBuf {
    settings
        .root
        .join(&scope.instance.0)
        .join(&scope.dataset.0)
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Held lease; removing the lease file on drop releases the scope.
#[derive(Debug)]
pub struct LeaseGuard {
    lease_file: Option<PathBuf>,
}

impl LeaseGuard {
    /// Release the lease now instead of at end of scope.
    pub fn release(mut self) {
        self.remove_lease_file();
    }

    fn remove_lease_file(&mut self) {
        if let Some(path) = self.lease_file.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to release lease {}: {e}", path.display());
            }
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.remove_lease_file();
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Take the exclusive lease for `scope`, waiting up to `settings.wait`.
pub fn acquire(settings: &LockSettings, scope: &DatasetRef) -> Result<LeaseGuard, LockError> {
    acquire_with_mode(settings, scope, LockMode::Exclusive)
}

/// [`acquire`], with `LockMode::Bypass` returning an empty guard immediately.
pub fn acquire_with_mode(
    settings: &LockSettings,
    scope: &DatasetRef,
    mode: LockMode,
) -> Result<LeaseGuard, LockError> {
    if mode == LockMode::Bypass {
        debug!("lease bypass for {scope}");
        return Ok(LeaseGuard { lease_file: None });
    }

    let dir = scope_dir(settings, scope);
    std::fs::create_dir_all(&dir)?;

    let lease = Lease {
        id: Uuid::new_v4(),
        time: Utc::now(),
    };
    let lease_file = dir.join(format!("{}.json", lease.id));
    std::fs::write(&lease_file, serde_json::to_string(&lease)?)?;
    debug!("wrote lease {} for {scope}", lease.id);

    let started = Instant::now();
    loop {
        match holds_lease(&dir, &lease.id, settings.ttl) {
            Ok(true) => {
                debug!("lease {} now holds {scope}", lease.id);
                return Ok(LeaseGuard {
                    lease_file: Some(lease_file),
                });
            }
            Ok(false) => {}
            Err(e) => {
                remove_own_lease(&lease_file);
                return Err(e);
            }
        }
        if started.elapsed() >= settings.wait {
            remove_own_lease(&lease_file);
            return Err(LockError::AcquisitionTimeout {
                scope: scope.clone(),
                waited: settings.wait,
            });
        }
        std::thread::sleep(settings.retry_interval);
    }
}

fn remove_own_lease(lease_file: &Path) {
    if let Err(e) = std::fs::remove_file(lease_file) {
        warn!("failed to withdraw lease {}: {e}", lease_file.display());
    }
}

/// One poll: is `my_id` the holder of the scope directory `dir`?
///
/// A lease is live if its file parses and its `time` is within `ttl` of now.
/// The holder is the minimum live `(time, id)`. When the caller is the
/// holder, dead lease files (expired or unreadable) are deleted; until then
/// they are left for the eventual holder to clean up.
pub fn holds_lease(dir: &Path, my_id: &Uuid, ttl: Duration) -> Result<bool, LockError> {
    let cutoff = Utc::now() - chrono_ttl(ttl);
    let mut live: Vec<Lease> = Vec::new();
    let mut dead: Vec<PathBuf> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        // A competitor may remove its lease between listing and reading.
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        let lease: Lease = match serde_json::from_str(&contents) {
            Ok(l) => l,
            Err(e) => {
                warn!("discarding unreadable lease {}: {e}", path.display());
                dead.push(path);
                continue;
            }
        };
        if lease.time < cutoff {
            debug!("lease {} expired at {}", lease.id, lease.time);
            dead.push(path);
            continue;
        }
        live.push(lease);
    }

    let mine = live
        .iter()
        .min_by_key(|l| (l.time, l.id))
        .map_or(false, |holder| holder.id == *my_id);

    if mine {
        for path in dead {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to remove dead lease {}: {e}", path.display());
            }
        }
    }
    Ok(mine)
}

fn chrono_ttl(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
