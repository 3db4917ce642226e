//! Whole-catalog synchronization between two instances.
//!
//! [`run_job`] walks every dataset the source lists, filters out the ones
//! that should not be mirrored, and reconciles the rest through
//! [`crate::package::sync_dataset`]. A failing dataset is logged and
//! counted, never fatal, so one broken upstream record cannot stall the
//! rest of the catalog.

use std::fmt;

use tempfile::TempDir;

use syndic_catalog::CatalogApi;
use syndic_core::lock::LockSettings;
use syndic_core::types::{DatasetRef, InstanceName};

use crate::error::{io_err, SyncError};
use crate::fetch;
use crate::package::{self, DatasetOutcome, DatasetSpec};

const STATS_EVERY: usize = 10;

/// One source-to-target synchronization run.
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Base URL of the source catalog, used for provenance links.
    pub source_base_url: String,
    pub target_instance: InstanceName,
    pub target_organization: String,
    /// Prepended to every target dataset name. Source names already carrying
    /// it are skipped, so a round-tripped catalog does not mirror its own
    /// mirrors.
    pub dataset_prefix: String,
    /// Prepended (with a space) to every target title.
    pub title_prefix: Option<String>,
    pub force: bool,
}

/// Counters for one [`run_job`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub skipped_prefix: usize,
    pub skipped_attributes: usize,
    pub created: usize,
    pub updated: usize,
    pub metadata_only: usize,
    pub unchanged: usize,
    pub errors: usize,
}

impl SyncStats {
    pub fn success(&self) -> bool {
        self.errors == 0
    }

    fn record(&mut self, outcome: DatasetOutcome) {
        match outcome {
            DatasetOutcome::Created => self.created += 1,
            DatasetOutcome::Updated => self.updated += 1,
            DatasetOutcome::MetadataOnly => self.metadata_only += 1,
            DatasetOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, updated {}, metadata-only {}, unchanged {}, \
             skipped {} by prefix and {} by attributes, errors {}",
            self.created,
            self.updated,
            self.metadata_only,
            self.unchanged,
            self.skipped_prefix,
            self.skipped_attributes,
            self.errors
        )
    }
}

/// Synchronize every eligible source dataset into the target instance.
pub fn run_job<S: CatalogApi, T: CatalogApi>(
    source: &S,
    target: &T,
    http: &reqwest::blocking::Client,
    settings: &LockSettings,
    job: &SyncJob,
) -> Result<SyncStats, SyncError> {
    let names = source.package_list()?;
    tracing::info!("source lists {} dataset(s)", names.len());

    let mut stats = SyncStats::default();
    let mut synced = 0usize;
    for name in names {
        if !job.dataset_prefix.is_empty() && name.starts_with(&job.dataset_prefix) {
            stats.skipped_prefix += 1;
            continue;
        }
        match sync_one(source, target, http, settings, job, &name) {
            Ok(None) => stats.skipped_attributes += 1,
            Ok(Some(outcome)) => {
                stats.record(outcome);
                synced += 1;
                if synced % STATS_EVERY == 0 {
                    tracing::info!("progress: {stats}");
                }
            }
            Err(err) => {
                tracing::error!("sync of {name} failed: {err}");
                stats.errors += 1;
            }
        }
    }

    tracing::info!("done: {stats}");
    Ok(stats)
}

/// Mirror one dataset; `None` means it was filtered out.
fn sync_one<S: CatalogApi, T: CatalogApi>(
    source: &S,
    target: &T,
    http: &reqwest::blocking::Client,
    settings: &LockSettings,
    job: &SyncJob,
    name: &str,
) -> Result<Option<DatasetOutcome>, SyncError> {
    let dataset = source
        .package_show(name)?
        .ok_or_else(|| SyncError::DatasetMissing {
            id: name.to_owned(),
        })?;
    if dataset.private || !dataset.is_active() || dataset.dataset_type != "dataset" {
        tracing::debug!("skipping {name}: not a public active dataset");
        return Ok(None);
    }

    let workdir = TempDir::new().map_err(|e| io_err(std::env::temp_dir(), e))?;
    let descriptors = fetch::download_dataset_resources(http, &dataset, workdir.path())?;

    let title = match &job.title_prefix {
        Some(prefix) => format!("{prefix} {}", dataset.title),
        None => dataset.title.clone(),
    };
    let spec = DatasetSpec {
        target: DatasetRef::new(
            job.target_instance.clone(),
            format!("{}{}", job.dataset_prefix, name),
        ),
        organization: job.target_organization.clone(),
        title,
        license_id: dataset.license_id.clone(),
        notes: dataset.notes.clone(),
        url: dataset.url.clone(),
        version: dataset.version.clone(),
        source_url: format!(
            "{}/dataset/{name}",
            job.source_base_url.trim_end_matches('/')
        ),
        source_org_description: dataset
            .organization
            .as_ref()
            .map(|org| org.description.clone())
            .unwrap_or_default(),
    };
    package::sync_dataset(target, settings, &spec, &descriptors, job.force).map(Some)
}
