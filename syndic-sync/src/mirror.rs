//! Mirroring one dataset from a foreign catalog.
//!
//! The source is addressed by its public dataset URL
//! (`https://portal.example/dataset/<id>`); the target by instance,
//! dataset name, and organization. Resources are fetched into a scratch
//! directory and handed to [`crate::package::sync_dataset`], so mirroring
//! gets the same digest gating and locking as instance-to-instance sync.

use tempfile::TempDir;

use syndic_catalog::CatalogApi;
use syndic_core::lock::LockSettings;
use syndic_core::types::{DatasetId, DatasetRef, InstanceName};

use crate::error::{io_err, SyncError};
use crate::fetch;
use crate::package::{self, DatasetOutcome, DatasetSpec};

/// Where to mirror from and to.
#[derive(Debug, Clone)]
pub struct MirrorParams {
    /// Public URL of the source dataset, `<base>/dataset/<id>`.
    pub source_url: String,
    pub target_instance: InstanceName,
    pub target_dataset: DatasetId,
    pub target_organization: String,
    /// Agent string for portals that gate their APIs on it.
    pub user_agent: Option<String>,
}

/// Split a dataset URL into its catalog base and dataset id.
pub fn split_dataset_url(url: &str) -> Result<(String, String), SyncError> {
    match url.split_once("/dataset/") {
        Some((base, rest)) => {
            let id = rest.split('/').next().unwrap_or("");
            if base.is_empty() || id.is_empty() {
                return Err(SyncError::InvalidSourceUrl {
                    url: url.to_owned(),
                });
            }
            Ok((base.to_owned(), id.to_owned()))
        }
        None => Err(SyncError::InvalidSourceUrl {
            url: url.to_owned(),
        }),
    }
}

/// Mirror one source dataset into the target instance.
pub fn mirror_dataset<S: CatalogApi, T: CatalogApi>(
    source: &S,
    target: &T,
    http: &reqwest::blocking::Client,
    settings: &LockSettings,
    params: &MirrorParams,
) -> Result<DatasetOutcome, SyncError> {
    let (_, source_id) = split_dataset_url(&params.source_url)?;
    let dataset = source
        .package_show(&source_id)?
        .ok_or_else(|| SyncError::SourceDatasetMissing {
            url: params.source_url.clone(),
        })?;

    let workdir = TempDir::new().map_err(|e| io_err(std::env::temp_dir(), e))?;
    let descriptors = fetch::download_dataset_resources(http, &dataset, workdir.path())?;

    let spec = DatasetSpec {
        target: DatasetRef::new(
            params.target_instance.clone(),
            params.target_dataset.clone(),
        ),
        organization: params.target_organization.clone(),
        title: dataset.title.clone(),
        license_id: dataset.license_id.clone(),
        notes: dataset.notes.clone(),
        url: dataset.url.clone(),
        version: dataset.version.clone(),
        source_url: params.source_url.clone(),
        source_org_description: dataset
            .organization
            .as_ref()
            .map(|org| org.description.clone())
            .unwrap_or_default(),
    };
    package::sync_dataset(target, settings, &spec, &descriptors, false)
}
