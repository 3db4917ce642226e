//! Dataset-level reconciliation.
//!
//! [`sync_dataset`] brings one target dataset in line with a source
//! description: it creates the dataset when absent (staged private, published
//! once its resources are in), updates drifted metadata, and executes the
//! resource plan from [`crate::reconcile`]. All catalog mutations happen
//! under the dataset's lease lock.

use std::path::Path;

use syndic_catalog::{CatalogApi, PackageFields, ResourceFields};
use syndic_core::lock::{self, LockSettings};
use syndic_core::types::{Dataset, DatasetRef, Extra};

use crate::error::SyncError;
use crate::reconcile::{self, PlanAction, ReconciliationPlan, ResourceDescriptor};

/// Extra recording the source dataset URL on the mirrored copy.
pub const SOURCE_URL_EXTRA: &str = "sync_source_package_url";
/// Extra recording the source organization's description.
pub const SOURCE_ORG_EXTRA: &str = "sync_source_org_description";

/// Everything the target dataset should look like, minus its resources.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub target: DatasetRef,
    pub organization: String,
    pub title: String,
    pub license_id: Option<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub version: Option<String>,
    pub source_url: String,
    pub source_org_description: String,
}

/// What one [`sync_dataset`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetOutcome {
    /// The dataset did not exist; it was created and populated.
    Created,
    /// Resources were transferred, possibly with metadata changes.
    Updated,
    /// Only metadata had drifted; no resource was transferred.
    MetadataOnly,
    /// Nothing differed.
    Unchanged,
}

/// Reconcile one dataset against its source description and resources.
pub fn sync_dataset<C: CatalogApi>(
    api: &C,
    settings: &LockSettings,
    spec: &DatasetSpec,
    source_resources: &[ResourceDescriptor],
    force: bool,
) -> Result<DatasetOutcome, SyncError> {
    let existing = api
        .package_show(&spec.target.dataset.0)?
        .filter(|d| d.state != "deleted");

    match existing {
        None => create_dataset(api, settings, spec, source_resources, force),
        Some(dataset) => update_dataset(api, settings, spec, dataset, source_resources, force),
    }
}

fn create_dataset<C: CatalogApi>(
    api: &C,
    settings: &LockSettings,
    spec: &DatasetSpec,
    source_resources: &[ResourceDescriptor],
    force: bool,
) -> Result<DatasetOutcome, SyncError> {
    let plan = reconcile::plan(source_resources, &[], force);

    let guard = lock::acquire(settings, &spec.target)?;
    tracing::info!("creating dataset {}", spec.target);

    // Staged private so readers never see a dataset with missing resources.
    api.package_create(&PackageFields {
        name: spec.target.dataset.0.clone(),
        title: spec.title.clone(),
        private: true,
        owner_org: spec.organization.clone(),
        license_id: spec.license_id.clone(),
        notes: spec.notes.clone(),
        url: spec.url.clone(),
        version: spec.version.clone(),
        extras: vec![
            Extra::new(SOURCE_URL_EXTRA, &spec.source_url),
            Extra::new(SOURCE_ORG_EXTRA, &spec.source_org_description),
        ],
    })?;

    apply_plan(api, &spec.target.dataset.0, &plan)?;

    let mut published = api
        .package_show(&spec.target.dataset.0)?
        .ok_or_else(|| SyncError::DatasetMissing {
            id: spec.target.dataset.0.clone(),
        })?;
    published.private = false;
    api.package_update(&published)?;

    guard.release();
    Ok(DatasetOutcome::Created)
}

fn update_dataset<C: CatalogApi>(
    api: &C,
    settings: &LockSettings,
    spec: &DatasetSpec,
    existing: Dataset,
    source_resources: &[ResourceDescriptor],
    force: bool,
) -> Result<DatasetOutcome, SyncError> {
    let plan = reconcile::plan(source_resources, &existing.resources, force);
    let (dataset, drifted) = apply_metadata(spec, existing);

    if plan.is_empty() && !drifted {
        tracing::debug!("dataset {} is up to date", spec.target);
        return Ok(DatasetOutcome::Unchanged);
    }

    let guard = lock::acquire(settings, &spec.target)?;

    if plan.is_empty() {
        tracing::info!("dataset {}: metadata drift only", spec.target);
        api.package_update(&dataset)?;
        guard.release();
        return Ok(DatasetOutcome::MetadataOnly);
    }

    tracing::info!(
        "dataset {}: {} resource transfer(s)",
        spec.target,
        plan.len()
    );
    if drifted {
        api.package_update(&dataset)?;
    }
    apply_plan(api, &spec.target.dataset.0, &plan)?;

    guard.release();
    Ok(DatasetOutcome::Updated)
}

/// Fold `spec` into `dataset`, reporting whether anything changed.
///
/// Absent and empty are the same value for the optional fields, so a source
/// that omits `notes` does not fight a target that stores `""`.
fn apply_metadata(spec: &DatasetSpec, mut dataset: Dataset) -> (Dataset, bool) {
    let mut drifted = false;

    if dataset.title != spec.title {
        dataset.title = spec.title.clone();
        drifted = true;
    }
    for (field, wanted) in [
        (&mut dataset.license_id, &spec.license_id),
        (&mut dataset.notes, &spec.notes),
        (&mut dataset.url, &spec.url),
        (&mut dataset.version, &spec.version),
    ] {
        if field.as_deref().unwrap_or("") != wanted.as_deref().unwrap_or("") {
            *field = wanted.clone();
            drifted = true;
        }
    }
    for (key, wanted) in [
        (SOURCE_URL_EXTRA, spec.source_url.as_str()),
        (SOURCE_ORG_EXTRA, spec.source_org_description.as_str()),
    ] {
        if dataset.extra(key) != Some(wanted) {
            dataset.set_extra(key, wanted);
            drifted = true;
        }
    }

    (dataset, drifted)
}

fn apply_plan<C: CatalogApi>(
    api: &C,
    package_id: &str,
    plan: &ReconciliationPlan,
) -> Result<(), SyncError> {
    for entry in &plan.entries {
        let descriptor = &entry.descriptor;
        let upload = descriptor.upload.as_deref();
        match &entry.action {
            PlanAction::Create => {
                api.resource_create(
                    &ResourceFields {
                        id: None,
                        package_id: Some(package_id.to_owned()),
                        name: Some(descriptor.name.clone()),
                        format: Some(descriptor.format.clone()),
                        description: Some(descriptor.description.clone()),
                        url: upload.map(file_name),
                        hash: descriptor.digest.clone(),
                    },
                    upload,
                )?;
            }
            PlanAction::Update { resource_id } => {
                api.resource_update(
                    &ResourceFields {
                        id: Some(resource_id.clone()),
                        package_id: None,
                        name: None,
                        format: None,
                        description: Some(descriptor.description.clone()),
                        url: None,
                        hash: descriptor.digest.clone(),
                    },
                    upload,
                )?;
            }
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
