//! Derived-artifact processing with idempotency markers.
//!
//! A [`ProcessingTask`] derives a new resource from an existing one (say a
//! GeoJSON twin of a CSV). Each completed derivation is recorded as an extra
//! `processed_res_<task>_<resource>` = `"yes"` on the dataset, and the
//! marker is re-checked under the dataset's lease lock before any work, so
//! concurrent processors cannot attach the same artifact twice.

use std::path::Path;

use tempfile::TempDir;

use syndic_catalog::{CatalogApi, ResourceFields};
use syndic_core::lock::{self, LockMode, LockSettings};
use syndic_core::types::{Dataset, DatasetRef, InstanceName, Resource};

use crate::error::{io_err, SyncError};
use crate::reconcile::ResourceDescriptor;

/// One kind of derived artifact.
pub trait ProcessingTask {
    /// Stable identifier used in the idempotency marker.
    fn task_id(&self) -> &str;

    /// Whether this resource should get a derived twin.
    fn eligible(&self, resource: &Resource) -> bool;

    /// Produce the artifact under `workdir` and describe the new resource.
    fn derive(
        &self,
        dataset: &Dataset,
        resource: &Resource,
        workdir: &Path,
    ) -> Result<ResourceDescriptor, SyncError>;
}

/// Counters for one [`process_instance`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub datasets: usize,
    pub artifacts: usize,
    pub errors: usize,
}

impl ProcessStats {
    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

/// Run `task` over every eligible, unprocessed resource of one dataset.
///
/// Returns the number of artifacts attached. `mode` selects whether the
/// dataset lease lock is honored or bypassed.
pub fn process_dataset<C: CatalogApi>(
    api: &C,
    settings: &LockSettings,
    instance: &InstanceName,
    dataset_id: &str,
    task: &dyn ProcessingTask,
    mode: LockMode,
) -> Result<usize, SyncError> {
    let dataset = api
        .package_show(dataset_id)?
        .ok_or_else(|| SyncError::DatasetMissing {
            id: dataset_id.to_owned(),
        })?;
    let scope = DatasetRef::new(instance.0.clone(), dataset.name.clone());

    let mut attached = 0;
    for resource in &dataset.resources {
        let resource_id = match &resource.id {
            Some(id) if resource.is_active() => id.clone(),
            _ => continue,
        };
        if !task.eligible(resource) {
            continue;
        }
        let marker = format!("processed_res_{}_{}", task.task_id(), resource_id);
        if dataset.extra(&marker) == Some("yes") {
            tracing::debug!("{}: {} already processed", scope, resource.name);
            continue;
        }

        let guard = lock::acquire_with_mode(settings, &scope, mode)?;

        // Another processor may have finished while we waited for the lease.
        let current = api
            .package_show(dataset_id)?
            .ok_or_else(|| SyncError::DatasetMissing {
                id: dataset_id.to_owned(),
            })?;
        if current.extra(&marker) == Some("yes") {
            guard.release();
            continue;
        }

        let workdir = TempDir::new().map_err(|e| io_err(std::env::temp_dir(), e))?;
        let descriptor = task.derive(&current, resource, workdir.path())?;
        tracing::info!(
            "{}: attaching {} ({})",
            scope,
            descriptor.name,
            descriptor.format
        );
        api.resource_create(
            &ResourceFields {
                id: None,
                package_id: Some(current.name.clone()),
                name: Some(descriptor.name.clone()),
                format: Some(descriptor.format.clone()),
                description: Some(descriptor.description.clone()),
                url: descriptor
                    .upload
                    .as_deref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
                hash: descriptor.digest.clone(),
            },
            descriptor.upload.as_deref(),
        )?;

        // Re-show before writing the marker so concurrent resource edits
        // are not clobbered.
        let mut marked = api
            .package_show(dataset_id)?
            .ok_or_else(|| SyncError::DatasetMissing {
                id: dataset_id.to_owned(),
            })?;
        marked.set_extra(&marker, "yes");
        api.package_update(&marked)?;

        guard.release();
        attached += 1;
    }
    Ok(attached)
}

/// Run `task` across every dataset of the instance, isolating failures.
pub fn process_instance<C: CatalogApi>(
    api: &C,
    settings: &LockSettings,
    instance: &InstanceName,
    task: &dyn ProcessingTask,
    mode: LockMode,
) -> Result<ProcessStats, SyncError> {
    let mut stats = ProcessStats::default();
    for name in api.package_list()? {
        stats.datasets += 1;
        match process_dataset(api, settings, instance, &name, task, mode) {
            Ok(attached) => stats.artifacts += attached,
            Err(err) => {
                tracing::error!("processing {name} failed: {err}");
                stats.errors += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::collections::HashMap;

    use syndic_catalog::{CatalogError, Group, PackageFields};
    use syndic_core::types::{Organization, ResourceId};
    use tempfile::TempDir as TestDir;

    #[derive(Default)]
    struct FakeCatalog {
        datasets: RefCell<HashMap<String, Dataset>>,
        creations: RefCell<usize>,
    }

    impl FakeCatalog {
        fn with_dataset(dataset: Dataset) -> Self {
            let fake = Self::default();
            fake.datasets
                .borrow_mut()
                .insert(dataset.name.clone(), dataset);
            fake
        }
    }

    impl CatalogApi for FakeCatalog {
        fn package_list(&self) -> Result<Vec<String>, CatalogError> {
            Ok(self.datasets.borrow().keys().cloned().collect())
        }
        fn package_show(&self, id: &str) -> Result<Option<Dataset>, CatalogError> {
            Ok(self.datasets.borrow().get(id).cloned())
        }
        fn package_create(&self, _: &PackageFields) -> Result<Dataset, CatalogError> {
            unimplemented!()
        }
        fn package_update(&self, dataset: &Dataset) -> Result<Dataset, CatalogError> {
            self.datasets
                .borrow_mut()
                .insert(dataset.name.clone(), dataset.clone());
            Ok(dataset.clone())
        }
        fn resource_create(
            &self,
            fields: &ResourceFields,
            _upload: Option<&Path>,
        ) -> Result<Resource, CatalogError> {
            *self.creations.borrow_mut() += 1;
            let package = fields.package_id.clone().unwrap_or_default();
            let resource = Resource {
                id: Some(ResourceId(format!("derived-{}", self.creations.borrow()))),
                name: fields.name.clone().unwrap_or_default(),
                format: fields.format.clone().unwrap_or_default(),
                ..Resource::default()
            };
            if let Some(dataset) = self.datasets.borrow_mut().get_mut(&package) {
                dataset.resources.push(resource.clone());
            }
            Ok(resource)
        }
        fn resource_update(
            &self,
            _: &ResourceFields,
            _: Option<&Path>,
        ) -> Result<Resource, CatalogError> {
            unimplemented!()
        }
        fn group_show(&self, _: &str, _: &str) -> Result<Option<Group>, CatalogError> {
            Ok(None)
        }
        fn group_create(&self, _: &Group) -> Result<(), CatalogError> {
            Ok(())
        }
        fn group_update(&self, _: &Group) -> Result<(), CatalogError> {
            Ok(())
        }
        fn organization_show(&self, _: &str) -> Result<Option<Organization>, CatalogError> {
            Ok(None)
        }
        fn organization_create(&self, _: &Organization) -> Result<(), CatalogError> {
            Ok(())
        }
    }

    /// Derives a `.out` twin for CSV resources, or fails on demand.
    struct FakeTask {
        fail: bool,
    }

    impl ProcessingTask for FakeTask {
        fn task_id(&self) -> &str {
            "twin"
        }
        fn eligible(&self, resource: &Resource) -> bool {
            resource.format == "CSV"
        }
        fn derive(
            &self,
            _dataset: &Dataset,
            resource: &Resource,
            _workdir: &Path,
        ) -> Result<ResourceDescriptor, SyncError> {
            if self.fail {
                return Err(SyncError::Convert {
                    task: "twin".to_owned(),
                    detail: "boom".to_owned(),
                });
            }
            Ok(ResourceDescriptor {
                name: format!("{}.out", resource.name),
                format: "OUT".to_owned(),
                description: String::new(),
                digest: None,
                upload: None,
            })
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            id: Some("id-air-quality".into()),
            name: "air-quality".to_owned(),
            resources: vec![
                Resource {
                    id: Some(ResourceId("r1".to_owned())),
                    name: "readings".to_owned(),
                    format: "CSV".to_owned(),
                    ..Resource::default()
                },
                Resource {
                    id: Some(ResourceId("r2".to_owned())),
                    name: "manual".to_owned(),
                    format: "PDF".to_owned(),
                    ..Resource::default()
                },
            ],
            ..Dataset::default()
        }
    }

    fn settings(dir: &TestDir) -> LockSettings {
        LockSettings::at(dir.path())
    }

    #[test]
    fn eligible_resource_gets_an_artifact_and_a_marker() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::with_dataset(dataset());
        let instance = InstanceName::from("data-town");

        let attached = process_dataset(
            &api,
            &settings(&locks),
            &instance,
            "air-quality",
            &FakeTask { fail: false },
            LockMode::Exclusive,
        )
        .expect("process");

        assert_eq!(attached, 1);
        let datasets = api.datasets.borrow();
        let dataset = datasets.get("air-quality").expect("dataset");
        assert_eq!(dataset.extra("processed_res_twin_r1"), Some("yes"));
        assert_eq!(dataset.resources.len(), 3);
        assert_eq!(dataset.resources[2].name, "readings.out");
    }

    #[test]
    fn second_run_attaches_nothing() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::with_dataset(dataset());
        let instance = InstanceName::from("data-town");
        let task = FakeTask { fail: false };

        for _ in 0..2 {
            process_dataset(
                &api,
                &settings(&locks),
                &instance,
                "air-quality",
                &task,
                LockMode::Exclusive,
            )
            .expect("process");
        }

        assert_eq!(*api.creations.borrow(), 1);
    }

    #[test]
    fn failed_derivation_leaves_no_marker() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::with_dataset(dataset());
        let instance = InstanceName::from("data-town");

        let err = process_dataset(
            &api,
            &settings(&locks),
            &instance,
            "air-quality",
            &FakeTask { fail: true },
            LockMode::Exclusive,
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::Convert { .. }));
        let datasets = api.datasets.borrow();
        let dataset = datasets.get("air-quality").expect("dataset");
        assert_eq!(dataset.extra("processed_res_twin_r1"), None);
        assert_eq!(*api.creations.borrow(), 0);
    }

    #[test]
    fn missing_dataset_is_an_error() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::default();
        let instance = InstanceName::from("data-town");

        let err = process_dataset(
            &api,
            &settings(&locks),
            &instance,
            "nope",
            &FakeTask { fail: false },
            LockMode::Exclusive,
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::DatasetMissing { .. }));
    }

    #[test]
    fn instance_run_counts_and_isolates_failures() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::with_dataset(dataset());
        let instance = InstanceName::from("data-town");

        let stats = process_instance(
            &api,
            &settings(&locks),
            &instance,
            &FakeTask { fail: true },
            LockMode::Exclusive,
        )
        .expect("process");

        assert_eq!(stats.datasets, 1);
        assert_eq!(stats.artifacts, 0);
        assert_eq!(stats.errors, 1);
        assert!(!stats.success());
    }

    #[test]
    fn bypass_mode_touches_no_lock_files() {
        let locks = TestDir::new().expect("tempdir");
        let api = FakeCatalog::with_dataset(dataset());
        let instance = InstanceName::from("data-town");

        process_dataset(
            &api,
            &settings(&locks),
            &instance,
            "air-quality",
            &FakeTask { fail: false },
            LockMode::Bypass,
        )
        .expect("process");

        let entries: Vec<_> = std::fs::read_dir(locks.path())
            .expect("read_dir")
            .collect::<Result<_, _>>()
            .expect("entries");
        assert!(entries.is_empty());
    }
}
