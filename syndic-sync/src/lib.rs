//! Syndic sync library — mirroring datasets between catalog instances.
//!
//! Public API surface:
//! - [`fetch::download`]: streaming download with a SHA-256 digest
//! - [`reconcile::plan`]: digest-gated resource reconciliation
//! - [`package::sync_dataset`]: one dataset, created or brought up to date
//! - [`batch::run_job`]: whole-catalog synchronization with counters
//! - [`mirror::mirror_dataset`]: one dataset from a foreign portal
//! - [`postprocess`] / [`tasks`]: derived artifacts (GeoJSON, XLSX twins)
//! - [`initialize`]: first-time instance provisioning
//!
//! All catalog access goes through [`syndic_catalog::CatalogApi`], all
//! mutations take the dataset's lease lock from [`syndic_core::lock`].

pub mod batch;
pub mod error;
pub mod fetch;
pub mod initialize;
pub mod mirror;
pub mod package;
pub mod postprocess;
pub mod reconcile;
pub mod tasks;

pub use batch::{run_job, SyncJob, SyncStats};
pub use error::SyncError;
pub use initialize::{initialize_instance, load_group_defs, GroupDef, InitReport};
pub use mirror::{mirror_dataset, split_dataset_url, MirrorParams};
pub use package::{sync_dataset, DatasetOutcome, DatasetSpec};
pub use postprocess::{process_dataset, process_instance, ProcessStats, ProcessingTask};
pub use reconcile::{PlanAction, ReconciliationPlan, ResourceDescriptor};
pub use tasks::{Convert, ExternalConverter, GeometryTwinTask, SpreadsheetTwinTask};
