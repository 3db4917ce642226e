//! Syndic core library — domain types, configuration, dataset lease lock.
//!
//! Public API surface:
//! - [`types`] — newtypes and catalog records
//! - [`error`] — [`ConfigError`], [`LockError`]
//! - [`config`] — instance + lock configuration (YAML)
//! - [`lock`] — per-dataset lease lock

pub mod config;
pub mod error;
pub mod lock;
pub mod types;

pub use error::{ConfigError, LockError};
pub use types::{
    Dataset, DatasetId, DatasetRef, Extra, InstanceName, Organization, Resource, ResourceId,
};
