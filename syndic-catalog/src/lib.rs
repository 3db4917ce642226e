//! Syndic catalog client — blocking HTTP access to one catalog instance.
//!
//! Public API surface:
//! - [`api`] — [`CatalogApi`] trait and request types
//! - [`client`] — [`CatalogClient`], the HTTP implementation
//! - [`error`] — [`CatalogError`]
//!
//! Sync logic is written against [`CatalogApi`]; tests substitute a recording
//! fake where the production code uses [`CatalogClient`].

pub mod api;
pub mod client;
pub mod error;

pub use api::{CatalogApi, Group, PackageFields, ResourceFields};
pub use client::CatalogClient;
pub use error::CatalogError;
