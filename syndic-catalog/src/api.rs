//! The catalog operation surface and its request types.
//!
//! [`CatalogApi`] is the seam between sync logic and the wire: production
//! code talks to [`crate::client::CatalogClient`], tests talk to a recording
//! fake. The automation key/value helpers are default methods layered on the
//! group operations, so every implementation gets them for free.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use syndic_core::types::{Dataset, Extra, Organization, Resource, ResourceId};

use crate::error::CatalogError;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Fields for `package_create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageFields {
    pub name: String,
    pub title: String,
    pub private: bool,
    pub owner_org: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<Extra>,
}

/// Fields for `resource_create` / `resource_update`.
///
/// `id` is required for updates and must be absent for creates. `url` and
/// `hash` accompany an upload; the catalog rewrites `url` to the stored copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// A catalog group record. `group_type` distinguishes topic groups,
/// settings groups, and automation key/value stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default = "default_group_type")]
    pub group_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Automation groups keep their key/value store as a JSON string here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
}

fn default_group_type() -> String {
    "group".to_owned()
}

// ---------------------------------------------------------------------------
// Operation surface
// ---------------------------------------------------------------------------

/// Blocking operations against one catalog instance.
pub trait CatalogApi {
    /// All dataset names, paged through until exhausted.
    fn package_list(&self) -> Result<Vec<String>, CatalogError>;

    /// One dataset by name or id; `None` when the catalog reports failure
    /// (absent, deleted beyond reach, or not visible to this credential).
    fn package_show(&self, id: &str) -> Result<Option<Dataset>, CatalogError>;

    fn package_create(&self, fields: &PackageFields) -> Result<Dataset, CatalogError>;

    fn package_update(&self, dataset: &Dataset) -> Result<Dataset, CatalogError>;

    /// Create a resource; `upload` posts the file as a multipart form.
    fn resource_create(
        &self,
        fields: &ResourceFields,
        upload: Option<&Path>,
    ) -> Result<Resource, CatalogError>;

    /// Update a resource in place (`fields.id` required).
    fn resource_update(
        &self,
        fields: &ResourceFields,
        upload: Option<&Path>,
    ) -> Result<Resource, CatalogError>;

    fn group_show(&self, name: &str, group_type: &str) -> Result<Option<Group>, CatalogError>;

    fn group_create(&self, group: &Group) -> Result<(), CatalogError>;

    fn group_update(&self, group: &Group) -> Result<(), CatalogError>;

    fn organization_show(&self, name: &str) -> Result<Option<Organization>, CatalogError>;

    fn organization_create(&self, org: &Organization) -> Result<(), CatalogError>;

    /// Read one key from an automation group's JSON store.
    fn automation_get(&self, group: &str, key: &str) -> Result<Option<Value>, CatalogError> {
        match self.group_show(group, "automation")? {
            Some(record) => {
                let store = parse_store(group, record.json.as_deref())?;
                Ok(store.get(key).cloned())
            }
            None => Ok(None),
        }
    }

    /// Write one key into an automation group's JSON store, creating the
    /// group on first use.
    fn automation_set(&self, group: &str, key: &str, value: Value) -> Result<(), CatalogError> {
        match self.group_show(group, "automation")? {
            Some(mut record) => {
                let mut store = parse_store(group, record.json.as_deref())?;
                store.insert(key.to_owned(), value);
                record.json = Some(encode_store(group, &store)?);
                self.group_update(&record)
            }
            None => {
                let mut store = Map::new();
                store.insert(key.to_owned(), value);
                self.group_create(&Group {
                    name: group.to_owned(),
                    group_type: "automation".to_owned(),
                    json: Some(encode_store(group, &store)?),
                    ..Group::default()
                })
            }
        }
    }
}

fn parse_store(group: &str, json: Option<&str>) -> Result<Map<String, Value>, CatalogError> {
    match json {
        None | Some("") => Ok(Map::new()),
        Some(raw) => {
            serde_json::from_str(raw).map_err(|e| CatalogError::AutomationPayload {
                group: group.to_owned(),
                source: e,
            })
        }
    }
}

fn encode_store(group: &str, store: &Map<String, Value>) -> Result<String, CatalogError> {
    serde_json::to_string(store).map_err(|e| CatalogError::AutomationPayload {
        group: group.to_owned(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
