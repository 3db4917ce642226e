//! Domain types for syndic.
//!
//! Catalog records (`Dataset`, `Resource`, …) mirror the JSON shapes the
//! catalog API returns; unknown fields are dropped on deserialize, optional
//! fields are omitted on serialize. Identifiers get newtypes so an instance
//! name can never be passed where a dataset id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a configured catalog instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceName(pub String);

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for InstanceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed dataset identifier (catalog "package" name or id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DatasetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed resource identifier, opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Dataset reference
// ---------------------------------------------------------------------------

/// One dataset on one instance — the unit of locking and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetRef {
    pub instance: InstanceName,
    pub dataset: DatasetId,
}

impl DatasetRef {
    pub fn new(instance: impl Into<InstanceName>, dataset: impl Into<DatasetId>) -> Self {
        Self {
            instance: instance.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance, self.dataset)
    }
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// A key/value pair attached to a dataset ("extras" in the catalog API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extra {
    pub key: String,
    pub value: String,
}

impl Extra {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A file attached to a dataset.
///
/// `hash` carries the hex SHA-256 digest of the file content; an empty string
/// means the digest is unknown. `geo_lat_field` / `geo_lon_field` are optional
/// column hints some publishers attach to tabular resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResourceId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_lat_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_lon_field: Option<String>,
}

impl Resource {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }
}

/// Matches the deserialization defaults, notably `state: "active"`.
impl Default for Resource {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            format: String::new(),
            description: String::new(),
            hash: String::new(),
            url: String::new(),
            state: default_state(),
            geo_lat_field: None,
            geo_lon_field: None,
        }
    }
}

/// The organization that owns a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Organization {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A catalog dataset ("package").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<DatasetId>,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(rename = "type", default = "default_dataset_type")]
    pub dataset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_org: Option<String>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}

impl Dataset {
    pub fn is_active(&self) -> bool {
        self.state == "active"
    }

    /// Look up an extra by key.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Set an extra, replacing the value if the key is already present.
    pub fn set_extra(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.extras.iter_mut().find(|e| e.key == key) {
            Some(e) => e.value = value,
            None => self.extras.push(Extra::new(key, value)),
        }
    }
}

/// Matches the deserialization defaults, notably `state: "active"` and
/// `dataset_type: "dataset"`.
impl Default for Dataset {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            title: String::new(),
            private: false,
            state: default_state(),
            dataset_type: default_dataset_type(),
            license_id: None,
            notes: None,
            url: None,
            version: None,
            owner_org: None,
            extras: Vec::new(),
            resources: Vec::new(),
            organization: None,
        }
    }
}

fn default_state() -> String {
    "active".to_owned()
}

fn default_dataset_type() -> String {
    "dataset".to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
