//! First-time provisioning of a catalog instance.
//!
//! Provisioning is idempotent: the settings group is created only when
//! absent, and topic-group creation is recorded in the
//! `instance_initializer` automation store so re-runs against an already
//! provisioned instance do nothing.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use syndic_catalog::{CatalogApi, Group};

use crate::error::{io_err, SyncError};

/// Automation group recording what this module has already done.
pub const AUTOMATION_GROUP: &str = "instance_initializer";
const GROUPS_KEY: &str = "initialized_groups";

/// One topic group from the definitions file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupDef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// What one [`initialize_instance`] run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub settings_created: bool,
    pub groups_created: usize,
}

/// Load topic group definitions from a YAML file.
pub fn load_group_defs(path: &Path) -> Result<Vec<GroupDef>, SyncError> {
    let raw = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&raw).map_err(|e| SyncError::GroupsParse {
        path: path.to_owned(),
        source: e,
    })
}

/// Ensure the settings group and the topic groups exist.
pub fn initialize_instance<C: CatalogApi>(
    api: &C,
    groups: &[GroupDef],
) -> Result<InitReport, SyncError> {
    let mut report = InitReport::default();

    if api.group_show("settings", "settings")?.is_none() {
        tracing::info!("creating the settings group");
        api.group_create(&Group {
            name: "settings".to_owned(),
            group_type: "settings".to_owned(),
            title: "Settings".to_owned(),
            ..Group::default()
        })?;
        report.settings_created = true;
    }

    // Any recorded value counts as done; an interrupted earlier run is
    // finished by hand, not by blind re-creation.
    let initialized = api
        .automation_get(AUTOMATION_GROUP, GROUPS_KEY)?
        .is_some_and(|v| v.as_bool().unwrap_or(true));
    if initialized {
        tracing::debug!("topic groups already initialized");
        return Ok(report);
    }

    for def in groups {
        tracing::info!("creating topic group {}", def.id);
        api.group_create(&Group {
            name: def.id.clone(),
            group_type: "group".to_owned(),
            title: def.title.clone(),
            image_url: def.icon.clone(),
            ..Group::default()
        })?;
        report.groups_created += 1;
    }
    api.automation_set(AUTOMATION_GROUP, GROUPS_KEY, Value::Bool(true))?;

    Ok(report)
}
