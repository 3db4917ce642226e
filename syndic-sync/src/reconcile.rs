//! Content-addressed resource reconciliation.
//!
//! A [`ResourceDescriptor`] describes one resource as it exists at the
//! source. [`plan`] compares descriptors against the target dataset's
//! resources by case-insensitive (name, format) key and emits only the
//! transfers that are actually needed: matching digests produce no entry.
//! The plan is additive, target resources with no source counterpart are
//! left alone.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use syndic_core::types::{Resource, ResourceId};

/// One source resource, downloaded and digested, ready to reconcile.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub name: String,
    pub format: String,
    pub description: String,
    /// Lowercase hex SHA-256 of the payload; `None` when there is no file.
    pub digest: Option<String>,
    /// Local path to the downloaded payload, absent for metadata-only
    /// resources.
    pub upload: Option<PathBuf>,
}

impl ResourceDescriptor {
    fn key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.format.to_lowercase())
    }
}

/// What to do with one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update { resource_id: ResourceId },
}

/// One planned transfer.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub action: PlanAction,
    pub descriptor: ResourceDescriptor,
}

/// The ordered set of transfers needed to bring the target up to date.
#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub entries: Vec<PlanEntry>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Compare source descriptors to target resources and plan the transfers.
///
/// Target resources only participate when active and carrying an id. When
/// two source descriptors share a key the first wins and the rest are
/// skipped with a warning. `force` turns every match into an update
/// regardless of digests.
pub fn plan(
    source: &[ResourceDescriptor],
    target: &[Resource],
    force: bool,
) -> ReconciliationPlan {
    let mut by_key: HashMap<(String, String), (&ResourceId, &str)> = HashMap::new();
    for resource in target {
        let id = match &resource.id {
            Some(id) if resource.is_active() => id,
            _ => continue,
        };
        let key = (resource.name.to_lowercase(), resource.format.to_lowercase());
        by_key.entry(key).or_insert((id, resource.hash.as_str()));
    }

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut entries = Vec::new();
    for descriptor in source {
        let key = descriptor.key();
        if !seen.insert(key.clone()) {
            tracing::warn!(
                "duplicate source resource {}.{}; keeping the first",
                descriptor.name,
                descriptor.format
            );
            continue;
        }
        match by_key.get(&key) {
            None => entries.push(PlanEntry {
                action: PlanAction::Create,
                descriptor: descriptor.clone(),
            }),
            Some((id, hash)) => {
                let digest = descriptor.digest.as_deref().unwrap_or("");
                if force || hash.is_empty() || digest != *hash {
                    entries.push(PlanEntry {
                        action: PlanAction::Update {
                            resource_id: (*id).clone(),
                        },
                        descriptor: descriptor.clone(),
                    });
                }
            }
        }
    }

    ReconciliationPlan { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn descriptor(name: &str, format: &str, digest: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            name: name.to_owned(),
            format: format.to_owned(),
            description: String::new(),
            digest: if digest.is_empty() {
                None
            } else {
                Some(digest.to_owned())
            },
            upload: None,
        }
    }

    fn resource(id: &str, name: &str, format: &str, hash: &str) -> Resource {
        Resource {
            id: if id.is_empty() {
                None
            } else {
                Some(ResourceId(id.to_owned()))
            },
            name: name.to_owned(),
            format: format.to_owned(),
            hash: hash.to_owned(),
            ..Resource::default()
        }
    }

    #[test]
    fn unknown_key_plans_a_create() {
        let plan = plan(&[descriptor("readings", "CSV", "abc")], &[], false);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].action, PlanAction::Create);
    }

    #[test]
    fn matching_digest_plans_nothing() {
        let plan = plan(
            &[descriptor("readings", "CSV", "abc")],
            &[resource("r1", "readings", "CSV", "abc")],
            false,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn differing_digest_plans_an_update_with_the_target_id() {
        let plan = plan(
            &[descriptor("readings", "CSV", "abc")],
            &[resource("r1", "readings", "CSV", "def")],
            false,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan.entries[0].action,
            PlanAction::Update {
                resource_id: ResourceId("r1".to_owned())
            }
        );
    }

    #[test]
    fn force_updates_even_on_matching_digest() {
        let plan = plan(
            &[descriptor("readings", "CSV", "abc")],
            &[resource("r1", "readings", "CSV", "abc")],
            true,
        );
        assert_eq!(plan.len(), 1);
        assert!(matches!(
            plan.entries[0].action,
            PlanAction::Update { .. }
        ));
    }

    #[rstest]
    #[case("Readings", "csv")]
    #[case("READINGS", "CSV")]
    #[case("readings", "Csv")]
    fn matching_is_case_insensitive(#[case] name: &str, #[case] format: &str) {
        let plan = plan(
            &[descriptor(name, format, "abc")],
            &[resource("r1", "readings", "CSV", "abc")],
            false,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn duplicate_source_keys_keep_the_first() {
        let plan = plan(
            &[
                descriptor("readings", "CSV", "abc"),
                descriptor("Readings", "csv", "def"),
            ],
            &[],
            false,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].descriptor.digest.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_target_hash_always_updates() {
        let plan = plan(
            &[descriptor("readings", "CSV", "abc")],
            &[resource("r1", "readings", "CSV", "")],
            false,
        );
        assert_eq!(plan.len(), 1);
        assert!(matches!(
            plan.entries[0].action,
            PlanAction::Update { .. }
        ));
    }

    #[test]
    fn inactive_target_resources_do_not_match() {
        let mut target = resource("r1", "readings", "CSV", "abc");
        target.state = "deleted".to_owned();
        let plan = plan(&[descriptor("readings", "CSV", "abc")], &[target], false);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].action, PlanAction::Create);
    }

    #[test]
    fn target_resources_without_an_id_do_not_match() {
        let plan = plan(
            &[descriptor("readings", "CSV", "abc")],
            &[resource("", "readings", "CSV", "abc")],
            false,
        );
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.entries[0].action, PlanAction::Create);
    }

    #[test]
    fn empty_source_plans_nothing() {
        let plan = plan(&[], &[resource("r1", "readings", "CSV", "abc")], false);
        assert!(plan.is_empty());
    }
}
