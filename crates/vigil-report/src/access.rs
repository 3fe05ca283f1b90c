//! Access-summary groupings and the risk policies evaluated over them.
//!
//! The access-summary reports have one row per capability grant. Risk queries
//! regroup those rows per principal or per resource, keyed by capability
//! label, and count the grants against a policy's caps.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use vigil_core::AccessCapability;

use crate::records::{Principal, PrincipalAccessSummary, ResourceAccessSummary};

const DEFAULT_CAP: usize = 5;

// ---------------------------------------------------------------------------
// Grouped views
// ---------------------------------------------------------------------------

/// A resource reachable by a principal through one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRef {
    pub resource_arn: String,
    pub service_name: String,
}

/// A principal holding one capability on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalRef {
    pub principal_arn: String,
    pub principal_name: String,
    pub principal_type: String,
}

/// Every grant one principal holds, grouped by capability label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalAccess {
    pub principal_arn: String,
    pub principal_name: String,
    pub principal_type: String,
    pub resources_by_capability: BTreeMap<String, Vec<ResourceRef>>,
}

impl PrincipalAccess {
    #[must_use]
    pub fn count(&self, capability: AccessCapability) -> usize {
        self.resources_by_capability
            .get(capability.label())
            .map_or(0, Vec::len)
    }
}

/// Every grant on one resource, grouped by capability label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAccess {
    pub service_name: String,
    pub resource_name: String,
    pub resource_arn: String,
    pub principals_by_capability: BTreeMap<String, Vec<PrincipalRef>>,
}

impl ResourceAccess {
    #[must_use]
    pub fn count(&self, capability: AccessCapability) -> usize {
        self.principals_by_capability
            .get(capability.label())
            .map_or(0, Vec::len)
    }
}

/// Groups principal-access rows by principal ARN, keeping only rows whose
/// service is in `services`. Groups come out in first-seen order.
#[must_use]
pub fn group_by_principal(
    items: &[PrincipalAccessSummary],
    services: &[String],
) -> Vec<PrincipalAccess> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<PrincipalAccess> = Vec::new();

    for item in items {
        if !services.iter().any(|s| *s == item.service_name) {
            debug!(service = %item.service_name, arn = %item.principal_arn, "skipping access row");
            continue;
        }
        let slot = *index.entry(item.principal_arn.as_str()).or_insert_with(|| {
            groups.push(PrincipalAccess {
                principal_arn: item.principal_arn.clone(),
                principal_name: item.principal_name.clone(),
                principal_type: item.principal_type.clone(),
                resources_by_capability: BTreeMap::new(),
            });
            groups.len() - 1
        });
        groups[slot]
            .resources_by_capability
            .entry(item.access_capability.clone())
            .or_default()
            .push(ResourceRef {
                resource_arn: item.resource_arn.clone(),
                service_name: item.service_name.clone(),
            });
    }

    groups
}

/// Groups resource-access rows by resource ARN, keeping only rows whose
/// service is in `services`. Groups come out in first-seen order.
#[must_use]
pub fn group_by_resource(
    items: &[ResourceAccessSummary],
    services: &[String],
) -> Vec<ResourceAccess> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ResourceAccess> = Vec::new();

    for item in items {
        if !services.iter().any(|s| *s == item.service_name) {
            debug!(service = %item.service_name, arn = %item.resource_arn, "skipping access row");
            continue;
        }
        let slot = *index.entry(item.resource_arn.as_str()).or_insert_with(|| {
            groups.push(ResourceAccess {
                service_name: item.service_name.clone(),
                resource_name: item.resource_name.clone(),
                resource_arn: item.resource_arn.clone(),
                principals_by_capability: BTreeMap::new(),
            });
            groups.len() - 1
        });
        groups[slot]
            .principals_by_capability
            .entry(item.access_capability.clone())
            .or_default()
            .push(PrincipalRef {
                principal_arn: item.principal_arn.clone(),
                principal_name: item.principal_name.clone(),
                principal_type: item.principal_type.clone(),
            });
    }

    groups
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Caps on how much a single principal may reach.
///
/// Only the admin cap is enforced; `rwd_cap` is carried for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityLimitPolicy {
    pub admin_cap: usize,
    pub rwd_cap: usize,
}

impl Default for CapabilityLimitPolicy {
    fn default() -> Self {
        Self {
            admin_cap: DEFAULT_CAP,
            rwd_cap: DEFAULT_CAP,
        }
    }
}

impl CapabilityLimitPolicy {
    #[must_use]
    pub fn is_compliant(&self, access: &PrincipalAccess) -> bool {
        access.count(AccessCapability::AdministerResource) <= self.admin_cap
    }
}

/// Caps on how many principals may hold each capability on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessibilityPolicy {
    pub admin_cap: usize,
    pub read_cap: usize,
    pub write_cap: usize,
    pub delete_cap: usize,
}

impl Default for AccessibilityPolicy {
    fn default() -> Self {
        Self {
            admin_cap: DEFAULT_CAP,
            read_cap: DEFAULT_CAP,
            write_cap: DEFAULT_CAP,
            delete_cap: DEFAULT_CAP,
        }
    }
}

impl AccessibilityPolicy {
    #[must_use]
    pub fn is_compliant(&self, access: &ResourceAccess) -> bool {
        access.count(AccessCapability::AdministerResource) <= self.admin_cap
            && access.count(AccessCapability::ReadData) <= self.read_cap
            && access.count(AccessCapability::WriteData) <= self.write_cap
            && access.count(AccessCapability::DeleteData) <= self.delete_cap
    }
}

/// Principals that exceed `policy`.
#[must_use]
pub fn over_permissioned_principals(
    items: &[PrincipalAccessSummary],
    services: &[String],
    policy: &CapabilityLimitPolicy,
) -> Vec<PrincipalAccess> {
    group_by_principal(items, services)
        .into_iter()
        .filter(|access| !policy.is_compliant(access))
        .collect()
}

/// Resources that exceed `policy`.
#[must_use]
pub fn over_accessible_resources(
    items: &[ResourceAccessSummary],
    services: &[String],
    policy: &AccessibilityPolicy,
) -> Vec<ResourceAccess> {
    group_by_resource(items, services)
        .into_iter()
        .filter(|access| !policy.is_compliant(access))
        .collect()
}

/// Principals flagged as IAM administrators.
#[must_use]
pub fn privilege_escalation(principals: &[Principal]) -> Vec<&Principal> {
    principals
        .iter()
        .filter(|p| p.principal_is_iam_admin)
        .collect()
}

// ---------------------------------------------------------------------------
// Flat rows
// ---------------------------------------------------------------------------

/// Per-capability grant counts for one principal; the CSV form of
/// [`PrincipalAccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalAccessCounts {
    pub principal_arn: String,
    pub principal_name: String,
    pub principal_type: String,
    pub administer_resource: usize,
    pub delete_data: usize,
    pub read_config: usize,
    pub read_data: usize,
    pub write_data: usize,
}

impl From<&PrincipalAccess> for PrincipalAccessCounts {
    fn from(access: &PrincipalAccess) -> Self {
        Self {
            principal_arn: access.principal_arn.clone(),
            principal_name: access.principal_name.clone(),
            principal_type: access.principal_type.clone(),
            administer_resource: access.count(AccessCapability::AdministerResource),
            delete_data: access.count(AccessCapability::DeleteData),
            read_config: access.count(AccessCapability::ReadConfig),
            read_data: access.count(AccessCapability::ReadData),
            write_data: access.count(AccessCapability::WriteData),
        }
    }
}

/// Per-capability principal counts for one resource; the CSV form of
/// [`ResourceAccess`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAccessCounts {
    pub service_name: String,
    pub resource_name: String,
    pub resource_arn: String,
    pub administer_resource: usize,
    pub delete_data: usize,
    pub read_config: usize,
    pub read_data: usize,
    pub write_data: usize,
}

impl From<&ResourceAccess> for ResourceAccessCounts {
    fn from(access: &ResourceAccess) -> Self {
        Self {
            service_name: access.service_name.clone(),
            resource_name: access.resource_name.clone(),
            resource_arn: access.resource_arn.clone(),
            administer_resource: access.count(AccessCapability::AdministerResource),
            delete_data: access.count(AccessCapability::DeleteData),
            read_config: access.count(AccessCapability::ReadConfig),
            read_data: access.count(AccessCapability::ReadData),
            write_data: access.count(AccessCapability::WriteData),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ReportRecord;

    const T: &str = "2021-06-11T20:54:08Z";

    fn grant(principal: &str, service: &str, capability: &str, resource: &str) -> PrincipalAccessSummary {
        PrincipalAccessSummary::decode(&[
            T, principal, principal, "IAMRole", "", service, capability, resource,
        ])
        .unwrap()
    }

    fn holder(resource: &str, service: &str, capability: &str, principal: &str) -> ResourceAccessSummary {
        ResourceAccessSummary::decode(&[
            T, service, resource, resource, capability, "IAMUser", principal, principal, "",
        ])
        .unwrap()
    }

    fn services(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    // -- grouping tests -----------------------------------------------------

    #[test]
    fn groups_grants_per_principal() {
        let items = vec![
            grant("role/a", "s3", "read-data", "bucket-1"),
            grant("role/b", "s3", "read-data", "bucket-1"),
            grant("role/a", "s3", "read-data", "bucket-2"),
            grant("role/a", "kms", "administer-resource", "key-1"),
            grant("role/a", "s3", "write-data", "bucket-1"),
        ];
        let groups = group_by_principal(&items, &services(&["s3"]));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].principal_arn, "role/a");
        assert_eq!(groups[0].count(AccessCapability::ReadData), 2);
        assert_eq!(groups[0].count(AccessCapability::WriteData), 1);
        assert_eq!(groups[0].count(AccessCapability::AdministerResource), 0);
        assert_eq!(groups[1].principal_arn, "role/b");
    }

    #[test]
    fn service_filter_excludes_everything_unlisted() {
        let items = vec![grant("role/a", "kms", "read-data", "key-1")];
        assert!(group_by_principal(&items, &services(&["s3"])).is_empty());
        assert!(group_by_principal(&items, &[]).is_empty());
    }

    #[test]
    fn groups_holders_per_resource() {
        let items = vec![
            holder("bucket-1", "s3", "read-data", "user/x"),
            holder("bucket-1", "s3", "read-data", "user/y"),
            holder("bucket-2", "s3", "delete-data", "user/x"),
        ];
        let groups = group_by_resource(&items, &services(&["s3"]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].count(AccessCapability::ReadData), 2);
        assert_eq!(
            groups[0].principals_by_capability["read-data"][1].principal_arn,
            "user/y"
        );
        assert_eq!(groups[1].count(AccessCapability::DeleteData), 1);
    }

    // -- policy tests -------------------------------------------------------

    #[test]
    fn admin_cap_flags_principals() {
        let items: Vec<_> = (0..3)
            .map(|i| grant("role/admin", "s3", "administer-resource", &format!("bucket-{i}")))
            .chain([grant("role/reader", "s3", "read-data", "bucket-0")])
            .collect();
        let policy = CapabilityLimitPolicy {
            admin_cap: 2,
            rwd_cap: 0,
        };
        let flagged = over_permissioned_principals(&items, &services(&["s3"]), &policy);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].principal_arn, "role/admin");

        let relaxed = CapabilityLimitPolicy::default();
        assert!(over_permissioned_principals(&items, &services(&["s3"]), &relaxed).is_empty());
    }

    #[test]
    fn any_exceeded_cap_flags_resource() {
        let items: Vec<_> = (0..2)
            .map(|i| holder("bucket-1", "s3", "write-data", &format!("user/{i}")))
            .chain([holder("bucket-2", "s3", "write-data", "user/0")])
            .collect();
        let policy = AccessibilityPolicy {
            write_cap: 1,
            ..AccessibilityPolicy::default()
        };
        let flagged = over_accessible_resources(&items, &services(&["s3"]), &policy);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].resource_arn, "bucket-1");
    }

    #[test]
    fn privilege_escalation_selects_iam_admins() {
        let mut admin = vec![T, "root", "arn:admin", "IAMUser", "true"];
        admin.extend(std::iter::repeat("").take(14));
        let mut plain = vec![T, "dev", "arn:dev", "IAMUser", "false"];
        plain.extend(std::iter::repeat("").take(14));
        let principals = vec![
            Principal::decode(&plain).unwrap(),
            Principal::decode(&admin).unwrap(),
        ];
        let flagged = privilege_escalation(&principals);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].principal_arn, "arn:admin");
    }

    // -- flattening tests ---------------------------------------------------

    #[test]
    fn counts_rows_flatten_groups() {
        let items = vec![
            grant("role/a", "s3", "read-data", "b1"),
            grant("role/a", "s3", "read-config", "b1"),
            grant("role/a", "s3", "read-config", "b2"),
        ];
        let groups = group_by_principal(&items, &services(&["s3"]));
        let row = PrincipalAccessCounts::from(&groups[0]);
        assert_eq!(row.read_data, 1);
        assert_eq!(row.read_config, 2);
        assert_eq!(row.administer_resource, 0);

        let json = serde_json::to_value(&groups[0]).unwrap();
        assert_eq!(json["resources_by_capability"]["read-config"][1]["resource_arn"], "b2");
    }
}
