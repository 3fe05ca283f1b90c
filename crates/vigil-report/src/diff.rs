//! Snapshot diffs for principal and resource reports.
//!
//! Two snapshots of the same kind are correlated by ARN. A difference row
//! carries the ARN, the change type, then every other field twice: once as it
//! was (`before_*`) and once as it is (`after_*`). Columns that do not apply
//! are `None`, which renders as an empty CSV cell.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::records::{Principal, ReportRecord, Resource};

/// How an entity changed between the target snapshot and the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Deleted,
    Changed,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Changed => "changed",
        };
        f.write_str(label)
    }
}

/// Returns `(before, after)` when the two values differ, `(None, None)` otherwise.
fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> (Option<T>, Option<T>) {
    if before == after {
        (None, None)
    } else {
        (Some(before.clone()), Some(after.clone()))
    }
}

// ---------------------------------------------------------------------------
// Diffable
// ---------------------------------------------------------------------------

/// A record type that can be correlated and compared across snapshots.
pub trait Diffable: ReportRecord {
    type Difference: Serialize;

    /// The identifier matching the same entity across snapshots.
    fn correlation_key(&self) -> &str;

    /// All of `self` in the `after_*` columns.
    fn added_diff(&self) -> Self::Difference;

    /// All of `self` in the `before_*` columns.
    fn deleted_diff(&self) -> Self::Difference;

    /// Only the fields that differ, `original` before and `self` after. The
    /// correlation keys are not checked.
    fn changed_diff(&self, original: &Self) -> Self::Difference;

    /// Like [`Diffable::changed_diff`], for two versions of the same entity.
    ///
    /// # Panics
    ///
    /// If the correlation keys differ. Comparing two different entities is a
    /// caller bug.
    fn diff(&self, original: &Self) -> Self::Difference {
        assert!(
            self.correlation_key() == original.correlation_key(),
            "comparing two different {} records: {} vs {}",
            Self::KIND,
            self.correlation_key(),
            original.correlation_key()
        );
        self.changed_diff(original)
    }
}

/// Diffs `latest` against the older `target` snapshot by correlation key.
///
/// Rows come out in `latest` order (added and changed), followed by the
/// entities only `target` has (deleted) in `target` order. Equivalent
/// entities produce nothing.
#[must_use]
pub fn diff_records<R: Diffable>(latest: &[R], target: &[R]) -> Vec<R::Difference> {
    diff_records_by(latest, target, R::correlation_key)
}

/// [`diff_records`] with a caller-chosen correlation key.
///
/// When `target` has duplicate keys the last one wins.
///
/// # Panics
///
/// If `key` pairs two records whose correlation keys differ (see
/// [`Diffable::diff`]).
pub fn diff_records_by<'a, R, K, F>(latest: &'a [R], target: &'a [R], key: F) -> Vec<R::Difference>
where
    R: Diffable,
    K: Eq + Hash,
    F: Fn(&'a R) -> K,
{
    let lookup: HashMap<K, &R> = target.iter().map(|r| (key(r), r)).collect();
    let mut seen = HashSet::with_capacity(latest.len());
    let mut diffs = Vec::new();

    for record in latest {
        let k = key(record);
        match lookup.get(&k) {
            None => diffs.push(record.added_diff()),
            Some(original) if !record.equivalent(original) => {
                diffs.push(record.diff(original));
            }
            Some(_) => {}
        }
        seen.insert(k);
    }

    for record in target {
        if !seen.contains(&key(record)) {
            diffs.push(record.deleted_diff());
        }
    }

    diffs
}

// ---------------------------------------------------------------------------
// PrincipalDifference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalDifference {
    #[serde(rename = "type")]
    pub change: DiffKind,
    pub principal_arn: String,
    pub before_principal_name: Option<String>,
    pub before_principal_type: Option<String>,
    pub before_principal_is_iam_admin: Option<bool>,
    pub before_principal_last_used: Option<String>,
    pub before_principal_tag_business_unit: Option<String>,
    pub before_principal_tag_environment: Option<String>,
    pub before_principal_tag_used_by: Option<String>,
    pub before_principal_tags: Option<String>,
    pub before_password_last_used: Option<String>,
    pub before_password_last_rotated: Option<String>,
    pub before_password_state: Option<String>,
    pub before_access_key_1_last_used: Option<String>,
    pub before_access_key_1_last_rotated: Option<String>,
    pub before_access_key_1_state: Option<String>,
    pub before_access_key_2_last_used: Option<String>,
    pub before_access_key_2_last_rotated: Option<String>,
    pub before_access_key_2_state: Option<String>,
    pub after_principal_name: Option<String>,
    pub after_principal_type: Option<String>,
    pub after_principal_is_iam_admin: Option<bool>,
    pub after_principal_last_used: Option<String>,
    pub after_principal_tag_business_unit: Option<String>,
    pub after_principal_tag_environment: Option<String>,
    pub after_principal_tag_used_by: Option<String>,
    pub after_principal_tags: Option<String>,
    pub after_password_last_used: Option<String>,
    pub after_password_last_rotated: Option<String>,
    pub after_password_state: Option<String>,
    pub after_access_key_1_last_used: Option<String>,
    pub after_access_key_1_last_rotated: Option<String>,
    pub after_access_key_1_state: Option<String>,
    pub after_access_key_2_last_used: Option<String>,
    pub after_access_key_2_last_rotated: Option<String>,
    pub after_access_key_2_state: Option<String>,
}

impl PrincipalDifference {
    fn empty(change: DiffKind, principal_arn: &str) -> Self {
        Self {
            change,
            principal_arn: principal_arn.to_string(),
            before_principal_name: None,
            before_principal_type: None,
            before_principal_is_iam_admin: None,
            before_principal_last_used: None,
            before_principal_tag_business_unit: None,
            before_principal_tag_environment: None,
            before_principal_tag_used_by: None,
            before_principal_tags: None,
            before_password_last_used: None,
            before_password_last_rotated: None,
            before_password_state: None,
            before_access_key_1_last_used: None,
            before_access_key_1_last_rotated: None,
            before_access_key_1_state: None,
            before_access_key_2_last_used: None,
            before_access_key_2_last_rotated: None,
            before_access_key_2_state: None,
            after_principal_name: None,
            after_principal_type: None,
            after_principal_is_iam_admin: None,
            after_principal_last_used: None,
            after_principal_tag_business_unit: None,
            after_principal_tag_environment: None,
            after_principal_tag_used_by: None,
            after_principal_tags: None,
            after_password_last_used: None,
            after_password_last_rotated: None,
            after_password_state: None,
            after_access_key_1_last_used: None,
            after_access_key_1_last_rotated: None,
            after_access_key_1_state: None,
            after_access_key_2_last_used: None,
            after_access_key_2_last_rotated: None,
            after_access_key_2_state: None,
        }
    }
}

impl Diffable for Principal {
    type Difference = PrincipalDifference;

    fn correlation_key(&self) -> &str {
        &self.principal_arn
    }

    fn added_diff(&self) -> PrincipalDifference {
        PrincipalDifference {
            after_principal_name: Some(self.principal_name.clone()),
            after_principal_type: Some(self.principal_type.clone()),
            after_principal_is_iam_admin: Some(self.principal_is_iam_admin),
            after_principal_last_used: Some(self.principal_last_used.clone()),
            after_principal_tag_business_unit: Some(self.principal_tag_business_unit.clone()),
            after_principal_tag_environment: Some(self.principal_tag_environment.clone()),
            after_principal_tag_used_by: Some(self.principal_tag_used_by.clone()),
            after_principal_tags: Some(self.principal_tags.clone()),
            after_password_last_used: Some(self.password_last_used.clone()),
            after_password_last_rotated: Some(self.password_last_rotated.clone()),
            after_password_state: Some(self.password_state.clone()),
            after_access_key_1_last_used: Some(self.access_key_1_last_used.clone()),
            after_access_key_1_last_rotated: Some(self.access_key_1_last_rotated.clone()),
            after_access_key_1_state: Some(self.access_key_1_state.clone()),
            after_access_key_2_last_used: Some(self.access_key_2_last_used.clone()),
            after_access_key_2_last_rotated: Some(self.access_key_2_last_rotated.clone()),
            after_access_key_2_state: Some(self.access_key_2_state.clone()),
            ..PrincipalDifference::empty(DiffKind::Added, &self.principal_arn)
        }
    }

    fn deleted_diff(&self) -> PrincipalDifference {
        PrincipalDifference {
            before_principal_name: Some(self.principal_name.clone()),
            before_principal_type: Some(self.principal_type.clone()),
            before_principal_is_iam_admin: Some(self.principal_is_iam_admin),
            before_principal_last_used: Some(self.principal_last_used.clone()),
            before_principal_tag_business_unit: Some(self.principal_tag_business_unit.clone()),
            before_principal_tag_environment: Some(self.principal_tag_environment.clone()),
            before_principal_tag_used_by: Some(self.principal_tag_used_by.clone()),
            before_principal_tags: Some(self.principal_tags.clone()),
            before_password_last_used: Some(self.password_last_used.clone()),
            before_password_last_rotated: Some(self.password_last_rotated.clone()),
            before_password_state: Some(self.password_state.clone()),
            before_access_key_1_last_used: Some(self.access_key_1_last_used.clone()),
            before_access_key_1_last_rotated: Some(self.access_key_1_last_rotated.clone()),
            before_access_key_1_state: Some(self.access_key_1_state.clone()),
            before_access_key_2_last_used: Some(self.access_key_2_last_used.clone()),
            before_access_key_2_last_rotated: Some(self.access_key_2_last_rotated.clone()),
            before_access_key_2_state: Some(self.access_key_2_state.clone()),
            ..PrincipalDifference::empty(DiffKind::Deleted, &self.principal_arn)
        }
    }

    fn changed_diff(&self, original: &Self) -> PrincipalDifference {
        let mut d = PrincipalDifference::empty(DiffKind::Changed, &self.principal_arn);
        (d.before_principal_name, d.after_principal_name) =
            changed(&original.principal_name, &self.principal_name);
        (d.before_principal_type, d.after_principal_type) =
            changed(&original.principal_type, &self.principal_type);
        (d.before_principal_is_iam_admin, d.after_principal_is_iam_admin) =
            changed(&original.principal_is_iam_admin, &self.principal_is_iam_admin);
        (d.before_principal_last_used, d.after_principal_last_used) =
            changed(&original.principal_last_used, &self.principal_last_used);
        (d.before_principal_tag_business_unit, d.after_principal_tag_business_unit) = changed(
            &original.principal_tag_business_unit,
            &self.principal_tag_business_unit,
        );
        (d.before_principal_tag_environment, d.after_principal_tag_environment) = changed(
            &original.principal_tag_environment,
            &self.principal_tag_environment,
        );
        (d.before_principal_tag_used_by, d.after_principal_tag_used_by) =
            changed(&original.principal_tag_used_by, &self.principal_tag_used_by);
        (d.before_principal_tags, d.after_principal_tags) =
            changed(&original.principal_tags, &self.principal_tags);
        (d.before_password_last_used, d.after_password_last_used) =
            changed(&original.password_last_used, &self.password_last_used);
        (d.before_password_last_rotated, d.after_password_last_rotated) =
            changed(&original.password_last_rotated, &self.password_last_rotated);
        (d.before_password_state, d.after_password_state) =
            changed(&original.password_state, &self.password_state);
        (d.before_access_key_1_last_used, d.after_access_key_1_last_used) =
            changed(&original.access_key_1_last_used, &self.access_key_1_last_used);
        (d.before_access_key_1_last_rotated, d.after_access_key_1_last_rotated) = changed(
            &original.access_key_1_last_rotated,
            &self.access_key_1_last_rotated,
        );
        (d.before_access_key_1_state, d.after_access_key_1_state) =
            changed(&original.access_key_1_state, &self.access_key_1_state);
        (d.before_access_key_2_last_used, d.after_access_key_2_last_used) =
            changed(&original.access_key_2_last_used, &self.access_key_2_last_used);
        (d.before_access_key_2_last_rotated, d.after_access_key_2_last_rotated) = changed(
            &original.access_key_2_last_rotated,
            &self.access_key_2_last_rotated,
        );
        (d.before_access_key_2_state, d.after_access_key_2_state) =
            changed(&original.access_key_2_state, &self.access_key_2_state);
        d
    }
}

// ---------------------------------------------------------------------------
// ResourceDifference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDifference {
    #[serde(rename = "type")]
    pub change: DiffKind,
    pub resource_arn: String,
    pub before_resource_name: Option<String>,
    pub before_resource_type: Option<String>,
    pub before_resource_tag_business_unit: Option<String>,
    pub before_resource_tag_environment: Option<String>,
    pub before_resource_tag_owner: Option<String>,
    pub before_resource_tag_confidentiality: Option<String>,
    pub before_resource_tag_integrity: Option<String>,
    pub before_resource_tag_availability: Option<String>,
    pub before_resource_tags: Option<String>,
    pub after_resource_name: Option<String>,
    pub after_resource_type: Option<String>,
    pub after_resource_tag_business_unit: Option<String>,
    pub after_resource_tag_environment: Option<String>,
    pub after_resource_tag_owner: Option<String>,
    pub after_resource_tag_confidentiality: Option<String>,
    pub after_resource_tag_integrity: Option<String>,
    pub after_resource_tag_availability: Option<String>,
    pub after_resource_tags: Option<String>,
}

impl ResourceDifference {
    fn empty(change: DiffKind, resource_arn: &str) -> Self {
        Self {
            change,
            resource_arn: resource_arn.to_string(),
            before_resource_name: None,
            before_resource_type: None,
            before_resource_tag_business_unit: None,
            before_resource_tag_environment: None,
            before_resource_tag_owner: None,
            before_resource_tag_confidentiality: None,
            before_resource_tag_integrity: None,
            before_resource_tag_availability: None,
            before_resource_tags: None,
            after_resource_name: None,
            after_resource_type: None,
            after_resource_tag_business_unit: None,
            after_resource_tag_environment: None,
            after_resource_tag_owner: None,
            after_resource_tag_confidentiality: None,
            after_resource_tag_integrity: None,
            after_resource_tag_availability: None,
            after_resource_tags: None,
        }
    }
}

impl Diffable for Resource {
    type Difference = ResourceDifference;

    fn correlation_key(&self) -> &str {
        &self.resource_arn
    }

    fn added_diff(&self) -> ResourceDifference {
        ResourceDifference {
            after_resource_name: Some(self.resource_name.clone()),
            after_resource_type: Some(self.resource_type.clone()),
            after_resource_tag_business_unit: Some(self.resource_tag_business_unit.clone()),
            after_resource_tag_environment: Some(self.resource_tag_environment.clone()),
            after_resource_tag_owner: Some(self.resource_tag_owner.clone()),
            after_resource_tag_confidentiality: Some(self.resource_tag_confidentiality.clone()),
            after_resource_tag_integrity: Some(self.resource_tag_integrity.clone()),
            after_resource_tag_availability: Some(self.resource_tag_availability.clone()),
            after_resource_tags: Some(self.resource_tags.clone()),
            ..ResourceDifference::empty(DiffKind::Added, &self.resource_arn)
        }
    }

    fn deleted_diff(&self) -> ResourceDifference {
        ResourceDifference {
            before_resource_name: Some(self.resource_name.clone()),
            before_resource_type: Some(self.resource_type.clone()),
            before_resource_tag_business_unit: Some(self.resource_tag_business_unit.clone()),
            before_resource_tag_environment: Some(self.resource_tag_environment.clone()),
            before_resource_tag_owner: Some(self.resource_tag_owner.clone()),
            before_resource_tag_confidentiality: Some(self.resource_tag_confidentiality.clone()),
            before_resource_tag_integrity: Some(self.resource_tag_integrity.clone()),
            before_resource_tag_availability: Some(self.resource_tag_availability.clone()),
            before_resource_tags: Some(self.resource_tags.clone()),
            ..ResourceDifference::empty(DiffKind::Deleted, &self.resource_arn)
        }
    }

    fn changed_diff(&self, original: &Self) -> ResourceDifference {
        let mut d = ResourceDifference::empty(DiffKind::Changed, &self.resource_arn);
        (d.before_resource_name, d.after_resource_name) =
            changed(&original.resource_name, &self.resource_name);
        (d.before_resource_type, d.after_resource_type) =
            changed(&original.resource_type, &self.resource_type);
        (d.before_resource_tag_business_unit, d.after_resource_tag_business_unit) = changed(
            &original.resource_tag_business_unit,
            &self.resource_tag_business_unit,
        );
        (d.before_resource_tag_environment, d.after_resource_tag_environment) = changed(
            &original.resource_tag_environment,
            &self.resource_tag_environment,
        );
        (d.before_resource_tag_owner, d.after_resource_tag_owner) =
            changed(&original.resource_tag_owner, &self.resource_tag_owner);
        (d.before_resource_tag_confidentiality, d.after_resource_tag_confidentiality) = changed(
            &original.resource_tag_confidentiality,
            &self.resource_tag_confidentiality,
        );
        (d.before_resource_tag_integrity, d.after_resource_tag_integrity) =
            changed(&original.resource_tag_integrity, &self.resource_tag_integrity);
        (d.before_resource_tag_availability, d.after_resource_tag_availability) = changed(
            &original.resource_tag_availability,
            &self.resource_tag_availability,
        );
        (d.before_resource_tags, d.after_resource_tags) =
            changed(&original.resource_tags, &self.resource_tags);
        d
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
