//! Typed rows of the four report kinds.
//!
//! Field order follows the CSV column order of each report. Every record
//! starts with the RFC3339 `analysis_time` of the run that produced it.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use vigil_core::ReportKind;

use crate::RowError;

// ---------------------------------------------------------------------------
// ReportRecord
// ---------------------------------------------------------------------------

/// A record type that can be decoded from one CSV row.
pub trait ReportRecord: Sized {
    /// The report kind these rows come from.
    const KIND: ReportKind;

    /// Decodes one data row.
    ///
    /// # Errors
    ///
    /// [`RowError::Shape`] if the row does not have exactly
    /// `KIND.field_count()` fields, [`RowError::Timestamp`] if the first field
    /// is not an RFC3339 timestamp.
    fn decode(fields: &[&str]) -> Result<Self, RowError>;

    /// Field-by-field equality, ignoring `analysis_time`.
    fn equivalent(&self, other: &Self) -> bool;
}

fn check_shape(fields: &[&str], kind: ReportKind) -> Result<(), RowError> {
    if fields.len() == kind.field_count() {
        Ok(())
    } else {
        Err(RowError::Shape {
            expected: kind.field_count(),
            found: fields.len(),
        })
    }
}

fn parse_analysis_time(value: &str) -> Result<DateTime<FixedOffset>, RowError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| RowError::Timestamp {
        value: value.to_string(),
        source,
    })
}

/// Lenient boolean: the usual spellings of true, anything else is false.
fn parse_flag(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// One row of the `principals` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub analysis_time: DateTime<FixedOffset>,
    pub principal_name: String,
    pub principal_arn: String,
    pub principal_type: String,
    pub principal_is_iam_admin: bool,
    pub principal_last_used: String,
    pub principal_tag_business_unit: String,
    pub principal_tag_environment: String,
    pub principal_tag_used_by: String,
    pub principal_tags: String,
    pub password_last_used: String,
    pub password_last_rotated: String,
    pub password_state: String,
    pub access_key_1_last_used: String,
    pub access_key_1_last_rotated: String,
    pub access_key_1_state: String,
    pub access_key_2_last_used: String,
    pub access_key_2_last_rotated: String,
    pub access_key_2_state: String,
}

impl ReportRecord for Principal {
    const KIND: ReportKind = ReportKind::Principals;

    fn decode(fields: &[&str]) -> Result<Self, RowError> {
        check_shape(fields, Self::KIND)?;
        Ok(Self {
            analysis_time: parse_analysis_time(fields[0])?,
            principal_name: fields[1].to_string(),
            principal_arn: fields[2].to_string(),
            principal_type: fields[3].to_string(),
            principal_is_iam_admin: parse_flag(fields[4]),
            principal_last_used: fields[5].to_string(),
            principal_tag_business_unit: fields[6].to_string(),
            principal_tag_environment: fields[7].to_string(),
            principal_tag_used_by: fields[8].to_string(),
            principal_tags: fields[9].to_string(),
            password_last_used: fields[10].to_string(),
            password_last_rotated: fields[11].to_string(),
            password_state: fields[12].to_string(),
            access_key_1_last_used: fields[13].to_string(),
            access_key_1_last_rotated: fields[14].to_string(),
            access_key_1_state: fields[15].to_string(),
            access_key_2_last_used: fields[16].to_string(),
            access_key_2_last_rotated: fields[17].to_string(),
            access_key_2_state: fields[18].to_string(),
        })
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.principal_name == other.principal_name
            && self.principal_arn == other.principal_arn
            && self.principal_type == other.principal_type
            && self.principal_is_iam_admin == other.principal_is_iam_admin
            && self.principal_last_used == other.principal_last_used
            && self.principal_tag_business_unit == other.principal_tag_business_unit
            && self.principal_tag_environment == other.principal_tag_environment
            && self.principal_tag_used_by == other.principal_tag_used_by
            && self.principal_tags == other.principal_tags
            && self.password_last_used == other.password_last_used
            && self.password_last_rotated == other.password_last_rotated
            && self.password_state == other.password_state
            && self.access_key_1_last_used == other.access_key_1_last_used
            && self.access_key_1_last_rotated == other.access_key_1_last_rotated
            && self.access_key_1_state == other.access_key_1_state
            && self.access_key_2_last_used == other.access_key_2_last_used
            && self.access_key_2_last_rotated == other.access_key_2_last_rotated
            && self.access_key_2_state == other.access_key_2_state
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// One row of the `resources` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub analysis_time: DateTime<FixedOffset>,
    pub resource_name: String,
    pub resource_arn: String,
    pub resource_type: String,
    pub resource_tag_business_unit: String,
    pub resource_tag_environment: String,
    pub resource_tag_owner: String,
    pub resource_tag_confidentiality: String,
    pub resource_tag_integrity: String,
    pub resource_tag_availability: String,
    pub resource_tags: String,
}

impl ReportRecord for Resource {
    const KIND: ReportKind = ReportKind::Resources;

    fn decode(fields: &[&str]) -> Result<Self, RowError> {
        check_shape(fields, Self::KIND)?;
        Ok(Self {
            analysis_time: parse_analysis_time(fields[0])?,
            resource_name: fields[1].to_string(),
            resource_arn: fields[2].to_string(),
            resource_type: fields[3].to_string(),
            resource_tag_business_unit: fields[4].to_string(),
            resource_tag_environment: fields[5].to_string(),
            resource_tag_owner: fields[6].to_string(),
            resource_tag_confidentiality: fields[7].to_string(),
            resource_tag_integrity: fields[8].to_string(),
            resource_tag_availability: fields[9].to_string(),
            resource_tags: fields[10].to_string(),
        })
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.resource_name == other.resource_name
            && self.resource_arn == other.resource_arn
            && self.resource_type == other.resource_type
            && self.resource_tag_business_unit == other.resource_tag_business_unit
            && self.resource_tag_environment == other.resource_tag_environment
            && self.resource_tag_owner == other.resource_tag_owner
            && self.resource_tag_confidentiality == other.resource_tag_confidentiality
            && self.resource_tag_integrity == other.resource_tag_integrity
            && self.resource_tag_availability == other.resource_tag_availability
            && self.resource_tags == other.resource_tags
    }
}

// ---------------------------------------------------------------------------
// PrincipalAccessSummary
// ---------------------------------------------------------------------------

/// One capability grant in the `principal-access-summaries` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalAccessSummary {
    pub analysis_time: DateTime<FixedOffset>,
    pub principal_name: String,
    pub principal_arn: String,
    pub principal_type: String,
    pub principal_tags: String,
    pub service_name: String,
    pub access_capability: String,
    pub resource_arn: String,
}

impl ReportRecord for PrincipalAccessSummary {
    const KIND: ReportKind = ReportKind::PrincipalAccessSummaries;

    fn decode(fields: &[&str]) -> Result<Self, RowError> {
        check_shape(fields, Self::KIND)?;
        Ok(Self {
            analysis_time: parse_analysis_time(fields[0])?,
            principal_name: fields[1].to_string(),
            principal_arn: fields[2].to_string(),
            principal_type: fields[3].to_string(),
            principal_tags: fields[4].to_string(),
            service_name: fields[5].to_string(),
            access_capability: fields[6].to_string(),
            resource_arn: fields[7].to_string(),
        })
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.principal_name == other.principal_name
            && self.principal_arn == other.principal_arn
            && self.principal_type == other.principal_type
            && self.principal_tags == other.principal_tags
            && self.service_name == other.service_name
            && self.access_capability == other.access_capability
            && self.resource_arn == other.resource_arn
    }
}

// ---------------------------------------------------------------------------
// ResourceAccessSummary
// ---------------------------------------------------------------------------

/// One capability grant in the `resource-access-summaries` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccessSummary {
    pub analysis_time: DateTime<FixedOffset>,
    pub service_name: String,
    pub resource_name: String,
    pub resource_arn: String,
    pub access_capability: String,
    pub principal_type: String,
    pub principal_name: String,
    pub principal_arn: String,
    pub resource_tag_confidentiality: String,
}

impl ReportRecord for ResourceAccessSummary {
    const KIND: ReportKind = ReportKind::ResourceAccessSummaries;

    fn decode(fields: &[&str]) -> Result<Self, RowError> {
        check_shape(fields, Self::KIND)?;
        Ok(Self {
            analysis_time: parse_analysis_time(fields[0])?,
            service_name: fields[1].to_string(),
            resource_name: fields[2].to_string(),
            resource_arn: fields[3].to_string(),
            access_capability: fields[4].to_string(),
            principal_type: fields[5].to_string(),
            principal_name: fields[6].to_string(),
            principal_arn: fields[7].to_string(),
            resource_tag_confidentiality: fields[8].to_string(),
        })
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.service_name == other.service_name
            && self.resource_name == other.resource_name
            && self.resource_arn == other.resource_arn
            && self.access_capability == other.access_capability
            && self.principal_type == other.principal_type
            && self.principal_name == other.principal_name
            && self.principal_arn == other.principal_arn
            && self.resource_tag_confidentiality == other.resource_tag_confidentiality
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
