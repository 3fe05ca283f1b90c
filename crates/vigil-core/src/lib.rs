//! Vigil Core -- shared types, snapshot key codec, configuration, and logging.
//!
//! This crate defines the vocabulary used by every other vigil crate: the
//! report kinds and their row shapes, the access capability labels that appear
//! inside access-summary reports, the canonical snapshot key layout, and the
//! process-wide tracing setup.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod keys;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Top-level error type for the vigil-core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An unknown report kind label was supplied.
    #[error("unknown report kind: {0}")]
    UnknownKind(String),

    /// Tracing/logging initialization failed.
    #[error("tracing initialization error: {0}")]
    TracingInit(String),
}

// ---------------------------------------------------------------------------
// Tracing / Logging
// ---------------------------------------------------------------------------

/// Initialize structured tracing with the given verbosity level.
///
/// # Behaviour
///
/// | `verbose` | `quiet` | `json_output` | Effect                                  |
/// |-----------|---------|---------------|-----------------------------------------|
/// | `true`    | _       | _             | DEBUG level                             |
/// | _         | `true`  | _             | ERROR level only                        |
/// | `false`   | `false` | _             | INFO level (default)                    |
/// | _         | _       | `true`        | JSON-formatted log lines                |
/// | _         | _       | `false`       | Human-readable, compact log lines       |
///
/// Log lines go to stderr; stdout is reserved for rendered report data.
/// `RUST_LOG`, when set, takes precedence over the flag-derived level.
///
/// # Errors
///
/// Returns [`CoreError::TracingInit`] if the global subscriber has already been
/// set (i.e. this function was called more than once in the same process).
pub fn init_tracing(verbose: bool, quiet: bool, json_output: bool) -> Result<(), CoreError> {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_output {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| CoreError::TracingInit(e.to_string()))
    } else {
        fmt()
            .compact()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .map_err(|e| CoreError::TracingInit(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ReportKind
// ---------------------------------------------------------------------------

/// The four decodable report kinds produced by one analysis run.
///
/// The label is the leading `kind` field of the snapshot file name; the field
/// count is part of the wire contract for the CSV rows of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    /// IAM principals and their credential state.
    Principals,
    /// Resources and their classification tags.
    Resources,
    /// Per-principal access to resources, one row per capability grant.
    PrincipalAccessSummaries,
    /// Per-resource access by principals, one row per capability grant.
    ResourceAccessSummaries,
}

impl ReportKind {
    /// Returns the file-name label for this kind (e.g. `principals`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Principals => "principals",
            Self::Resources => "resources",
            Self::PrincipalAccessSummaries => "principal-access-summaries",
            Self::ResourceAccessSummaries => "resource-access-summaries",
        }
    }

    /// Returns the exact number of fields in one data row of this kind.
    #[must_use]
    pub const fn field_count(self) -> usize {
        match self {
            Self::Principals => 19,
            Self::Resources => 11,
            Self::PrincipalAccessSummaries => 8,
            Self::ResourceAccessSummaries => 9,
        }
    }

    /// Looks up a kind by its file-name label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.label() == label)
    }

    /// Returns all kinds in a stable order.
    #[must_use]
    pub const fn all() -> &'static [ReportKind] {
        &[
            Self::Principals,
            Self::Resources,
            Self::PrincipalAccessSummaries,
            Self::ResourceAccessSummaries,
        ]
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ReportKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AccessCapability
// ---------------------------------------------------------------------------

/// Access capability labels found in the `access_capability` column of the
/// access-summary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessCapability {
    /// Full administrative control of the resource.
    AdministerResource,
    /// Delete data held by the resource.
    DeleteData,
    /// Read the resource configuration.
    ReadConfig,
    /// Read data held by the resource.
    ReadData,
    /// Write data held by the resource.
    WriteData,
}

impl AccessCapability {
    /// Returns the report label for this capability.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AdministerResource => "administer-resource",
            Self::DeleteData => "delete-data",
            Self::ReadConfig => "read-config",
            Self::ReadData => "read-data",
            Self::WriteData => "write-data",
        }
    }

    /// Looks up a capability by its report label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.label() == label)
    }

    /// Returns all capabilities in label order.
    #[must_use]
    pub const fn all() -> &'static [AccessCapability] {
        &[
            Self::AdministerResource,
            Self::DeleteData,
            Self::ReadConfig,
            Self::ReadData,
            Self::WriteData,
        ]
    }
}

impl fmt::Display for AccessCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ReportKind tests ---------------------------------------------------

    #[test]
    fn report_kind_labels() {
        assert_eq!(ReportKind::Principals.label(), "principals");
        assert_eq!(ReportKind::Resources.label(), "resources");
        assert_eq!(
            ReportKind::PrincipalAccessSummaries.label(),
            "principal-access-summaries"
        );
        assert_eq!(
            ReportKind::ResourceAccessSummaries.label(),
            "resource-access-summaries"
        );
    }

    #[test]
    fn report_kind_field_counts() {
        assert_eq!(ReportKind::Principals.field_count(), 19);
        assert_eq!(ReportKind::Resources.field_count(), 11);
        assert_eq!(ReportKind::PrincipalAccessSummaries.field_count(), 8);
        assert_eq!(ReportKind::ResourceAccessSummaries.field_count(), 9);
    }

    #[test]
    fn report_kind_from_label_round_trips() {
        for kind in ReportKind::all() {
            assert_eq!(ReportKind::from_label(kind.label()), Some(*kind));
        }
        assert_eq!(ReportKind::from_label("resource-access-audit"), None);
        assert_eq!(ReportKind::from_label("Principals"), None);
    }

    #[test]
    fn report_kind_from_str_rejects_unknown() {
        let err = "bogus".parse::<ReportKind>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownKind(ref s) if s == "bogus"));
        assert_eq!(
            "resources".parse::<ReportKind>().unwrap(),
            ReportKind::Resources
        );
    }

    #[test]
    fn report_kind_serde_uses_labels() {
        let json = serde_json::to_string(&ReportKind::PrincipalAccessSummaries).unwrap();
        assert_eq!(json, "\"principal-access-summaries\"");
    }

    // -- AccessCapability tests ---------------------------------------------

    #[test]
    fn access_capability_labels() {
        let labels: Vec<&str> = AccessCapability::all().iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "administer-resource",
                "delete-data",
                "read-config",
                "read-data",
                "write-data"
            ]
        );
        assert_eq!(
            AccessCapability::from_label("write-data"),
            Some(AccessCapability::WriteData)
        );
        assert_eq!(AccessCapability::from_label("write"), None);
    }

    // -- Tracing tests ------------------------------------------------------

    #[test]
    fn init_tracing_returns_error_on_double_init() {
        // The first call may or may not succeed depending on test ordering.
        let _ = init_tracing(false, true, false);
        let second = init_tracing(false, true, false);
        assert!(matches!(second, Err(CoreError::TracingInit(_))));
    }
}
