//! Vigil Report -- typed report records, CSV decoding, snapshot diffs, and
//! access summaries.
//!
//! Report loading is strict: one structurally invalid row fails the whole
//! load. Diffing correlates two decoded snapshots of the same kind by ARN.

pub mod access;
pub mod codec;
pub mod diff;
pub mod records;

pub use codec::load_report;
pub use diff::{
    diff_records, diff_records_by, DiffKind, Diffable, PrincipalDifference, ResourceDifference,
};
pub use records::{
    Principal, PrincipalAccessSummary, ReportRecord, Resource, ResourceAccessSummary,
};

use vigil_core::ReportKind;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures that abort a report load.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A data row does not have the field count of its kind.
    #[error("invalid {kind} record on line {line}: expected {expected} fields, found {found}")]
    InvalidRecordShape {
        kind: ReportKind,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// The leading analysis timestamp is not RFC3339.
    #[error("invalid analysis_time '{value}' in {kind} record on line {line}: {source}")]
    Timestamp {
        kind: ReportKind,
        line: u64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// The input is not well-formed CSV.
    #[error("malformed {kind} report: {source}")]
    Csv {
        kind: ReportKind,
        #[source]
        source: csv::Error,
    },
}

/// A row-level decode failure, before the codec attaches the line number.
#[derive(Debug)]
pub enum RowError {
    Shape { expected: usize, found: usize },
    Timestamp { value: String, source: chrono::ParseError },
}

impl RowError {
    /// Attaches report context to a row failure.
    #[must_use]
    pub fn at(self, kind: ReportKind, line: u64) -> ReportError {
        match self {
            Self::Shape { expected, found } => ReportError::InvalidRecordShape {
                kind,
                line,
                expected,
                found,
            },
            Self::Timestamp { value, source } => ReportError::Timestamp {
                kind,
                line,
                value,
                source,
            },
        }
    }
}
