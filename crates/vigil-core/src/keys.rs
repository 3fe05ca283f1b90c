//! Snapshot key codec.
//!
//! Every report file is addressed by a slash-delimited key that carries all of
//! its metadata:
//!
//! ```text
//! customers/<customer>/reports/aws/<account>/<year>/<month>/<kind>.<YYYY-MM-DD-HHMM>.<ext>
//! ```
//!
//! The same layout is used for object-store keys and for paths relative to a
//! local report home, so both catalog backends decode through [`decode`].

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

/// Separator between key segments.
pub const DELIMITER: char = '/';

/// Number of segments in a dated snapshot key.
pub const SEGMENT_COUNT: usize = 8;

pub const CUSTOMER_POSITION: usize = 1;
pub const ACCOUNT_POSITION: usize = 4;
pub const MONTH_POSITION: usize = 6;
pub const FILE_POSITION: usize = 7;

/// Sentinel that marks a "latest" alias instead of a dated snapshot.
pub const LATEST_MARKER: &str = "latest";

/// `chrono` layout of the timestamp embedded in snapshot file names.
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d-%H%M";

/// `chrono` layout of an analysis date supplied by the user.
pub const ANALYSIS_DATE_LAYOUT: &str = "%Y-%m-%d";

/// Label of the spreadsheet audit artifact published next to the CSV reports.
pub const AUDIT_WORKBOOK_LABEL: &str = "resource-access-audit";

/// Extension of the spreadsheet audit artifact.
pub const AUDIT_WORKBOOK_EXTENSION: &str = "xlsx";

// ---------------------------------------------------------------------------
// KeyError
// ---------------------------------------------------------------------------

/// Reasons a key cannot be decoded into a dated snapshot.
///
/// Catalog builds treat both variants as "skip this object"; they are only
/// surfaced to callers that decode a single key explicitly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Wrong segment count, empty identifiers, or a file name that is not
    /// `kind.timestamp.extension`.
    #[error("malformed key '{key}': {reason}")]
    MalformedKey { key: String, reason: &'static str },

    /// The timestamp field does not match `YYYY-MM-DD-HHMM`.
    #[error("malformed timestamp '{value}' in key '{key}'")]
    MalformedTimestamp { key: String, value: String },
}

// ---------------------------------------------------------------------------
// SnapshotDay
// ---------------------------------------------------------------------------

/// A snapshot timestamp truncated to 24-hour resolution (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotDay(NaiveDate);

impl SnapshotDay {
    /// Truncates a timestamp to the day it falls in.
    #[must_use]
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        Self(ts.date_naive())
    }

    #[must_use]
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub const fn date(self) -> NaiveDate {
        self.0
    }

    /// Midnight UTC at the start of this day.
    #[must_use]
    pub fn start(self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0.and_time(chrono::NaiveTime::MIN))
    }
}

impl fmt::Display for SnapshotDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ANALYSIS_DATE_LAYOUT))
    }
}

// ---------------------------------------------------------------------------
// SnapshotKey
// ---------------------------------------------------------------------------

/// The typed components of a dated snapshot key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub customer_id: String,
    pub account_id: String,
    /// Minute-resolution timestamp from the file name.
    pub timestamp: DateTime<Utc>,
    /// Report kind label; not restricted to the decodable kinds.
    pub kind: String,
    pub extension: String,
}

impl SnapshotKey {
    /// The day this snapshot is indexed under.
    #[must_use]
    pub fn day(&self) -> SnapshotDay {
        SnapshotDay::from_datetime(self.timestamp)
    }

    /// Renders the canonical key for these components.
    #[must_use]
    pub fn encode(&self) -> String {
        encode(
            &self.customer_id,
            &self.account_id,
            self.timestamp,
            &self.kind,
            &self.extension,
        )
    }
}

/// Result of decoding a well-shaped key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedKey {
    /// A dated snapshot file that belongs in the day index.
    Dated(SnapshotKey),
    /// A `latest` alias; excluded from the day index.
    Latest {
        customer_id: String,
        account_id: String,
        kind: String,
        extension: String,
    },
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Decodes a snapshot key into its typed components.
///
/// # Errors
///
/// - [`KeyError::MalformedKey`] if the key does not have exactly
///   [`SEGMENT_COUNT`] segments, has an empty customer or account segment, or
///   its file name does not split into three dot-separated fields.
/// - [`KeyError::MalformedTimestamp`] if the timestamp field does not parse.
pub fn decode(key: &str) -> Result<DecodedKey, KeyError> {
    let segments: Vec<&str> = key.split(DELIMITER).collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(KeyError::MalformedKey {
            key: key.to_string(),
            reason: "unexpected segment count",
        });
    }

    let customer_id = segments[CUSTOMER_POSITION];
    let account_id = segments[ACCOUNT_POSITION];
    if customer_id.is_empty() || account_id.is_empty() {
        return Err(KeyError::MalformedKey {
            key: key.to_string(),
            reason: "empty customer or account segment",
        });
    }

    let fields: Vec<&str> = segments[FILE_POSITION].split('.').collect();
    let [kind, stamp, extension] = fields.as_slice() else {
        return Err(KeyError::MalformedKey {
            key: key.to_string(),
            reason: "file name is not kind.timestamp.extension",
        });
    };
    if kind.is_empty() || extension.is_empty() {
        return Err(KeyError::MalformedKey {
            key: key.to_string(),
            reason: "empty kind or extension",
        });
    }

    if segments[MONTH_POSITION] == LATEST_MARKER || *stamp == LATEST_MARKER {
        return Ok(DecodedKey::Latest {
            customer_id: customer_id.to_string(),
            account_id: account_id.to_string(),
            kind: (*kind).to_string(),
            extension: (*extension).to_string(),
        });
    }

    let timestamp = parse_timestamp(stamp).ok_or_else(|| KeyError::MalformedTimestamp {
        key: key.to_string(),
        value: (*stamp).to_string(),
    })?;

    Ok(DecodedKey::Dated(SnapshotKey {
        customer_id: customer_id.to_string(),
        account_id: account_id.to_string(),
        timestamp,
        kind: (*kind).to_string(),
        extension: (*extension).to_string(),
    }))
}

/// Renders the canonical key for a snapshot file.
///
/// Seconds and sub-second precision in `timestamp` are dropped.
#[must_use]
pub fn encode(
    customer_id: &str,
    account_id: &str,
    timestamp: DateTime<Utc>,
    kind: &str,
    extension: &str,
) -> String {
    format!(
        "{prefix}{year}/{month}/{kind}.{stamp}.{extension}",
        prefix = account_prefix(customer_id, account_id),
        year = timestamp.format("%Y"),
        month = timestamp.format("%m"),
        stamp = timestamp.format(TIMESTAMP_LAYOUT),
    )
}

/// Prefix under which every account of a customer is stored.
#[must_use]
pub fn customer_prefix(customer_id: &str) -> String {
    format!("customers/{customer_id}/reports/aws/")
}

/// Prefix under which every snapshot of one account is stored.
#[must_use]
pub fn account_prefix(customer_id: &str, account_id: &str) -> String {
    format!("{}{account_id}/", customer_prefix(customer_id))
}

/// Parses a `YYYY-MM-DD-HHMM` file-name timestamp as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a user-supplied `YYYY-MM-DD` analysis date as midnight UTC.
///
/// # Errors
///
/// Returns the underlying `chrono` parse error for any other format.
pub fn parse_analysis_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(value, ANALYSIS_DATE_LAYOUT)?;
    Ok(SnapshotDay::from_date(date).start())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
