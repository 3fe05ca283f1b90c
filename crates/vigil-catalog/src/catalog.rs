//! The catalog index and its queries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use vigil_core::keys::{self, DecodedKey, SnapshotDay, SnapshotKey};
use vigil_core::ReportKind;

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Where one report file can be read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// A file on local disk (report home joined with the relative key).
    File(PathBuf),
    /// An object-store key.
    Object(String),
}

impl Location {
    #[must_use]
    pub fn as_object_key(&self) -> Option<&str> {
        match self {
            Self::File(_) => None,
            Self::Object(key) => Some(key),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Object(key) => f.write_str(key),
        }
    }
}

// ---------------------------------------------------------------------------
// Index types
// ---------------------------------------------------------------------------

/// One cataloged report file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub location: Location,
    /// Minute-resolution timestamp from the file name.
    pub timestamp: DateTime<Utc>,
}

/// All kinds recorded for one account on one day, keyed by kind label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Snapshot {
    entries: BTreeMap<String, CatalogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Account {
    days: BTreeMap<SnapshotDay, Snapshot>,
}

/// Structural counts over the whole catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub customers: usize,
    pub accounts: usize,
    /// One per `(customer, account, day, kind)` entry.
    pub snapshots: usize,
}

/// Per-account overview used for verbose diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub customer_id: String,
    pub account_id: String,
    pub days: usize,
    pub first_day: Option<SnapshotDay>,
    pub last_day: Option<SnapshotDay>,
    pub kinds: Vec<String>,
}

/// Immutable index `customer → account → day → kind → entry`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    customers: BTreeMap<String, BTreeMap<String, Account>>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Catalog {
    fn account(&self, customer_id: &str, account_id: &str) -> Option<&Account> {
        self.customers.get(customer_id)?.get(account_id)
    }

    /// Entry of `kind` on the most recent day recorded for the account.
    ///
    /// Returns `None` when the account has no days, or when its most recent
    /// day does not include `kind`.
    #[must_use]
    pub fn resolve_latest(
        &self,
        customer_id: &str,
        account_id: &str,
        kind: ReportKind,
    ) -> Option<&CatalogEntry> {
        let account = self.account(customer_id, account_id)?;
        let (_, snapshot) = account.days.iter().max_by_key(|(day, _)| **day)?;
        snapshot.entries.get(kind.label())
    }

    /// Entry of `kind` recorded on exactly the day `at` falls in.
    #[must_use]
    pub fn resolve_as_of(
        &self,
        customer_id: &str,
        account_id: &str,
        at: DateTime<Utc>,
        kind: ReportKind,
    ) -> Option<&CatalogEntry> {
        let day = SnapshotDay::from_datetime(at);
        self.account(customer_id, account_id)?
            .days
            .get(&day)?
            .entries
            .get(kind.label())
    }

    /// `resolve_as_of` when a date is given, `resolve_latest` otherwise.
    #[must_use]
    pub fn resolve(
        &self,
        customer_id: &str,
        account_id: &str,
        at: Option<DateTime<Utc>>,
        kind: ReportKind,
    ) -> Option<&CatalogEntry> {
        match at {
            Some(at) => self.resolve_as_of(customer_id, account_id, at, kind),
            None => self.resolve_latest(customer_id, account_id, kind),
        }
    }

    /// Every location recorded for one account, ordered by day then kind.
    #[must_use]
    pub fn all_locations(&self, customer_id: &str, account_id: &str) -> Vec<&Location> {
        self.account(customer_id, account_id)
            .map(|account| {
                account
                    .days
                    .values()
                    .flat_map(|snapshot| snapshot.entries.values().map(|e| &e.location))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn statistics(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            customers: self.customers.len(),
            ..CatalogStats::default()
        };
        for accounts in self.customers.values() {
            stats.accounts += accounts.len();
            for account in accounts.values() {
                stats.snapshots += account
                    .days
                    .values()
                    .map(|s| s.entries.len())
                    .sum::<usize>();
            }
        }
        stats
    }

    /// Customer IDs in ascending order.
    pub fn customers(&self) -> impl Iterator<Item = &str> {
        self.customers.keys().map(String::as_str)
    }

    /// Account IDs of one customer in ascending order.
    #[must_use]
    pub fn accounts(&self, customer_id: &str) -> Vec<&str> {
        self.customers
            .get(customer_id)
            .map(|accounts| accounts.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Distinct snapshot timestamps of one account, oldest first.
    #[must_use]
    pub fn snapshot_times(&self, customer_id: &str, account_id: &str) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> = self
            .account(customer_id, account_id)
            .map(|account| {
                account
                    .days
                    .values()
                    .flat_map(|s| s.entries.values().map(|e| e.timestamp))
                    .collect()
            })
            .unwrap_or_default();
        times.sort();
        times.dedup();
        times
    }

    /// A catalog restricted to one customer and, optionally, one account.
    #[must_use]
    pub fn narrow(&self, customer_id: &str, account_id: Option<&str>) -> Catalog {
        let mut narrowed = Catalog::default();
        if let Some(accounts) = self.customers.get(customer_id) {
            let kept: BTreeMap<String, Account> = accounts
                .iter()
                .filter(|(id, _)| account_id.map_or(true, |wanted| wanted == id.as_str()))
                .map(|(id, account)| (id.clone(), account.clone()))
                .collect();
            if !kept.is_empty() {
                narrowed.customers.insert(customer_id.to_string(), kept);
            }
        }
        narrowed
    }

    /// One summary per account, in customer then account order.
    #[must_use]
    pub fn dump(&self) -> Vec<AccountSummary> {
        let mut summaries = Vec::new();
        for (customer_id, accounts) in &self.customers {
            for (account_id, account) in accounts {
                let mut kinds: Vec<String> = account
                    .days
                    .values()
                    .flat_map(|s| s.entries.keys().cloned())
                    .collect();
                kinds.sort();
                kinds.dedup();
                summaries.push(AccountSummary {
                    customer_id: customer_id.clone(),
                    account_id: account_id.clone(),
                    days: account.days.len(),
                    first_day: account.days.keys().next().copied(),
                    last_day: account.days.keys().next_back().copied(),
                    kinds,
                });
            }
        }
        summaries
    }

    /// Number of entries, one per day and kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statistics().snapshots
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Counters collected while a catalog is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub accepted: usize,
    pub skipped_malformed: usize,
    pub skipped_latest: usize,
    pub skipped_filtered: usize,
    /// Entries replaced by a later file for the same day and kind.
    pub replaced: usize,
}

/// Mutable accumulator used by the local and remote builds.
#[derive(Debug, Default)]
pub(crate) struct CatalogBuilder {
    catalog: Catalog,
    pub(crate) stats: BuildStats,
}

impl CatalogBuilder {
    /// Decodes `key` and records it, skipping anything that is not a dated
    /// snapshot key.
    pub(crate) fn record(&mut self, key: &str, location: Location) {
        match keys::decode(key) {
            Ok(DecodedKey::Dated(snapshot_key)) => self.insert(snapshot_key, location),
            Ok(DecodedKey::Latest { .. }) => {
                debug!(key, "skipping latest alias");
                self.stats.skipped_latest += 1;
            }
            Err(e) => {
                debug!(key, error = %e, "skipping malformed key");
                self.stats.skipped_malformed += 1;
            }
        }
    }

    pub(crate) fn skip_filtered(&mut self, key: &str) {
        debug!(key, "skipping key outside kind selector");
        self.stats.skipped_filtered += 1;
    }

    pub(crate) fn skip_malformed(&mut self, path: &Path) {
        debug!(path = %path.display(), "skipping file outside the snapshot layout");
        self.stats.skipped_malformed += 1;
    }

    fn insert(&mut self, key: SnapshotKey, location: Location) {
        let day = key.day();
        let entry = CatalogEntry {
            location,
            timestamp: key.timestamp,
        };
        let snapshot = self
            .catalog
            .customers
            .entry(key.customer_id)
            .or_default()
            .entry(key.account_id)
            .or_default()
            .days
            .entry(day)
            .or_default();

        if let Some(previous) = snapshot.entries.insert(key.kind.clone(), entry) {
            warn!(
                kind = %key.kind,
                %day,
                replaced = %previous.location,
                "two snapshots of the same kind on one day; keeping the last one seen"
            );
            self.stats.replaced += 1;
        }
        self.stats.accepted += 1;
    }

    pub(crate) fn finish(self, source: &str) -> Catalog {
        let summary = self.catalog.statistics();
        info!(
            source,
            accepted = self.stats.accepted,
            skipped_malformed = self.stats.skipped_malformed,
            skipped_latest = self.stats.skipped_latest,
            skipped_filtered = self.stats.skipped_filtered,
            replaced = self.stats.replaced,
            customers = summary.customers,
            accounts = summary.accounts,
            "catalog built"
        );
        self.catalog
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
