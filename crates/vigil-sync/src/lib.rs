//! Vigil Sync -- mirrors one account's snapshot files from an object store
//! into a local directory.
//!
//! Every cataloged location of the account becomes one transfer. At most
//! `concurrency` transfers run at once; each failure is recorded against its
//! key and never stops the others. [`sync`] returns only after every transfer
//! has finished.

pub mod gate;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info, warn};

use vigil_catalog::{Catalog, Location, ObjectStore, StoreError};

pub use gate::{AdmissionGate, AdmissionPermit};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single transfer failed.
#[derive(Debug, thiserror::Error)]
pub enum TransferFailure {
    /// The cataloged location is a local file, not an object key.
    #[error("location '{0}' is not an object key")]
    NotAnObject(String),

    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to finish writing '{path}': {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("download failed: {0}")]
    Download(#[from] StoreError),
}

/// A failed transfer and the key it was for.
#[derive(Debug, thiserror::Error)]
#[error("{key}: {source}")]
pub struct TransferError {
    pub key: String,
    #[source]
    pub source: TransferFailure,
}

/// Every transfer failure of one sync run.
#[derive(Debug, thiserror::Error)]
#[error("{} of {attempted} transfers failed", .errors.len())]
pub struct AggregateError {
    /// True when at least one transfer succeeded or was skipped.
    pub is_partial: bool,
    pub attempted: usize,
    pub errors: Vec<TransferError>,
}

// ---------------------------------------------------------------------------
// Request / summary
// ---------------------------------------------------------------------------

/// Parameters of one sync run.
#[derive(Clone, Copy)]
pub struct SyncRequest<'a> {
    pub catalog: &'a Catalog,
    pub store: &'a dyn ObjectStore,
    /// Objects land at `dest_root/<key>`.
    pub dest_root: &'a Path,
    pub customer_id: &'a str,
    pub account_id: &'a str,
    /// Maximum concurrent transfers; 0 is treated as 1.
    pub concurrency: usize,
    /// Create the destination directories and empty files but download
    /// nothing.
    pub dry_run: bool,
}

/// Counters of a fully successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub attempted: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
    /// Most transfers that held a permit at the same time.
    pub peak_in_flight: usize,
}

#[derive(Debug)]
enum Outcome {
    Downloaded(u64),
    Skipped,
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Downloads every cataloged file of one account.
///
/// An unknown customer or account resolves to zero transfers and succeeds.
///
/// # Errors
///
/// Returns [`AggregateError`] with one entry per failed transfer. Files of the
/// successful transfers are left in place.
pub fn sync(request: &SyncRequest<'_>) -> Result<SyncSummary, AggregateError> {
    let concurrency = if request.concurrency == 0 {
        warn!("sync concurrency of 0 requested, using 1");
        1
    } else {
        request.concurrency
    };

    let locations = request
        .catalog
        .all_locations(request.customer_id, request.account_id);
    debug!(
        customer = request.customer_id,
        account = request.account_id,
        transfers = locations.len(),
        concurrency,
        dry_run = request.dry_run,
        "starting sync"
    );

    let gate = AdmissionGate::new(concurrency);
    let (tx, rx) = crossbeam_channel::unbounded();

    thread::scope(|s| {
        for location in &locations {
            let permit = gate.acquire();
            let tx = tx.clone();
            s.spawn(move || {
                let _permit = permit;
                let result = transfer(request, location);
                // The receiver outlives the scope.
                let _ = tx.send(result);
            });
        }
    });
    drop(tx);

    let mut summary = SyncSummary {
        attempted: locations.len(),
        peak_in_flight: gate.peak(),
        ..SyncSummary::default()
    };
    let mut errors = Vec::new();
    for result in rx {
        match result {
            Ok(Outcome::Downloaded(bytes)) => {
                summary.downloaded += 1;
                summary.bytes += bytes;
            }
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Err(e) => {
                warn!(key = %e.key, error = %e.source, "transfer failed");
                errors.push(e);
            }
        }
    }

    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = errors.len(),
        bytes = summary.bytes,
        peak_in_flight = summary.peak_in_flight,
        "sync finished"
    );

    if errors.is_empty() {
        Ok(summary)
    } else {
        errors.sort_by(|a, b| a.key.cmp(&b.key));
        Err(AggregateError {
            is_partial: summary.downloaded + summary.skipped > 0,
            attempted: summary.attempted,
            errors,
        })
    }
}

fn transfer(request: &SyncRequest<'_>, location: &Location) -> Result<Outcome, TransferError> {
    let Some(key) = location.as_object_key() else {
        return Err(TransferError {
            key: location.to_string(),
            source: TransferFailure::NotAnObject(location.to_string()),
        });
    };
    let fail = |source: TransferFailure| TransferError {
        key: key.to_string(),
        source,
    };

    let dest = request.dest_root.join(key);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| {
            fail(TransferFailure::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        })?;
    }

    let file = File::create(&dest).map_err(|source| {
        fail(TransferFailure::CreateFile {
            path: dest.clone(),
            source,
        })
    })?;
    if request.dry_run {
        info!(key, dest = %dest.display(), "dry run, skipping download");
        return Ok(Outcome::Skipped);
    }
    let mut writer = BufWriter::new(file);

    let written = request
        .store
        .download(key, &mut writer)
        .map_err(TransferFailure::from)
        .and_then(|bytes| {
            writer.flush().map(|()| bytes).map_err(|source| TransferFailure::Flush {
                path: dest.clone(),
                source,
            })
        });

    match written {
        Ok(bytes) => {
            debug!(key, bytes, "downloaded");
            Ok(Outcome::Downloaded(bytes))
        }
        Err(failure) => {
            drop(writer);
            if let Err(e) = fs::remove_file(&dest) {
                debug!(path = %dest.display(), error = %e, "could not remove partial file");
            }
            Err(fail(failure))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vigil_catalog::{KindSelector, ListPage, MemoryObjectStore, REPORTS_PREFIX};

    fn key(kind: &str, day: u32) -> String {
        format!("customers/C1/reports/aws/111/2021/06/{kind}.2021-06-{day:02}-0755.csv")
    }

    fn fixture(days: u32) -> MemoryObjectStore {
        let mut store = MemoryObjectStore::new().with_page_size(3);
        for day in 1..=days {
            for kind in ["principals", "resources"] {
                store.insert(key(kind, day), format!("{kind} body {day}"));
            }
        }
        store
    }

    fn request<'a>(
        catalog: &'a Catalog,
        store: &'a dyn ObjectStore,
        dest: &'a Path,
    ) -> SyncRequest<'a> {
        SyncRequest {
            catalog,
            store,
            dest_root: dest,
            customer_id: "C1",
            account_id: "111",
            concurrency: 4,
            dry_run: false,
        }
    }

    // -- sync tests ---------------------------------------------------------

    #[test]
    fn mirrors_every_location() {
        let store = fixture(3);
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let summary = sync(&request(&catalog, &store, dir.path())).unwrap();
        assert_eq!(summary.attempted, 6);
        assert_eq!(summary.downloaded, 6);
        assert_eq!(summary.skipped, 0);

        let body = fs::read_to_string(dir.path().join(key("resources", 2))).unwrap();
        assert_eq!(body, "resources body 2");
        let per_day = "principals body 1".len() + "resources body 1".len();
        assert_eq!(summary.bytes, 3 * per_day as u64);
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let mut store = fixture(3);
        let broken = key("principals", 2);
        store.fail_on(broken.clone());
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = sync(&request(&catalog, &store, dir.path())).unwrap_err();
        assert!(err.is_partial);
        assert_eq!(err.attempted, 6);
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].key, broken);
        assert!(matches!(err.errors[0].source, TransferFailure::Download(_)));

        assert!(!dir.path().join(&broken).exists(), "partial file left behind");
        for day in 1..=3 {
            assert!(dir.path().join(key("resources", day)).exists());
        }
        assert!(dir.path().join(key("principals", 1)).exists());
        assert!(dir.path().join(key("principals", 3)).exists());
    }

    #[test]
    fn all_failures_is_not_partial() {
        let mut store = fixture(1);
        store.fail_on(key("principals", 1));
        store.fail_on(key("resources", 1));
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err = sync(&request(&catalog, &store, dir.path())).unwrap_err();
        assert!(!err.is_partial);
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.to_string(), "2 of 2 transfers failed");
    }

    #[test]
    fn dry_run_creates_empty_files_without_downloading() {
        let mut store = fixture(2);
        // Any download attempt would surface as a transfer error.
        for day in 1..=2 {
            store.fail_on(key("principals", day));
            store.fail_on(key("resources", day));
        }
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("mirror");

        let summary = sync(&SyncRequest {
            dry_run: true,
            ..request(&catalog, &store, &dest)
        })
        .unwrap();
        assert_eq!(summary.skipped, 4);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.bytes, 0);

        for day in 1..=2 {
            for kind in ["principals", "resources"] {
                let path = dest.join(key(kind, day));
                assert!(path.is_file(), "{} missing", path.display());
                assert_eq!(fs::metadata(&path).unwrap().len(), 0);
            }
        }
    }

    #[test]
    fn unknown_account_is_an_empty_success() {
        let store = fixture(1);
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let summary = sync(&SyncRequest {
            account_id: "999",
            ..request(&catalog, &store, dir.path())
        })
        .unwrap();
        assert_eq!(summary, SyncSummary::default());
    }

    #[test]
    fn local_locations_are_per_key_errors() {
        let tree = tempfile::tempdir().unwrap();
        let rel = key("principals", 1);
        let path = tree.path().join(&rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "x").unwrap();
        let catalog = vigil_catalog::build_from_local_tree(tree.path()).unwrap();

        let store = MemoryObjectStore::new();
        let dest = tempfile::tempdir().unwrap();
        let err = sync(&request(&catalog, &store, dest.path())).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(matches!(err.errors[0].source, TransferFailure::NotAnObject(_)));
    }

    /// Store that records how many downloads overlap.
    struct SlowStore {
        inner: MemoryObjectStore,
        running: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl ObjectStore for SlowStore {
        fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
            self.inner.list_page(prefix, continuation)
        }

        fn download(&self, key: &str, sink: &mut dyn Write) -> Result<u64, StoreError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            let result = self.inner.download(key, sink);
            self.running.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[test]
    fn concurrency_bounds_in_flight_transfers() {
        let store = SlowStore {
            inner: fixture(6),
            running: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        };
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let summary = sync(&SyncRequest {
            concurrency: 2,
            ..request(&catalog, &store, dir.path())
        })
        .unwrap();
        assert_eq!(summary.downloaded, 12);
        assert!(store.max_seen.load(Ordering::SeqCst) <= 2);
        assert!((1..=2).contains(&summary.peak_in_flight));
    }

    #[test]
    fn zero_concurrency_runs_serially() {
        let store = fixture(2);
        let catalog = Catalog::from_store(&store, REPORTS_PREFIX, &KindSelector::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let summary = sync(&SyncRequest {
            concurrency: 0,
            ..request(&catalog, &store, dir.path())
        })
        .unwrap();
        assert_eq!(summary.downloaded, 4);
        assert_eq!(summary.peak_in_flight, 1);
    }
}
