//! Vigil Catalog -- in-memory index of report snapshots.
//!
//! A [`Catalog`] maps `customer → account → day → kind → Location`. It is built
//! once, either from a local report tree ([`build_from_local_tree`]) or from a
//! paged object-store listing ([`build_from_object_listing`]), and is immutable
//! afterwards. Queries never perform I/O and report "nothing matched" as
//! `None`, never as an error.

pub mod catalog;
pub mod local;
pub mod remote;
#[cfg(feature = "s3")]
pub mod s3;
pub mod store;

pub use catalog::{AccountSummary, Catalog, CatalogEntry, CatalogStats, Location};
pub use local::build_from_local_tree;
pub use remote::{build_from_object_listing, KindSelector, REPORTS_PREFIX};
pub use store::{pages, FsObjectStore, ListPage, MemoryObjectStore, ObjectStore, StoreError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Structural failures that abort a catalog build.
///
/// Malformed keys are not errors here; they are skipped during the build.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The local report tree could not be walked.
    #[error("failed to walk report tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A listing page could not be fetched from the object store.
    #[error("failed to list objects: {0}")]
    Listing(#[from] StoreError),
}
