//! Object-store abstraction used for remote catalogs and mirroring.
//!
//! The store is handed in already authorized; vigil only lists keys page by
//! page and streams single objects into a writer.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, Write};
use std::ops::Bound;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by an [`ObjectStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object exists under the key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped onto this backend.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// A local I/O failure while reading or writing object bytes.
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The remote service rejected or failed the request.
    #[error("object store request failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// One page of a key listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Token for the next page; `None` on the last page.
    pub continuation: Option<String>,
}

/// Paginated listing and streamed download by key.
pub trait ObjectStore: Send + Sync {
    /// Lists keys starting with `prefix`, resuming after `continuation`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the page cannot be fetched.
    fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError>;

    /// Streams the object stored under `key` into `sink`, returning the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the object is missing or the transfer fails.
    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<u64, StoreError>;
}

/// Iterator over every page of a listing, stopping after the first error.
pub struct Pages<'a> {
    store: &'a dyn ObjectStore,
    prefix: String,
    next: Option<Option<String>>,
}

/// Starts a paged listing of `prefix`.
#[must_use]
pub fn pages<'a>(store: &'a dyn ObjectStore, prefix: &str) -> Pages<'a> {
    Pages {
        store,
        prefix: prefix.to_string(),
        next: Some(None),
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<ListPage, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next.take()?;
        match self.store.list_page(&self.prefix, token.as_deref()) {
            Ok(page) => {
                if page.continuation.is_some() {
                    self.next = Some(page.continuation.clone());
                }
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Where a listing of `prefix` resumes: just after the token, or at the
/// prefix itself.
fn lower_bound<'a>(prefix: &'a str, continuation: Option<&'a str>) -> Bound<&'a str> {
    match continuation {
        Some(token) if token >= prefix => Bound::Excluded(token),
        _ => Bound::Included(prefix),
    }
}

/// Takes one page of `prefix` keys from a sorted iterator positioned at
/// [`lower_bound`].
fn take_page<'a>(
    sorted: impl Iterator<Item = &'a String>,
    prefix: &str,
    page_size: usize,
) -> ListPage {
    let mut keys: Vec<String> = sorted
        .take_while(|k| k.starts_with(prefix))
        .take(page_size + 1)
        .cloned()
        .collect();
    let continuation = if keys.len() > page_size {
        keys.truncate(page_size);
        keys.last().cloned()
    } else {
        None
    };
    ListPage { keys, continuation }
}

const DEFAULT_PAGE_SIZE: usize = 1000;

// ---------------------------------------------------------------------------
// FsObjectStore
// ---------------------------------------------------------------------------

/// A directory treated as a bucket: keys are `/`-joined relative paths.
///
/// The tree is walked once, on the first listing. Files added afterwards are
/// not listed by the same instance.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
    keys: OnceLock<Vec<String>>,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            keys: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a path under the root, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Every file key under the root, sorted.
    fn sorted_keys(&self) -> Result<&[String], StoreError> {
        if let Some(keys) = self.keys.get() {
            return Ok(keys.as_slice());
        }
        let walked = self.walk_keys()?;
        Ok(self.keys.get_or_init(|| walked).as_slice())
    }

    fn walk_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let key = e.path().unwrap_or(&self.root).display().to_string();
                StoreError::Io {
                    key,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let segments: Option<Vec<&str>> = relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect();
            if let Some(segments) = segments {
                keys.push(segments.join("/"));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl ObjectStore for FsObjectStore {
    fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let keys = self.sorted_keys()?;
        let start = match lower_bound(prefix, continuation) {
            Bound::Excluded(token) => keys.partition_point(|k| k.as_str() <= token),
            Bound::Included(from) => keys.partition_point(|k| k.as_str() < from),
            Bound::Unbounded => 0,
        };
        Ok(take_page(keys[start..].iter(), prefix, self.page_size))
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<u64, StoreError> {
        let path = self.path_for(key)?;
        let mut file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Io {
                key: key.to_string(),
                source: e,
            },
        })?;
        io::copy(&mut file, sink).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// An in-memory store; keys registered with [`MemoryObjectStore::fail_on`]
/// fail every download.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, Vec<u8>>,
    failing: HashSet<String>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            failing: HashSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.objects.insert(key.into(), body.into());
    }

    pub fn fail_on(&mut self, key: impl Into<String>) {
        self.failing.insert(key.into());
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let range = (lower_bound(prefix, continuation), Bound::Unbounded);
        let keys = self.objects.range::<str, _>(range).map(|(k, _)| k);
        Ok(take_page(keys, prefix, self.page_size))
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<u64, StoreError> {
        if self.failing.contains(key) {
            return Err(StoreError::Backend(format!("injected failure for {key}")));
        }
        let body = self
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        sink.write_all(body).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;
        Ok(body.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
