//! Where a command reads its reports from: a local report tree or an object
//! store addressed by `--bucket`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::debug;

use vigil_catalog::{
    build_from_local_tree, Catalog, FsObjectStore, KindSelector, Location, ObjectStore,
    REPORTS_PREFIX,
};
use vigil_core::config::VigilConfig;

/// Catalog source flags shared by the read-only commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct SourceArgs {
    /// Object store to catalog: `s3://bucket[/prefix]` or a directory
    /// mirroring a bucket.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Local report tree (defaults to `catalog.report_home`).
    #[arg(long)]
    pub report_home: Option<PathBuf>,
}

/// A resolved report source.
pub enum Source {
    Local(PathBuf),
    Remote {
        url: String,
        store: Box<dyn ObjectStore>,
    },
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(root) => f.debug_tuple("Local").field(root).finish(),
            Self::Remote { url, .. } => f.debug_struct("Remote").field("url", url).finish_non_exhaustive(),
        }
    }
}

/// Opens the object store behind `url`.
///
/// # Errors
///
/// Fails for `s3://` URLs when built without the `s3` feature, and for a
/// directory that does not exist.
pub fn open_store(url: &str) -> anyhow::Result<Box<dyn ObjectStore>> {
    if url.starts_with("s3://") {
        return open_s3(url);
    }
    let root = Path::new(url);
    if !root.is_dir() {
        bail!("bucket directory '{}' does not exist", root.display());
    }
    Ok(Box::new(FsObjectStore::new(root)))
}

#[cfg(feature = "s3")]
fn open_s3(url: &str) -> anyhow::Result<Box<dyn ObjectStore>> {
    let store = vigil_catalog::s3::S3ObjectStore::connect(url)
        .with_context(|| format!("failed to connect to {url}"))?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "s3"))]
fn open_s3(url: &str) -> anyhow::Result<Box<dyn ObjectStore>> {
    bail!("{url}: this build of vigil has no S3 support (rebuild with the `s3` feature)")
}

impl Source {
    /// `--bucket` wins over `--report-home`, which wins over the configured
    /// report home.
    ///
    /// # Errors
    ///
    /// See [`open_store`].
    pub fn resolve(args: &SourceArgs, config: &VigilConfig) -> anyhow::Result<Self> {
        if let Some(url) = &args.bucket {
            return Ok(Self::Remote {
                url: url.clone(),
                store: open_store(url)?,
            });
        }
        let root = args
            .report_home
            .clone()
            .unwrap_or_else(|| config.catalog.report_home.clone());
        Ok(Self::Local(root))
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Local(root) => root.display().to_string(),
            Self::Remote { url, .. } => url.clone(),
        }
    }

    /// Catalogs the source, optionally listing only one customer's keys.
    ///
    /// # Errors
    ///
    /// Fails if the tree cannot be walked or a listing page cannot be fetched.
    pub fn catalog(&self, selector: &KindSelector, customer_id: Option<&str>) -> anyhow::Result<Catalog> {
        let catalog = match self {
            Self::Local(root) => build_from_local_tree(root)
                .with_context(|| format!("failed to catalog report tree '{}'", root.display()))?,
            Self::Remote { url, store } => {
                let built = match customer_id {
                    Some(customer) => {
                        Catalog::from_store_for_customer(store.as_ref(), customer, selector)
                    }
                    None => Catalog::from_store(store.as_ref(), REPORTS_PREFIX, selector),
                };
                built.with_context(|| format!("failed to catalog {url}"))?
            }
        };
        debug!(source = %self.describe(), entries = catalog.len(), "catalog ready");
        Ok(catalog)
    }

    /// Opens one cataloged report for reading.
    ///
    /// A remote object is spooled into an anonymous temporary file first, so
    /// its size is bounded by disk rather than memory.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the object cannot be downloaded.
    pub fn open(&self, location: &Location) -> anyhow::Result<Box<dyn Read>> {
        match (self, location) {
            (_, Location::File(path)) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open report '{}'", path.display()))?;
                Ok(Box::new(file))
            }
            (Self::Remote { store, .. }, Location::Object(key)) => {
                let mut spool = tempfile::tempfile()
                    .context("failed to create a spool file for the download")?;
                let bytes = store
                    .download(key, &mut spool)
                    .with_context(|| format!("failed to download report '{key}'"))?;
                spool
                    .seek(SeekFrom::Start(0))
                    .context("failed to rewind the spool file")?;
                debug!(key, bytes, "report spooled");
                Ok(Box::new(spool))
            }
            (Self::Local(_), Location::Object(key)) => {
                bail!("report '{key}' is an object key but the source is a local tree")
            }
        }
    }
}
