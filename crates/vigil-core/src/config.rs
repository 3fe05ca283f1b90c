//! Configuration loading and merging for vigil.
//!
//! Vigil resolves configuration from multiple sources with CLI > project > home > defaults
//! precedence. Configuration is loaded from `.vigil.yaml` files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::CoreError;

/// File name looked up in the home and project directories.
pub const CONFIG_FILE_NAME: &str = ".vigil.yaml";

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Top-level vigil configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Local catalog settings.
    pub catalog: CatalogConfig,
    /// Remote object store settings.
    pub remote: RemoteConfig,
    /// Mirroring settings.
    pub sync: SyncConfig,
    /// Rendering settings.
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// CatalogConfig
// ---------------------------------------------------------------------------

/// Where local reports live and which remote objects are cataloged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Root of the local report tree.
    pub report_home: PathBuf,
    /// Key suffixes accepted when cataloging a remote listing.
    pub suffixes: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            report_home: PathBuf::from("."),
            suffixes: vec![".csv".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteConfig
// ---------------------------------------------------------------------------

/// Remote source used when `--bucket` is not given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `s3://bucket[/prefix]` or a directory mirroring a bucket.
    pub bucket: Option<String>,
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of transfers in flight.
    pub concurrency: usize,
    /// Create the destination layout but skip every download.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dry_run: false,
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format (`csv` or `json`).
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and merge configuration from multiple sources.
///
/// Resolution order (highest priority first):
/// 1. CLI overrides (applied by the caller after loading)
/// 2. `.vigil.yaml` in the project directory
/// 3. `.vigil.yaml` in the user home directory
/// 4. Built-in defaults
///
/// # Errors
///
/// Returns [`CoreError::Config`] if a config file exists but is malformed.
pub fn load_config(project_dir: Option<&Path>) -> Result<VigilConfig, CoreError> {
    let mut config = VigilConfig::default();

    if let Some(home) = home_dir() {
        let home_config = home.join(CONFIG_FILE_NAME);
        if home_config.is_file() {
            debug!(path = %home_config.display(), "loading home config");
            let layer = load_config_file(&home_config)?;
            config = merge_config(config, layer);
        }
    }

    if let Some(dir) = project_dir {
        let project_config = dir.join(CONFIG_FILE_NAME);
        if project_config.is_file() {
            debug!(path = %project_config.display(), "loading project config");
            let layer = load_config_file(&project_config)?;
            config = merge_config(config, layer);
        }
    }

    info!("configuration loaded");
    Ok(config)
}

/// Checks semantic constraints that serde cannot express.
///
/// # Errors
///
/// Returns [`CoreError::Config`] describing the first violated constraint.
pub fn validate(config: &VigilConfig) -> Result<(), CoreError> {
    if config.sync.concurrency == 0 {
        return Err(CoreError::Config(
            "sync.concurrency must be at least 1".to_string(),
        ));
    }
    if config.catalog.suffixes.is_empty() {
        return Err(CoreError::Config(
            "catalog.suffixes must list at least one suffix".to_string(),
        ));
    }
    if !matches!(config.output.format.as_str(), "csv" | "json") {
        return Err(CoreError::Config(format!(
            "output.format must be csv or json, got '{}'",
            config.output.format
        )));
    }
    Ok(())
}

/// Load a single config file and deserialize it.
fn load_config_file(path: &Path) -> Result<VigilConfig, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!(
            "failed to read config file '{}': {e}",
            path.display()
        ))
    })?;

    serde_yml::from_str(&content).map_err(|e| {
        CoreError::Config(format!(
            "failed to parse config file '{}': {e}",
            path.display()
        ))
    })
}

/// Merge `overlay` on top of `base`, section by section.
fn merge_config(base: VigilConfig, overlay: VigilConfig) -> VigilConfig {
    VigilConfig {
        catalog: merge_catalog(base.catalog, overlay.catalog),
        remote: RemoteConfig {
            bucket: overlay.remote.bucket.or(base.remote.bucket),
        },
        sync: merge_sync(base.sync, overlay.sync),
        output: merge_output(base.output, overlay.output),
    }
}

/// Fields left at their default in `overlay` keep the `base` value.
fn merge_sync(base: SyncConfig, overlay: SyncConfig) -> SyncConfig {
    let defaults = SyncConfig::default();
    SyncConfig {
        concurrency: if overlay.concurrency == defaults.concurrency {
            base.concurrency
        } else {
            overlay.concurrency
        },
        dry_run: if overlay.dry_run == defaults.dry_run {
            base.dry_run
        } else {
            overlay.dry_run
        },
    }
}

fn merge_output(base: OutputConfig, overlay: OutputConfig) -> OutputConfig {
    if overlay.format == OutputConfig::default().format {
        base
    } else {
        overlay
    }
}

fn merge_catalog(base: CatalogConfig, overlay: CatalogConfig) -> CatalogConfig {
    let defaults = CatalogConfig::default();
    CatalogConfig {
        report_home: if overlay.report_home == defaults.report_home {
            base.report_home
        } else {
            overlay.report_home
        },
        suffixes: if overlay.suffixes == defaults.suffixes {
            base.suffixes
        } else {
            // Union suffixes from both levels.
            let mut merged = base.suffixes;
            for s in overlay.suffixes {
                if !merged.contains(&s) {
                    merged.push(s);
                }
            }
            merged
        },
    }
}

/// Get the user home directory.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
