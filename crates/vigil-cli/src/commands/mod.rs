//! CLI subcommands and the plumbing they share.

pub mod config;
pub mod diff;
pub mod list;
pub mod query;
pub mod stats;
pub mod sync;

use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use vigil_catalog::{Catalog, KindSelector, Location};
use vigil_core::config::{self as core_config, VigilConfig};
use vigil_core::keys;
use vigil_report::{load_report, ReportRecord};

use crate::output::OutputFormat;
use crate::source::{Source, SourceArgs};
use crate::{spinner, ExitCode, LogArgs};

// ---------------------------------------------------------------------------
// SnapshotArgs
// ---------------------------------------------------------------------------

/// Flags selecting one snapshot of one account.
#[derive(Debug, Clone, clap::Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Customer whose reports to read.
    #[arg(long)]
    pub customer_id: String,

    /// AWS account ID.
    #[arg(long)]
    pub account: String,

    /// Snapshot day (YYYY-MM-DD); the latest snapshot when omitted.
    #[arg(long)]
    pub analysis_date: Option<String>,

    /// Output format (defaults to `output.format`).
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write results to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Either a value to continue with or the exit code to stop with.
pub(crate) enum Loaded<T> {
    Ready(T),
    Halt(ExitCode),
}

/// A decoded report plus everything needed to print it.
pub(crate) struct Snapshot<R> {
    pub records: Vec<R>,
    pub format: OutputFormat,
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

/// Loads the layered configuration with the working directory as the project
/// directory; prints the problem and yields [`ExitCode::ConfigError`] when it
/// is unusable.
pub(crate) fn load_config() -> Result<VigilConfig, ExitCode> {
    let cwd = std::env::current_dir().ok();
    let loaded = core_config::load_config(cwd.as_deref()).and_then(|cfg| {
        core_config::validate(&cfg)?;
        Ok(cfg)
    });
    loaded.map_err(|e| {
        eprintln!("vigil: configuration error: {e}");
        ExitCode::ConfigError
    })
}

/// Parses `--analysis-date`; an invalid date yields [`ExitCode::ConfigError`].
pub(crate) fn parse_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ExitCode> {
    match raw {
        None => Ok(None),
        Some(raw) => keys::parse_analysis_date(raw).map(Some).map_err(|e| {
            eprintln!("vigil: invalid analysis date '{raw}': {e} (expected YYYY-MM-DD)");
            ExitCode::ConfigError
        }),
    }
}

/// Builds the catalog behind a spinner and logs its per-account summary at
/// debug level.
pub(crate) fn build_catalog(
    source: &Source,
    config: &VigilConfig,
    customer_id: Option<&str>,
    log: &LogArgs,
) -> anyhow::Result<Catalog> {
    let selector = KindSelector::new(config.catalog.suffixes.iter().cloned());
    let pb = spinner(log.quiet, format!("Cataloging {}...", source.describe()));
    let catalog = source.catalog(&selector, customer_id);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let catalog = catalog?;

    let stats = catalog.statistics();
    info!(
        customers = stats.customers,
        accounts = stats.accounts,
        snapshots = stats.snapshots,
        "catalog loaded"
    );
    for summary in catalog.dump() {
        debug!(
            customer = %summary.customer_id,
            account = %summary.account_id,
            days = summary.days,
            first = ?summary.first_day.map(|d| d.to_string()),
            last = ?summary.last_day.map(|d| d.to_string()),
            kinds = %summary.kinds.join(","),
            "cataloged account"
        );
    }
    Ok(catalog)
}

/// Opens and decodes one cataloged report.
pub(crate) fn load_records<R: ReportRecord>(source: &Source, location: &Location) -> anyhow::Result<Vec<R>> {
    let reader = source.open(location)?;
    let records = load_report(reader).with_context(|| format!("failed to load report '{location}'"))?;
    debug!(location = %location, records = records.len(), "report loaded");
    Ok(records)
}

/// Resolves the snapshot `args` select and decodes its report of kind `R`.
pub(crate) fn open_snapshot<R: ReportRecord>(args: &SnapshotArgs) -> anyhow::Result<Loaded<Snapshot<R>>> {
    args.log.init();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return Ok(Loaded::Halt(code)),
    };
    let format = match OutputFormat::resolve(args.format, &config.output.format) {
        Ok(format) => format,
        Err(e) => {
            eprintln!("vigil: {e:#}");
            return Ok(Loaded::Halt(ExitCode::ConfigError));
        }
    };
    let as_of = match parse_date(args.analysis_date.as_deref()) {
        Ok(date) => date,
        Err(code) => return Ok(Loaded::Halt(code)),
    };

    let source = Source::resolve(&args.source, &config)?;
    let catalog = build_catalog(&source, &config, Some(&args.customer_id), &args.log)?;

    let Some(entry) = catalog.resolve(&args.customer_id, &args.account, as_of, R::KIND) else {
        eprintln!(
            "vigil: no {} report found for customer {} account {}{}",
            R::KIND,
            args.customer_id,
            args.account,
            args.analysis_date
                .as_deref()
                .map(|d| format!(" on {d}"))
                .unwrap_or_default()
        );
        return Ok(Loaded::Halt(ExitCode::NotFound));
    };

    let records = load_records(&source, &entry.location)?;
    info!(kind = %R::KIND, at = %entry.timestamp, records = records.len(), "snapshot loaded");
    Ok(Loaded::Ready(Snapshot { records, format }))
}
