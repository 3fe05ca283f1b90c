//! The `diff` CLI subcommand -- compare the latest snapshot of an account with
//! the snapshot of an earlier day.

use std::path::PathBuf;

use tracing::info;

use vigil_report::{diff_records, Diffable, Principal, Resource};

use super::{build_catalog, load_config, load_records, parse_date};
use crate::output::{emit, OutputFormat};
use crate::source::{Source, SourceArgs};
use crate::{ExitCode, LogArgs};

// ---------------------------------------------------------------------------
// DiffArgs
// ---------------------------------------------------------------------------

/// Diff the latest snapshot against an earlier one.
#[derive(Debug, clap::Args)]
pub struct DiffArgs {
    #[command(subcommand)]
    pub kind: DiffTarget,
}

#[derive(Debug, clap::Subcommand)]
pub enum DiffTarget {
    /// Diff the principals reports.
    #[command(alias = "principal")]
    Principals(DiffTargetArgs),
    /// Diff the resources reports.
    #[command(alias = "resource")]
    Resources(DiffTargetArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct DiffTargetArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub customer_id: String,

    #[arg(long)]
    pub account: String,

    /// Day of the snapshot to compare against (YYYY-MM-DD).
    #[arg(long)]
    pub analysis_date: String,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write results to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub log: LogArgs,
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

/// Executes the `diff` subcommand.
pub fn execute(args: DiffArgs) -> Result<ExitCode, anyhow::Error> {
    match args.kind {
        DiffTarget::Principals(args) => diff_kind::<Principal>(&args),
        DiffTarget::Resources(args) => diff_kind::<Resource>(&args),
    }
}

fn diff_kind<R: Diffable>(args: &DiffTargetArgs) -> Result<ExitCode, anyhow::Error> {
    args.log.init();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let format = match OutputFormat::resolve(args.format, &config.output.format) {
        Ok(format) => format,
        Err(e) => {
            eprintln!("vigil: {e:#}");
            return Ok(ExitCode::ConfigError);
        }
    };
    let target_day = match parse_date(Some(&args.analysis_date)) {
        Ok(day) => day,
        Err(code) => return Ok(code),
    };

    let source = Source::resolve(&args.source, &config)?;
    let catalog = build_catalog(&source, &config, Some(&args.customer_id), &args.log)?;

    let Some(latest) = catalog.resolve_latest(&args.customer_id, &args.account, R::KIND) else {
        eprintln!(
            "vigil: no {} report found for customer {} account {}",
            R::KIND, args.customer_id, args.account
        );
        return Ok(ExitCode::NotFound);
    };
    let Some(target) = catalog.resolve(&args.customer_id, &args.account, target_day, R::KIND) else {
        eprintln!(
            "vigil: no {} report found for customer {} account {} on {}",
            R::KIND, args.customer_id, args.account, args.analysis_date
        );
        return Ok(ExitCode::NotFound);
    };

    let latest_records: Vec<R> = load_records(&source, &latest.location)?;
    let target_records: Vec<R> = load_records(&source, &target.location)?;
    let diffs = diff_records(&latest_records, &target_records);
    info!(
        kind = %R::KIND,
        latest = %latest.timestamp,
        target = %target.timestamp,
        differences = diffs.len(),
        "diff computed"
    );

    emit(&diffs, format, args.output.as_deref())?;
    Ok(ExitCode::Success)
}
