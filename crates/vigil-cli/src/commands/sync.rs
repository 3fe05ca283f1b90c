//! The `sync` CLI subcommand -- mirror one account's snapshots from a bucket
//! into the local report tree.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use vigil_catalog::{Catalog, KindSelector};
use vigil_sync::{sync, SyncRequest};

use super::load_config;
use crate::source::open_store;
use crate::{spinner, ExitCode, LogArgs};

/// Mirror one account's snapshots into a local report tree.
#[derive(Debug, Clone, clap::Args)]
pub struct SyncArgs {
    /// Source bucket: `s3://bucket[/prefix]` or a directory mirroring one
    /// (defaults to `remote.bucket`).
    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long)]
    pub customer_id: String,

    #[arg(long)]
    pub account: String,

    /// Destination report tree (defaults to `catalog.report_home`).
    #[arg(long)]
    pub report_home: Option<PathBuf>,

    /// Maximum concurrent downloads (defaults to `sync.concurrency`).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Create the destination layout with empty files; download nothing.
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Executes the `sync` subcommand.
///
/// Failed transfers are listed on stderr. Returns [`ExitCode::PartialSync`]
/// when some transfers succeeded, [`ExitCode::EngineError`] when none did.
pub fn execute(args: SyncArgs) -> Result<ExitCode, anyhow::Error> {
    args.log.init();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let Some(bucket) = args.bucket.clone().or_else(|| config.remote.bucket.clone()) else {
        eprintln!("vigil: no source bucket; pass --bucket or set remote.bucket");
        return Ok(ExitCode::ConfigError);
    };
    let dest_root = args
        .report_home
        .clone()
        .unwrap_or_else(|| config.catalog.report_home.clone());
    let concurrency = args.concurrency.unwrap_or(config.sync.concurrency);
    let dry_run = args.dry_run || config.sync.dry_run;

    let store = open_store(&bucket)?;
    let selector = KindSelector::new(config.catalog.suffixes.iter().cloned());
    let catalog = Catalog::from_store_for_customer(store.as_ref(), &args.customer_id, &selector)
        .with_context(|| format!("failed to catalog {bucket}"))?;

    let planned = catalog.all_locations(&args.customer_id, &args.account).len();
    if planned == 0 {
        eprintln!(
            "vigil: no snapshots found for customer {} account {} in {bucket}",
            args.customer_id, args.account
        );
        return Ok(ExitCode::NotFound);
    }

    let pb = spinner(
        args.log.quiet,
        format!("Syncing {planned} files to {}...", dest_root.display()),
    );
    let request = SyncRequest {
        catalog: &catalog,
        store: store.as_ref(),
        dest_root: &dest_root,
        customer_id: &args.customer_id,
        account_id: &args.account,
        concurrency,
        dry_run,
    };
    let outcome = sync(&request);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match outcome {
        Ok(summary) => {
            info!(
                downloaded = summary.downloaded,
                skipped = summary.skipped,
                bytes = summary.bytes,
                dest = %dest_root.display(),
                "sync completed"
            );
            if dry_run {
                println!(
                    "dry run: laid out {} empty files under {}, nothing downloaded",
                    summary.skipped,
                    dest_root.display()
                );
            } else {
                println!(
                    "synced {} files ({} bytes) to {}",
                    summary.downloaded,
                    summary.bytes,
                    dest_root.display()
                );
            }
            Ok(ExitCode::Success)
        }
        Err(aggregate) => {
            for failure in &aggregate.errors {
                eprintln!("vigil: transfer failed: {failure}");
            }
            eprintln!("vigil: {aggregate}");
            if aggregate.is_partial {
                Ok(ExitCode::PartialSync)
            } else {
                Ok(ExitCode::EngineError)
            }
        }
    }
}
