//! The `list` CLI subcommand -- list customers, accounts, or snapshot times.

use vigil_catalog::Catalog;
use vigil_core::keys::TIMESTAMP_LAYOUT;

use super::{build_catalog, load_config};
use crate::source::{Source, SourceArgs};
use crate::{ExitCode, LogArgs};

/// List customers, the accounts of one customer, or the snapshot times of one
/// account.
#[derive(Debug, Clone, clap::Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long)]
    pub customer_id: Option<String>,

    #[arg(long, requires = "customer_id")]
    pub account: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

/// The lines `list` prints for the given scope.
#[must_use]
pub fn listing(catalog: &Catalog, customer_id: Option<&str>, account_id: Option<&str>) -> Vec<String> {
    match (customer_id, account_id) {
        (None, _) => catalog.customers().map(str::to_string).collect(),
        (Some(customer), None) => catalog
            .accounts(customer)
            .into_iter()
            .map(str::to_string)
            .collect(),
        (Some(customer), Some(account)) => catalog
            .snapshot_times(customer, account)
            .into_iter()
            .map(|t| t.format(TIMESTAMP_LAYOUT).to_string())
            .collect(),
    }
}

/// Executes the `list` subcommand.
///
/// A customer or account with nothing cataloged is [`ExitCode::NotFound`].
pub fn execute(args: ListArgs) -> Result<ExitCode, anyhow::Error> {
    args.log.init();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let source = Source::resolve(&args.source, &config)?;
    let catalog = build_catalog(&source, &config, args.customer_id.as_deref(), &args.log)?;

    let lines = listing(&catalog, args.customer_id.as_deref(), args.account.as_deref());
    if lines.is_empty() && args.customer_id.is_some() {
        eprintln!("vigil: nothing cataloged for the requested customer/account");
        return Ok(ExitCode::NotFound);
    }
    for line in &lines {
        println!("{line}");
    }
    Ok(ExitCode::Success)
}
