//! The `stats` CLI subcommand -- catalog statistics plus a per-account dump.

use vigil_catalog::{AccountSummary, Catalog};

use super::{build_catalog, load_config};
use crate::source::{Source, SourceArgs};
use crate::{ExitCode, LogArgs};

/// Print catalog statistics and one line per cataloged account.
#[derive(Debug, Clone, clap::Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Only count this customer.
    #[arg(long)]
    pub customer_id: Option<String>,

    /// Only count this account of the customer.
    #[arg(long, requires = "customer_id")]
    pub account: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

fn account_line(summary: &AccountSummary) -> String {
    let span = match (summary.first_day, summary.last_day) {
        (Some(first), Some(last)) if first == last => first.to_string(),
        (Some(first), Some(last)) => format!("{first}..{last}"),
        _ => "-".to_string(),
    };
    format!(
        "{}/{}  days={}  {}  {}",
        summary.customer_id,
        summary.account_id,
        summary.days,
        span,
        summary.kinds.join(",")
    )
}

/// The lines `stats` prints: totals first, then one line per account.
#[must_use]
pub fn report(catalog: &Catalog) -> Vec<String> {
    let stats = catalog.statistics();
    let mut lines = vec![
        format!("customers: {}", stats.customers),
        format!("accounts:  {}", stats.accounts),
        format!("snapshots: {}", stats.snapshots),
    ];
    lines.extend(catalog.dump().iter().map(account_line));
    lines
}

/// Restricts `catalog` to a customer and optionally one of its accounts.
#[must_use]
pub fn scoped(catalog: Catalog, customer_id: Option<&str>, account_id: Option<&str>) -> Catalog {
    match customer_id {
        Some(customer) => catalog.narrow(customer, account_id),
        None => catalog,
    }
}

/// Executes the `stats` subcommand.
///
/// A customer or account with nothing cataloged is [`ExitCode::NotFound`].
pub fn execute(args: StatsArgs) -> Result<ExitCode, anyhow::Error> {
    args.log.init();

    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return Ok(code),
    };
    let source = Source::resolve(&args.source, &config)?;
    let catalog = build_catalog(&source, &config, args.customer_id.as_deref(), &args.log)?;
    let catalog = scoped(catalog, args.customer_id.as_deref(), args.account.as_deref());
    if catalog.is_empty() && args.customer_id.is_some() {
        eprintln!("vigil: nothing cataloged for the requested customer/account");
        return Ok(ExitCode::NotFound);
    }

    for line in report(&catalog) {
        println!("{line}");
    }
    Ok(ExitCode::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_catalog::{KindSelector, ListPage};

    fn catalog(keys: &[&str]) -> Catalog {
        let page = ListPage {
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
            continuation: None,
        };
        vigil_catalog::build_from_object_listing([Ok(page)], &KindSelector::default()).unwrap()
    }

    #[test]
    fn report_lists_totals_then_accounts() {
        let catalog = catalog(&[
            "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv",
            "customers/C1/reports/aws/111/2021/05/resources.2021-05-30-0750.csv",
            "customers/C1/reports/aws/111/2021/06/principals.2021-06-08-0755.csv",
            "customers/C2/reports/aws/333/2021/05/resources.2021-05-30-0750.csv",
        ]);
        assert_eq!(
            report(&catalog),
            vec![
                "customers: 2",
                "accounts:  2",
                "snapshots: 4",
                "C1/111  days=2  2021-05-30..2021-06-08  principals,resources",
                "C2/333  days=1  2021-05-30  resources",
            ]
        );
    }

    #[test]
    fn scoped_report_counts_one_account() {
        let keys = [
            "customers/C1/reports/aws/111/2021/05/principals.2021-05-30-0750.csv",
            "customers/C1/reports/aws/222/2021/06/principals.2021-06-08-0755.csv",
            "customers/C2/reports/aws/333/2021/05/resources.2021-05-30-0750.csv",
        ];
        assert_eq!(
            report(&scoped(catalog(&keys), Some("C1"), Some("222"))),
            vec![
                "customers: 1",
                "accounts:  1",
                "snapshots: 1",
                "C1/222  days=1  2021-06-08  principals",
            ]
        );
        assert_eq!(report(&scoped(catalog(&keys), Some("C1"), None))[1], "accounts:  2");
        assert!(scoped(catalog(&keys), Some("C9"), None).is_empty());
        assert_eq!(scoped(catalog(&keys), None, None).statistics().customers, 2);
    }

    #[test]
    fn empty_catalog_reports_zeroes() {
        let catalog = catalog(&[]);
        assert_eq!(report(&catalog), vec!["customers: 0", "accounts:  0", "snapshots: 0"]);
    }
}
