//! The `query` CLI subcommand -- look up records and evaluate risk policies
//! against one snapshot.

use serde::Serialize;

use vigil_report::access::{
    self, AccessibilityPolicy, CapabilityLimitPolicy, PrincipalAccessCounts, ResourceAccessCounts,
};
use vigil_report::{
    Principal, PrincipalAccessSummary, ReportRecord, Resource, ResourceAccessSummary,
};

use super::{open_snapshot, Loaded, SnapshotArgs};
use crate::output::{emit, OutputFormat};
use crate::ExitCode;

// ---------------------------------------------------------------------------
// QueryArgs
// ---------------------------------------------------------------------------

/// Query a report of one snapshot.
#[derive(Debug, clap::Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub target: QueryTarget,
}

#[derive(Debug, clap::Subcommand)]
pub enum QueryTarget {
    /// Look up principals.
    #[command(alias = "principal")]
    Principals(RecordArgs),
    /// Look up resources.
    #[command(alias = "resource")]
    Resources(RecordArgs),
    /// Look up principal access summaries.
    PrincipalAccess(RecordArgs),
    /// Look up resource access summaries.
    ResourceAccess(RecordArgs),
    /// Evaluate risk policies.
    Risks(RisksArgs),
}

/// Snapshot selection plus record filters.
#[derive(Debug, Clone, clap::Args)]
pub struct RecordArgs {
    #[command(flatten)]
    pub snapshot: SnapshotArgs,

    /// ARN to select (repeatable).
    #[arg(long = "arn")]
    pub arns: Vec<String>,

    /// Name to select (repeatable).
    #[arg(long = "name")]
    pub names: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct RisksArgs {
    #[command(subcommand)]
    pub risk: RiskQuery,
}

#[derive(Debug, clap::Subcommand)]
pub enum RiskQuery {
    /// Principals that are IAM administrators.
    PrivilegeEscalation(SnapshotArgs),
    /// Principals administering more resources than allowed.
    OverPermissionedPrincipals(PrincipalRiskArgs),
    /// Resources reachable by more principals than allowed.
    #[command(alias = "accessible")]
    OverAccessibleResources(ResourceRiskArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct PrincipalRiskArgs {
    #[command(flatten)]
    pub snapshot: SnapshotArgs,

    /// Service to evaluate (repeatable).
    #[arg(long = "service", required = true)]
    pub services: Vec<String>,

    /// Maximum resources a principal may administer.
    #[arg(long, default_value_t = 5)]
    pub max_admin: usize,

    /// Maximum resources a principal may read, write and delete.
    #[arg(long, default_value_t = 5)]
    pub max_rwd: usize,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ResourceRiskArgs {
    #[command(flatten)]
    pub snapshot: SnapshotArgs,

    /// Service to evaluate (repeatable).
    #[arg(long = "service", required = true)]
    pub services: Vec<String>,

    /// Maximum principals with administer-resource access.
    #[arg(long, default_value_t = 5)]
    pub max_admin: usize,

    /// Maximum principals with read-data access.
    #[arg(long, default_value_t = 5)]
    pub max_read: usize,

    /// Maximum principals with write-data access.
    #[arg(long, default_value_t = 5)]
    pub max_write: usize,

    /// Maximum principals with delete-data access.
    #[arg(long, default_value_t = 5)]
    pub max_delete: usize,
}

// ---------------------------------------------------------------------------
// Record filters
// ---------------------------------------------------------------------------

/// The ARN and name a record is selected by.
pub trait Selectable {
    fn arn(&self) -> &str;
    fn name(&self) -> &str;
}

impl Selectable for Principal {
    fn arn(&self) -> &str {
        &self.principal_arn
    }
    fn name(&self) -> &str {
        &self.principal_name
    }
}

impl Selectable for Resource {
    fn arn(&self) -> &str {
        &self.resource_arn
    }
    fn name(&self) -> &str {
        &self.resource_name
    }
}

impl Selectable for PrincipalAccessSummary {
    fn arn(&self) -> &str {
        &self.principal_arn
    }
    fn name(&self) -> &str {
        &self.principal_name
    }
}

impl Selectable for ResourceAccessSummary {
    fn arn(&self) -> &str {
        &self.resource_arn
    }
    fn name(&self) -> &str {
        &self.resource_name
    }
}

/// Records whose ARN is in `arns` or whose name is in `names`; everything
/// when both are empty.
pub fn select<'a, R: Selectable>(records: &'a [R], arns: &[String], names: &[String]) -> Vec<&'a R> {
    if arns.is_empty() && names.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| arns.iter().any(|a| a == r.arn()) || names.iter().any(|n| n == r.name()))
        .collect()
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

/// Executes the `query` subcommand.
pub fn execute(args: QueryArgs) -> Result<ExitCode, anyhow::Error> {
    match args.target {
        QueryTarget::Principals(args) => query_records::<Principal>(&args),
        QueryTarget::Resources(args) => query_records::<Resource>(&args),
        QueryTarget::PrincipalAccess(args) => query_records::<PrincipalAccessSummary>(&args),
        QueryTarget::ResourceAccess(args) => query_records::<ResourceAccessSummary>(&args),
        QueryTarget::Risks(risks) => match risks.risk {
            RiskQuery::PrivilegeEscalation(args) => privilege_escalation(&args),
            RiskQuery::OverPermissionedPrincipals(args) => over_permissioned(&args),
            RiskQuery::OverAccessibleResources(args) => over_accessible(&args),
        },
    }
}

fn query_records<R>(args: &RecordArgs) -> Result<ExitCode, anyhow::Error>
where
    R: ReportRecord + Selectable + Serialize,
{
    let snapshot = match open_snapshot::<R>(&args.snapshot)? {
        Loaded::Ready(snapshot) => snapshot,
        Loaded::Halt(code) => return Ok(code),
    };
    let selected = select(&snapshot.records, &args.arns, &args.names);
    tracing::debug!(selected = selected.len(), total = snapshot.records.len(), "records selected");
    emit(&selected, snapshot.format, args.snapshot.output.as_deref())?;
    Ok(ExitCode::Success)
}

fn privilege_escalation(args: &SnapshotArgs) -> Result<ExitCode, anyhow::Error> {
    let snapshot = match open_snapshot::<Principal>(args)? {
        Loaded::Ready(snapshot) => snapshot,
        Loaded::Halt(code) => return Ok(code),
    };
    let admins = access::privilege_escalation(&snapshot.records);
    emit(&admins, snapshot.format, args.output.as_deref())?;
    Ok(ExitCode::Success)
}

fn over_permissioned(args: &PrincipalRiskArgs) -> Result<ExitCode, anyhow::Error> {
    let snapshot = match open_snapshot::<PrincipalAccessSummary>(&args.snapshot)? {
        Loaded::Ready(snapshot) => snapshot,
        Loaded::Halt(code) => return Ok(code),
    };
    let policy = CapabilityLimitPolicy {
        admin_cap: args.max_admin,
        rwd_cap: args.max_rwd,
    };
    let violations = access::over_permissioned_principals(&snapshot.records, &args.services, &policy);
    let output = args.snapshot.output.as_deref();
    match snapshot.format {
        OutputFormat::Json => emit(&violations, OutputFormat::Json, output)?,
        OutputFormat::Csv => {
            let rows: Vec<PrincipalAccessCounts> = violations.iter().map(Into::into).collect();
            emit(&rows, OutputFormat::Csv, output)?;
        }
    }
    Ok(ExitCode::Success)
}

fn over_accessible(args: &ResourceRiskArgs) -> Result<ExitCode, anyhow::Error> {
    let snapshot = match open_snapshot::<ResourceAccessSummary>(&args.snapshot)? {
        Loaded::Ready(snapshot) => snapshot,
        Loaded::Halt(code) => return Ok(code),
    };
    let policy = AccessibilityPolicy {
        admin_cap: args.max_admin,
        read_cap: args.max_read,
        write_cap: args.max_write,
        delete_cap: args.max_delete,
    };
    let violations = access::over_accessible_resources(&snapshot.records, &args.services, &policy);
    let output = args.snapshot.output.as_deref();
    match snapshot.format {
        OutputFormat::Json => emit(&violations, OutputFormat::Json, output)?,
        OutputFormat::Csv => {
            let rows: Vec<ResourceAccessCounts> = violations.iter().map(Into::into).collect();
            emit(&rows, OutputFormat::Csv, output)?;
        }
    }
    Ok(ExitCode::Success)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
