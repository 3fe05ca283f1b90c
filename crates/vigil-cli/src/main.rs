use clap::{Parser, Subcommand};

use vigil_cli::commands;

/// Vigil -- catalog, query, diff and mirror access-audit report snapshots.
#[derive(Parser)]
#[command(name = "vigil", about = "Vigil -- catalog, query, diff and mirror access-audit report snapshots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List customers, accounts, or snapshot times.
    List(commands::list::ListArgs),
    /// Query a report of one snapshot.
    Query(commands::query::QueryArgs),
    /// Diff the latest snapshot against an earlier one.
    Diff(commands::diff::DiffArgs),
    /// Mirror one account's snapshots into a local report tree.
    Sync(commands::sync::SyncArgs),
    /// Show catalog statistics.
    Stats(commands::stats::StatsArgs),
    /// Show or validate vigil configuration.
    Config(commands::config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List(args) => commands::list::execute(args),
        Commands::Query(args) => commands::query::execute(args),
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Sync(args) => commands::sync::execute(args),
        Commands::Stats(args) => commands::stats::execute(args),
        Commands::Config(args) => commands::config::execute(args),
    };

    match result {
        Ok(code) => vigil_cli::terminate(code),
        Err(err) => {
            eprintln!("vigil: error: {err:#}");
            vigil_cli::terminate(vigil_cli::ExitCode::EngineError)
        }
    }
}
