//! The `config` CLI subcommand -- show and validate Vigil configuration.

use anyhow::Context;

use vigil_core::config::{self, VigilConfig};

use crate::ExitCode;

// ---------------------------------------------------------------------------
// ConfigArgs
// ---------------------------------------------------------------------------

/// Manage Vigil configuration.
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config sub-subcommands.
#[derive(Debug, clap::Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Validate the layered configuration files.
    Validate,
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

/// Executes the `config` subcommand.
///
/// Returns an [`ExitCode`] indicating the outcome.
pub fn execute(args: ConfigArgs) -> Result<ExitCode, anyhow::Error> {
    let cwd = std::env::current_dir().ok();
    match args.action {
        ConfigAction::Show => execute_show(cwd.as_deref()),
        ConfigAction::Validate => execute_validate(cwd.as_deref()),
    }
}

/// Renders `cfg` as the YAML `config show` prints.
pub fn to_yaml(cfg: &VigilConfig) -> anyhow::Result<String> {
    serde_yml::to_string(cfg).context("failed to serialize configuration to YAML")
}

/// Loads the effective configuration, serializes it to YAML, and prints it to stdout.
fn execute_show(project_dir: Option<&std::path::Path>) -> Result<ExitCode, anyhow::Error> {
    let cfg = match config::load_config(project_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return Ok(ExitCode::ConfigError);
        }
    };
    print!("{}", to_yaml(&cfg)?);
    Ok(ExitCode::Success)
}

/// Loads the configuration and reports whether it is usable.
fn execute_validate(project_dir: Option<&std::path::Path>) -> Result<ExitCode, anyhow::Error> {
    match config::load_config(project_dir).and_then(|cfg| config::validate(&cfg)) {
        Ok(()) => {
            println!("Configuration is valid.");
            Ok(ExitCode::Success)
        }
        Err(e) => {
            eprintln!("Configuration error: {e}");
            Ok(ExitCode::ConfigError)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
