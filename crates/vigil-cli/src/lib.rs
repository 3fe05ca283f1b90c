//! Vigil CLI -- command-line interface over the report catalog, the diff
//! engine and the sync engine.
//!
//! This crate holds argument parsing, exit code definitions, output rendering
//! and the orchestration tying the library crates together.

use std::fmt;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub mod commands;
pub mod output;
pub mod source;

// ---------------------------------------------------------------------------
// Exit Codes
// ---------------------------------------------------------------------------

/// Vigil process exit codes.
///
/// | Code | Meaning                                   |
/// |------|-------------------------------------------|
/// | 0    | Command completed                         |
/// | 1    | No snapshot matched the request           |
/// | 2    | Engine error (catalog build, report load) |
/// | 3    | Sync finished with failed transfers       |
/// | 4    | Configuration or usage error              |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    NotFound = 1,
    EngineError = 2,
    PartialSync = 3,
    ConfigError = 4,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn all() -> &'static [ExitCode] {
        &[
            Self::Success,
            Self::NotFound,
            Self::EngineError,
            Self::PartialSync,
            Self::ConfigError,
        ]
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "command completed",
            Self::NotFound => "no matching snapshot",
            Self::EngineError => "engine error (catalog build, report load, I/O)",
            Self::PartialSync => "sync finished with failed transfers",
            Self::ConfigError => "configuration error (invalid config or arguments)",
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {} ({})", self.as_u8(), self.description())
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_u8())
    }
}

/// Logs the exit reason and converts `code` for returning from `main`.
pub fn terminate(code: ExitCode) -> std::process::ExitCode {
    match code {
        ExitCode::Success => tracing::debug!(%code, "vigil exiting"),
        _ => tracing::info!(%code, "vigil exiting with failure"),
    }
    code.into()
}

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Logging flags accepted by every command.
#[derive(Debug, Clone, Copy, Default, clap::Args)]
pub struct LogArgs {
    /// Enable verbose output.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Suppress all non-essential output.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
}

impl LogArgs {
    /// Installs the tracing subscriber. A second call in the same process
    /// (tests) is ignored.
    pub fn init(&self) {
        let _ = vigil_core::init_tracing(self.verbose, self.quiet, self.json_logs);
    }
}

/// Starts a steady-tick spinner on stderr unless `quiet`.
pub(crate) fn spinner(quiet: bool, message: String) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["=>", "==>", "===>", "====>", "=====>", ""]));
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.as_u8(), 0);
        assert_eq!(ExitCode::NotFound.as_u8(), 1);
        assert_eq!(ExitCode::EngineError.as_u8(), 2);
        assert_eq!(ExitCode::PartialSync.as_u8(), 3);
        assert_eq!(ExitCode::ConfigError.as_u8(), 4);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let mut seen: Vec<u8> = ExitCode::all().iter().map(|c| c.as_u8()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), ExitCode::all().len());
    }

    #[test]
    fn exit_code_display() {
        assert_eq!(
            ExitCode::PartialSync.to_string(),
            "exit code 3 (sync finished with failed transfers)"
        );
    }

    #[test]
    fn quiet_suppresses_spinner() {
        assert!(spinner(true, "building".to_string()).is_none());
    }
}
