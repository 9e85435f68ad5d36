//! rolesync — reconcile guild member roles against a roster snapshot.
//!
//! # Usage
//!
//! ```text
//! rolesync init --guild <id> --current-role <id> --former-role <id> [--api-base <url>]
//! rolesync members [--json]
//! rolesync diff <roster.csv> [--duplicates independent|last-wins] [--json] [--out <request.json>]
//! rolesync apply <roster.csv> [--dry-run] [--failed-out <request.json>] [--json]
//! rolesync apply --changes <request.json> [--failed-out <request.json>] [--json]
//! ```
//!
//! Every command that talks to the remote service takes `--token` or
//! `ROLESYNC_TOKEN`.

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use commands::{apply::ApplyArgs, diff::DiffArgs, init::InitArgs, members::MembersArgs};
use rolesync_core::DuplicatePolicy;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rolesync",
    version,
    about = "Reconcile guild member roles against a roster snapshot",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.rolesync/config.yaml.
    Init(InitArgs),

    /// List the live roster with role counts.
    Members(MembersArgs),

    /// Show the role changes a roster snapshot would cause.
    Diff(DiffArgs),

    /// Apply role changes and report per-change outcomes.
    Apply(ApplyArgs),
}

// ---------------------------------------------------------------------------
// Shared arguments
// ---------------------------------------------------------------------------

/// Credential for the remote service.
#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// Token forwarded to the remote service.
    #[arg(long, env = "ROLESYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Thin wrapper so clap can parse `DuplicatePolicy` from CLI args.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicatesArg(pub DuplicatePolicy);

impl FromStr for DuplicatesArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "independent" => Ok(Self(DuplicatePolicy::Independent)),
            "last-wins" | "last" => Ok(Self(DuplicatePolicy::LastWins)),
            other => Err(format!(
                "unknown duplicate policy '{other}'; expected: independent, last-wins"
            )),
        }
    }
}

impl fmt::Display for DuplicatesArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            DuplicatePolicy::Independent => f.write_str("independent"),
            DuplicatePolicy::LastWins => f.write_str("last-wins"),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Members(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Apply(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
