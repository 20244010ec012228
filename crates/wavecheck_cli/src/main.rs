//! Wavecheck CLI - command-line interface for the migration verifier.

mod commands;
mod config;
mod progress;
mod sink;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wavecheck")]
#[command(version)]
#[command(about = "Inventory and reconciliation for wave-based org migrations")]
#[command(
    long_about = "Wavecheck captures point-in-time inventories of GitHub organizations \
before and after a migration wave, extracts timing and incident facts from the \
migration run logs, and reconciles the captures to detect data loss, metadata \
drift, or silent migration failures."
)]
#[command(after_long_help = r#"EXAMPLES
    Capture the pre-migration inventory of wave 1's source orgs:
        $ wavecheck stats --before --source --wave 1

    Resume an inventory that was killed partway:
        $ wavecheck stats --before --source --wave 1 --resume

    Capture entity snapshots of the dry-run targets:
        $ wavecheck snapshots --after --target --dry-run --wave 1

    Build the post-migration reports for wave 1:
        $ wavecheck report --wave 1

    Render the unarchive script for wave 1:
        $ wavecheck scripts unarchive --wave 1

CONFIGURATION
    Wavecheck reads configuration from:
      1. ~/.config/wavecheck/config.toml (or $XDG_CONFIG_HOME/wavecheck/config.toml)
      2. ./wavecheck.toml
      3. Environment variables (WAVECHECK_* prefix)

ENVIRONMENT VARIABLES
    WAVECHECK_TOKENS_SOURCE   Token for source organizations
    WAVECHECK_TOKENS_TARGET   Token for target organizations
    WAVECHECK_PATHS_LOGS      Stats captures and migration run logs (default: logs)
    WAVECHECK_PATHS_SNAPSHOTS Entity snapshot captures (default: snapshots)
    WAVECHECK_PATHS_REPORT    Report tables (default: report)
    WAVECHECK_PATHS_MAPPING   Org mapping table (default: report/org-mapping.csv)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture repository inventories for a wave
    Stats(commands::stats::StatsArgs),
    /// Capture entity snapshots (users, repos, teams, memberships)
    Snapshots(commands::snapshots::SnapshotsArgs),
    /// Build post-migration reports from run logs and captures
    Report(commands::report::ReportArgs),
    /// Build user-mapping sheets from target-side mannequins
    Manns(commands::manns::MannsArgs),
    /// Render operator-run shell scripts from captures
    Scripts {
        #[command(subcommand)]
        action: commands::scripts::ScriptsAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = config::Config::load()?;

    match cli.command {
        Commands::Stats(args) => commands::stats::handle_stats(args, &config).await?,
        Commands::Snapshots(args) => commands::snapshots::handle_snapshots(args, &config).await?,
        Commands::Report(args) => commands::report::handle_report(args, &config).await?,
        Commands::Manns(args) => commands::manns::handle_manns(args, &config).await?,
        Commands::Scripts { action } => commands::scripts::handle_scripts(action, &config)?,
    }

    Ok(())
}
