//! `wavecheck snapshots` - capture entity snapshots for a wave.

use std::path::PathBuf;

use wavecheck::snapshot::entities::snapshot_org;
use wavecheck::wave::OrgMapping;
use wavecheck::{GitHubClient, SnapshotStore};

use crate::config::Config;
use crate::progress::ProgressReporter;

use super::{CaptureAxes, CommandResult, dry_run_dir, org_role};

#[derive(Debug, clap::Args)]
pub(crate) struct SnapshotsArgs {
    /// Organizations to process (defaults to the wave's mapping entries)
    #[arg(long = "org", value_name = "ORG")]
    pub orgs: Vec<String>,

    /// Personal access token (overrides the configured token)
    #[arg(long)]
    pub pat: Option<String>,

    #[command(flatten)]
    pub axes: CaptureAxes,

    /// Is this a dry-run?
    #[arg(long)]
    pub dry_run: bool,

    /// Wave number
    #[arg(long)]
    pub wave: u32,

    /// Org mapping table (defaults to the configured path)
    #[arg(short = 'w', long)]
    pub mapping: Option<PathBuf>,

    /// Output directory (defaults to the configured snapshots directory)
    pub output_dir: Option<PathBuf>,
}

pub(crate) async fn handle_snapshots(args: SnapshotsArgs, config: &Config) -> CommandResult {
    let (phase, side) = args.axes.resolve()?;

    let base = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.paths.snapshots.clone());
    let store = SnapshotStore::new(dry_run_dir(&base, args.dry_run))?;

    let orgs = if args.orgs.is_empty() {
        let mapping_path = args
            .mapping
            .clone()
            .unwrap_or_else(|| config.paths.mapping.clone());
        let mapping = OrgMapping::load(&mapping_path)?;
        mapping.orgs_for_wave(org_role(side, args.dry_run), args.wave)?
    } else {
        args.orgs.clone()
    };

    let token = config
        .token_for(args.pat.as_deref(), side)
        .ok_or_else(|| format!("no {side} token configured; pass --pat or set the config"))?;

    tracing::info!(?orgs, wave = args.wave, "Snapshotting");
    let on_progress = ProgressReporter::new().into_callback();

    for org in &orgs {
        let client = GitHubClient::new(&token)?;
        let snapshot = snapshot_org(&client, &store, phase, side, org, Some(&on_progress)).await?;
        tracing::info!(
            org = %org,
            users = snapshot.users,
            repos = snapshot.repos,
            teams = snapshot.teams,
            team_repos = snapshot.team_repos,
            team_users = snapshot.team_users,
            "Snapshots captured"
        );
    }

    Ok(())
}
