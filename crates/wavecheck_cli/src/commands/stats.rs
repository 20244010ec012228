//! `wavecheck stats` - capture repository inventories for a wave.

use std::path::PathBuf;

use wavecheck::wave::OrgMapping;
use wavecheck::{GitHubClient, SnapshotStore, harvest_org};

use crate::config::Config;
use crate::progress::ProgressReporter;

use super::{CaptureAxes, CommandResult, dry_run_dir, org_role};

#[derive(Debug, clap::Args)]
pub(crate) struct StatsArgs {
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

    /// Resume an aborted stats run
    #[arg(long)]
    pub resume: bool,

    /// Org mapping table (defaults to the configured path)
    #[arg(short = 'w', long)]
    pub mapping: Option<PathBuf>,

    /// Output directory (defaults to the configured logs directory)
    pub output_dir: Option<PathBuf>,
}

pub(crate) async fn handle_stats(args: StatsArgs, config: &Config) -> CommandResult {
    let (phase, side) = args.axes.resolve()?;

    let base = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.paths.logs.clone());
    let store = SnapshotStore::new(dry_run_dir(&base, args.dry_run))?;
    let output = store.stats_path(phase, side, args.wave);

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

    if !args.resume {
        store.reset(&output)?;
    }

    tracing::info!(?orgs, wave = args.wave, "Beginning inventory");
    let on_progress = ProgressReporter::new().into_callback();

    let mut total_written = 0usize;
    let mut total_failures = 0usize;

    for org in &orgs {
        // One client per organization isolates rate-limit state.
        let client = GitHubClient::new(&token)?;
        let summary = harvest_org(
            &client,
            &store,
            &output,
            side,
            org,
            args.resume,
            Some(&on_progress),
        )
        .await?;

        for failure in &summary.failures {
            tracing::warn!(
                repo = %format!("{}/{}", failure.org, failure.repo),
                error = %failure.error,
                "Repository not captured"
            );
        }

        tracing::info!(
            org = %org,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failures.len(),
            "Organization inventoried"
        );
        total_written += summary.written;
        total_failures += summary.failures.len();
    }

    tracing::info!(
        written = total_written,
        failed = total_failures,
        output = %output.display(),
        "Inventory complete"
    );
    if total_failures > 0 {
        return Err(format!(
            "{total_failures} repositories failed; rerun with --resume to retry them"
        )
        .into());
    }
    Ok(())
}
