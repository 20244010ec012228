//! `wavecheck manns` - build user-mapping sheets from target-side
//! mannequins.

use std::path::PathBuf;

use wavecheck::mannequin::harvest_mannequins;
use wavecheck::wave::OrgMapping;
use wavecheck::{GitHubClient, Side, SnapshotStore};

use crate::config::Config;
use crate::progress::ProgressReporter;

use super::{CommandResult, dry_run_dir, org_role};

#[derive(Debug, clap::Args)]
pub(crate) struct MannsArgs {
    /// Organizations to process (defaults to the wave's mapping entries)
    #[arg(long = "org", value_name = "ORG")]
    pub orgs: Vec<String>,

    /// Personal access token (overrides the configured target token)
    #[arg(long)]
    pub pat: Option<String>,

    /// Is this a dry-run?
    #[arg(long)]
    pub dry_run: bool,

    /// Wave number
    #[arg(long)]
    pub wave: u32,

    /// Org mapping table (defaults to the configured path)
    #[arg(short = 'w', long)]
    pub mapping: Option<PathBuf>,

    /// Output directory (defaults to the configured logs directory)
    pub output_dir: Option<PathBuf>,
}

pub(crate) async fn handle_manns(args: MannsArgs, config: &Config) -> CommandResult {
    let base = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.paths.logs.clone());
    let store = SnapshotStore::new(dry_run_dir(&base, args.dry_run))?;

    let orgs = if args.orgs.is_empty() {
        let mapping_path = args
            .mapping
            .clone()
            .unwrap_or_else(|| config.paths.mapping.clone());
        let mapping = OrgMapping::load(&mapping_path)?;
        mapping.orgs_for_wave(org_role(Side::Target, args.dry_run), args.wave)?
    } else {
        args.orgs.clone()
    };

    let token = config
        .token_for(args.pat.as_deref(), Side::Target)
        .ok_or_else(|| "no target token configured; pass --pat or set the config".to_string())?;

    tracing::info!(?orgs, wave = args.wave, "Inventorying mannequins");
    let on_progress = ProgressReporter::new().into_callback();

    for org in &orgs {
        let client = GitHubClient::new(&token)?;
        let harvest = harvest_mannequins(&client, org, Some(&on_progress)).await?;

        for (login, error) in &harvest.failures {
            tracing::warn!(org = %org, mannequin = %login, error = %error, "Mannequin not captured");
        }

        let path = store.mannequin_path(org);
        store.reset(&path)?;
        store.touch(&path)?;
        store.append_all(&path, &harvest.records)?;
        tracing::info!(
            org = %org,
            mannequins = harvest.records.len(),
            failed = harvest.failures.len(),
            path = %path.display(),
            "Mannequin sheet written"
        );
    }

    Ok(())
}
