//! `wavecheck report` - post-migration reports from run logs and captures.
//!
//! Before the final pass this parses the wave's migration run logs into
//! timing and incident tables. In every pass it reconciles the stats
//! captures (before/source against after/target, with after/source as
//! context) and the per-org entity captures, handing each table to the
//! report sink.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use wavecheck::reconcile::STATS_IGNORE_COLUMNS;
use wavecheck::timeline::{Incident, OrgTiming, RepoTiming, parse_org_logs};
use wavecheck::wave::OrgMapping;
use wavecheck::{
    Entity, NamedTable, Phase, ReportKind, ReportSink, Side, SnapshotStore, Table, compare_tables,
};

use crate::config::Config;
use crate::sink::CsvReportSink;

use super::{CommandResult, dry_run_dir, org_role};

#[derive(Debug, clap::Args)]
pub(crate) struct ReportArgs {
    /// Is this after the post-migration activities have completed?
    #[arg(long = "final")]
    pub final_run: bool,

    /// Is this a dry-run?
    #[arg(long)]
    pub dry_run: bool,

    /// Wave number
    #[arg(long)]
    pub wave: u32,

    /// Org mapping table (defaults to the configured path)
    #[arg(short = 'w', long)]
    pub mapping: Option<PathBuf>,

    /// Logs directory (defaults to the configured logs directory)
    pub logs_dir: Option<PathBuf>,
}

/// Table-name suffix distinguishing the run axes.
fn run_suffix(dry_run: bool, final_run: bool, wave: u32) -> String {
    match (dry_run, final_run) {
        (true, true) => format!("final-dry-run-w{wave}"),
        (true, false) => format!("dry-run-w{wave}"),
        (false, true) => format!("final-w{wave}"),
        (false, false) => format!("prod-w{wave}"),
    }
}

fn ts(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn org_timing_row(timing: &OrgTiming) -> Vec<String> {
    vec![
        timing.org.clone(),
        ts(&timing.start_time),
        ts(&timing.end_time),
        timing.duration_mins.to_string(),
    ]
}

fn repo_timing_row(timing: &RepoTiming) -> Vec<String> {
    vec![
        timing.org.clone(),
        timing.repo.clone(),
        ts(&timing.start_time),
        ts(&timing.end_time),
        timing.duration_mins.to_string(),
    ]
}

fn incident_row(incident: &Incident) -> Vec<String> {
    vec![
        incident.org.clone(),
        incident.repo.clone(),
        incident.severity.to_string(),
        incident.message.clone(),
    ]
}

pub(crate) async fn handle_report(args: ReportArgs, config: &Config) -> CommandResult {
    let mapping_path = args
        .mapping
        .clone()
        .unwrap_or_else(|| config.paths.mapping.clone());
    let mapping = OrgMapping::load(&mapping_path)?;

    let logs_dir = dry_run_dir(
        &args
            .logs_dir
            .clone()
            .unwrap_or_else(|| config.paths.logs.clone()),
        args.dry_run,
    );
    let snaps_dir = dry_run_dir(&config.paths.snapshots, args.dry_run);
    let mut sink = CsvReportSink::new(&config.paths.report)?;
    let suffix = run_suffix(args.dry_run, args.final_run, args.wave);

    // Run logs only exist for the migration itself, not the final pass.
    if !args.final_run {
        tracing::info!(wave = args.wave, "Generating migration timing reports");
        let orgs = mapping.orgs_for_wave(org_role(Side::Target, args.dry_run), args.wave)?;

        let mut org_timings = NamedTable::new(
            format!("org-timings-{suffix}"),
            ["org", "start_time", "end_time", "duration (mins)"]
                .map(String::from)
                .to_vec(),
        );
        let mut repo_timings = NamedTable::new(
            format!("repo-timings-{suffix}"),
            ["org", "repo", "start_time", "end_time", "duration (mins)"]
                .map(String::from)
                .to_vec(),
        );
        let mut incidents = NamedTable::new(
            format!("repo-logs-{suffix}"),
            ["org", "repo", "type", "message"].map(String::from).to_vec(),
        );

        for org in &orgs {
            match parse_org_logs(org, &logs_dir) {
                Ok(report) => {
                    org_timings.rows.push(org_timing_row(&report.timing));
                    repo_timings
                        .rows
                        .extend(report.repo_timings.iter().map(repo_timing_row));
                    incidents.rows.extend(report.incidents.iter().map(incident_row));
                    for failure in &report.failures {
                        tracing::warn!(
                            org = %org,
                            log = %failure.path.display(),
                            error = %failure.error,
                            "Repository log not extracted"
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(org = %org, error = %error, "Organization log extraction failed");
                }
            }
        }

        sink.write_table(&org_timings)?;
        sink.write_table(&repo_timings)?;
        sink.write_table(&incidents)?;
    }

    // Stats reconciliation: before/source vs after/target, with
    // after/source as the drift context. The final pass compares
    // after/source instead of before/source.
    tracing::info!(wave = args.wave, "Generating stats report");
    let log_store = SnapshotStore::new(&logs_dir)?;
    let source_phase = if args.final_run { Phase::After } else { Phase::Before };

    let mut source = Table::load(&log_store.stats_path(source_phase, Side::Source, args.wave))?;
    let mut target = Table::load(&log_store.stats_path(Phase::After, Side::Target, args.wave))?;
    let mut context = Table::load(&log_store.stats_path(Phase::After, Side::Source, args.wave))?;
    for table in [&mut source, &mut target, &mut context] {
        table.drop_columns(&STATS_IGNORE_COLUMNS);
    }

    let diffs = compare_tables("name", &source, &target, Some(&context), ReportKind::Stats)?;
    let mut stats_table = NamedTable::new(
        format!("post-stats-{suffix}"),
        ReportKind::Stats.headers(),
    );
    stats_table.rows = diffs.iter().map(|d| d.to_row(ReportKind::Stats)).collect();
    sink.write_table(&stats_table)?;

    // Entity snapshot reconciliation, per org pair, per entity.
    tracing::info!(wave = args.wave, "Generating snapshot reports");
    let snap_store = SnapshotStore::new(&snaps_dir)?;
    let pairs = mapping.pairs_for_wave(args.wave, args.dry_run)?;

    for entity in Entity::ALL {
        let mut headers = vec!["source_org".to_string(), "target_org".to_string()];
        headers.extend(ReportKind::Snapshots.headers());
        let mut table = NamedTable::new(format!("post-snaps-{entity}-{suffix}"), headers);

        for pair in &pairs {
            let mut source = Table::load(&snap_store.entity_path(
                source_phase,
                Side::Source,
                &pair.source,
                entity,
            ))?;
            let mut target = Table::load(&snap_store.entity_path(
                Phase::After,
                Side::Target,
                &pair.target,
                entity,
            ))?;
            source.drop_columns_with_suffix("url");
            target.drop_columns_with_suffix("url");

            // An empty capture has no columns to compare.
            if source.headers().is_empty() || target.headers().is_empty() {
                continue;
            }

            let diffs = compare_tables(
                entity.key_column(),
                &source,
                &target,
                None,
                ReportKind::Snapshots,
            )?;
            for diff in diffs {
                let mut row = vec![pair.source.clone(), pair.target.clone()];
                row.extend(diff.to_row(ReportKind::Snapshots));
                table.rows.push(row);
            }
        }

        sink.write_table(&table)?;
    }

    Ok(())
}
