//! `wavecheck scripts` - render operator-run shell scripts from captures.

use std::path::PathBuf;

use wavecheck::{Phase, Side, SnapshotStore, Table};

use crate::config::Config;

use super::{CommandResult, dry_run_dir};

#[derive(Debug, clap::Subcommand)]
pub(crate) enum ScriptsAction {
    /// Render the unarchive script for a wave's archived source repos
    Unarchive {
        /// Is this a dry-run?
        #[arg(long)]
        dry_run: bool,

        /// Wave number
        #[arg(long)]
        wave: u32,

        /// Logs directory holding the before/source capture
        logs_dir: Option<PathBuf>,
    },
}

pub(crate) fn handle_scripts(action: ScriptsAction, config: &Config) -> CommandResult {
    match action {
        ScriptsAction::Unarchive {
            dry_run,
            wave,
            logs_dir,
        } => {
            let prefix = if dry_run { "DRY-RUN" } else { "PRODUCTION" };
            tracing::info!(wave, prefix, "Generating unarchive script");

            let base = logs_dir.unwrap_or_else(|| config.paths.logs.clone());
            let store = SnapshotStore::new(dry_run_dir(&base, dry_run))?;
            let capture = Table::load(&store.stats_path(Phase::Before, Side::Source, wave))?;

            let script = render_unarchive(&capture)?;
            std::fs::create_dir_all(&config.paths.scripts)?;
            let path = config
                .paths
                .scripts
                .join(format!("{prefix}-wave-{wave}-unarchive-repos.sh"));
            std::fs::write(&path, script)?;
            tracing::info!(path = %path.display(), "Unarchive script written");
            Ok(())
        }
    }
}

/// Render `gh repo unarchive` lines for every archived repo in the capture.
///
/// Columns are addressed by name; a capture without the expected columns is
/// an error, not a positional guess.
fn render_unarchive(capture: &Table) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    for column in ["name", "owner.login", "isArchived"] {
        if capture.column(column).is_none() {
            return Err(format!("capture has no column named {column:?}").into());
        }
    }

    let mut script = String::from(
        "#!/usr/bin/env bash\n\
         #\n\
         # Unarchive the wave's archived repositories before migration.\n\
         # GEI cannot migrate archived repositories.\n\
         set -euo pipefail\n\n",
    );

    let mut count = 0usize;
    for row in 0..capture.len() {
        let archived = capture
            .value(row, "isArchived")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if !archived {
            continue;
        }
        let (Some(owner), Some(name)) = (
            capture.value(row, "owner.login"),
            capture.value(row, "name"),
        ) else {
            continue;
        };
        script.push_str(&format!("gh repo unarchive \"{owner}/{name}\" --yes\n"));
        count += 1;
    }

    if count == 0 {
        script.push_str("# No archived repositories in this wave.\n");
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(rows: &[(&str, &str, &str)]) -> Table {
        let mut table = Table::new(
            ["name", "owner.login", "isArchived"]
                .map(String::from)
                .to_vec(),
        );
        for (name, owner, archived) in rows {
            table.push_row(vec![
                Some((*name).to_string()),
                Some((*owner).to_string()),
                Some((*archived).to_string()),
            ]);
        }
        table
    }

    #[test]
    fn renders_one_line_per_archived_repo() {
        let table = capture(&[
            ("api", "acme", "true"),
            ("web", "acme", "false"),
            ("ops", "acme", "True"),
        ]);
        let script = render_unarchive(&table).expect("render");
        assert!(script.contains("gh repo unarchive \"acme/api\" --yes"));
        assert!(script.contains("gh repo unarchive \"acme/ops\" --yes"));
        assert!(!script.contains("acme/web"));
        assert!(script.starts_with("#!/usr/bin/env bash"));
    }

    #[test]
    fn an_empty_wave_renders_a_no_op_script() {
        let script = render_unarchive(&capture(&[])).expect("render");
        assert!(script.contains("# No archived repositories"));
    }

    #[test]
    fn missing_columns_are_an_error() {
        let table = Table::new(vec!["name".to_string()]);
        let err = render_unarchive(&table).expect_err("missing columns");
        assert!(err.to_string().contains("owner.login"));
    }
}
