pub(crate) mod manns;
pub(crate) mod report;
pub(crate) mod scripts;
pub(crate) mod snapshots;
pub(crate) mod stats;

use std::error::Error;
use std::path::{Path, PathBuf};

use wavecheck::{OrgRole, Phase, Side};

/// Commands report failures as boxed errors; main logs and exits non-zero.
pub(crate) type CommandResult = Result<(), Box<dyn Error + Send + Sync>>;

/// The before/after × source/target axis flags shared by the capture
/// commands. Exactly one of each pair must be supplied.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CaptureAxes {
    /// Run before migration
    #[arg(long)]
    pub before: bool,

    /// Run after migration
    #[arg(long)]
    pub after: bool,

    /// Source organization(s)
    #[arg(long)]
    pub source: bool,

    /// Target organization(s)
    #[arg(long)]
    pub target: bool,
}

impl CaptureAxes {
    pub(crate) fn resolve(&self) -> Result<(Phase, Side), Box<dyn Error + Send + Sync>> {
        if self.before == self.after {
            return Err("you must supply either --before or --after".into());
        }
        if self.source == self.target {
            return Err("you must supply either --source or --target".into());
        }
        let phase = if self.before { Phase::Before } else { Phase::After };
        let side = if self.source { Side::Source } else { Side::Target };
        Ok((phase, side))
    }
}

/// Which mapping column a capture of `side` reads, given the dry-run axis.
pub(crate) fn org_role(side: Side, dry_run: bool) -> OrgRole {
    match side {
        Side::Source => OrgRole::Source,
        Side::Target if dry_run => OrgRole::DryRunTarget,
        Side::Target => OrgRole::Target,
    }
}

/// Dry runs keep their outputs in a `dry-run` subdirectory.
pub(crate) fn dry_run_dir(base: &Path, dry_run: bool) -> PathBuf {
    if dry_run {
        base.join("dry-run")
    } else {
        base.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axes(before: bool, after: bool, source: bool, target: bool) -> CaptureAxes {
        CaptureAxes {
            before,
            after,
            source,
            target,
        }
    }

    #[test]
    fn exactly_one_flag_per_axis_is_required() {
        assert!(axes(true, false, true, false).resolve().is_ok());
        assert!(axes(false, true, false, true).resolve().is_ok());
        assert!(axes(true, true, true, false).resolve().is_err());
        assert!(axes(false, false, true, false).resolve().is_err());
        assert!(axes(true, false, true, true).resolve().is_err());
        assert!(axes(true, false, false, false).resolve().is_err());
    }

    #[test]
    fn target_captures_follow_the_dry_run_axis() {
        assert_eq!(org_role(Side::Source, true), OrgRole::Source);
        assert_eq!(org_role(Side::Target, false), OrgRole::Target);
        assert_eq!(org_role(Side::Target, true), OrgRole::DryRunTarget);
    }

    #[test]
    fn dry_runs_nest_their_output() {
        assert_eq!(
            dry_run_dir(Path::new("logs"), true),
            PathBuf::from("logs/dry-run")
        );
        assert_eq!(dry_run_dir(Path::new("logs"), false), PathBuf::from("logs"));
    }
}
