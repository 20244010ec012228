//! Migration run log timeline extraction.
//!
//! Run logs are plain text. Lines beginning with a literal `[` carry an
//! ISO-8601 `Z`-suffixed wall-clock timestamp followed by free text; only
//! those lines are considered for timing. An organization log holds one
//! start/completed marker pair; each repository log holds one start marker
//! and one terminal marker (complete or failed, depending on which
//! directory the log was filed under). Incident lines are any bracketed
//! line containing `WARN` or `ERROR`; a line containing both yields two
//! incidents.
//!
//! A malformed log is a typed error for that log alone; the directory
//! drivers collect per-log failures and keep going.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Marker phrase opening an organization migration log.
pub const ORG_START_MARKER: &str = "Organization migration started";
/// Marker phrase closing an organization migration log.
pub const ORG_END_MARKER: &str = "Organization migration completed";
/// Marker phrase opening a repository migration log.
pub const REPO_START_MARKER: &str = "Migration started";
/// Terminal marker of a successful repository migration.
pub const REPO_SUCCESS_MARKER: &str = "Migration complete";
/// Terminal marker of a failed repository migration.
pub const REPO_FAILURE_MARKER: &str = "Migration failed";

/// Name of the organization-level log inside an org's log directory.
pub const ORG_LOG_FILE: &str = "README.md";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which outcome directory a repository log was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Success,
    Failure,
}

impl LogKind {
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            LogKind::Success => "success",
            LogKind::Failure => "failure",
        }
    }

    /// The terminal marker this kind of log must contain.
    #[must_use]
    pub fn terminal_marker(self) -> &'static str {
        match self {
            LogKind::Success => REPO_SUCCESS_MARKER,
            LogKind::Failure => REPO_FAILURE_MARKER,
        }
    }
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{log}: no start marker found")]
    MissingStartMarker { log: String },

    #[error("{log}: {count} start markers found, expected exactly one")]
    AmbiguousStartMarker { log: String, count: usize },

    #[error("{log}: no terminal marker found")]
    MissingEndMarker { log: String },

    #[error("{log}: cannot parse timestamp from {token:?}")]
    BadTimestamp { log: String, token: String },

    #[error("{log}: end time precedes start time")]
    InvertedTiming { log: String },
}

/// Timing of one organization migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrgTiming {
    pub org: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "duration (mins)")]
    pub duration_mins: i64,
}

/// Timing of one repository migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoTiming {
    pub org: String,
    pub repo: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "duration (mins)")]
    pub duration_mins: i64,
}

/// Incident severity as tagged in the log text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warn => f.write_str("WARN"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// One warning or error line from a repository migration log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    pub org: String,
    pub repo: String,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
}

/// A repository log that could not be extracted; the rest of the
/// organization's logs were still processed.
#[derive(Debug)]
pub struct RepoLogFailure {
    pub path: PathBuf,
    pub error: TimelineError,
}

/// Everything extracted from one organization's log directory.
#[derive(Debug)]
pub struct OrgLogReport {
    pub timing: OrgTiming,
    pub repo_timings: Vec<RepoTiming>,
    pub incidents: Vec<Incident>,
    pub failures: Vec<RepoLogFailure>,
}

/// Lines that carry a timestamp.
fn bracketed_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|line| line.starts_with('['))
}

/// Parse the leading `[<timestamp>]` token of a bracketed line.
fn timestamp_of(log: &str, line: &str) -> Result<DateTime<Utc>, TimelineError> {
    let token = line.split(' ').next().unwrap_or(line);
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| TimelineError::BadTimestamp {
            log: log.to_string(),
            token: token.to_string(),
        })?;

    NaiveDateTime::parse_from_str(inner, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| TimelineError::BadTimestamp {
            log: log.to_string(),
            token: token.to_string(),
        })
}

/// Whole minutes between start and end; sub-minute precision is discarded.
fn duration_mins(
    log: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64, TimelineError> {
    if end < start {
        return Err(TimelineError::InvertedTiming {
            log: log.to_string(),
        });
    }
    Ok((end - start).num_seconds() / 60)
}

/// Extract the organization-level timing tuple from an org log.
///
/// Start and end are located by first match of the organization markers.
pub fn extract_org_timing(org: &str, text: &str) -> Result<OrgTiming, TimelineError> {
    let lines: Vec<&str> = bracketed_lines(text).collect();

    let start_line = lines
        .iter()
        .find(|line| line.contains(ORG_START_MARKER))
        .ok_or_else(|| TimelineError::MissingStartMarker {
            log: org.to_string(),
        })?;
    let end_line = lines
        .iter()
        .find(|line| line.contains(ORG_END_MARKER))
        .ok_or_else(|| TimelineError::MissingEndMarker {
            log: org.to_string(),
        })?;

    let start_time = timestamp_of(org, start_line)?;
    let end_time = timestamp_of(org, end_line)?;

    Ok(OrgTiming {
        org: org.to_string(),
        start_time,
        end_time,
        duration_mins: duration_mins(org, start_time, end_time)?,
    })
}

/// Extract timing and incidents from one repository log.
///
/// Repository logs must carry exactly one start marker; the terminal marker
/// is first-match, selected by the log's outcome directory.
pub fn extract_repo_log(
    org: &str,
    repo: &str,
    kind: LogKind,
    text: &str,
) -> Result<(RepoTiming, Vec<Incident>), TimelineError> {
    let log = format!("{org}/{repo}");
    let lines: Vec<&str> = bracketed_lines(text).collect();

    let start_lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| line.contains(REPO_START_MARKER))
        .collect();
    let start_line = match start_lines.as_slice() {
        [] => {
            return Err(TimelineError::MissingStartMarker { log });
        }
        [only] => *only,
        many => {
            return Err(TimelineError::AmbiguousStartMarker {
                log,
                count: many.len(),
            });
        }
    };

    let end_line = lines
        .iter()
        .find(|line| line.contains(kind.terminal_marker()))
        .ok_or_else(|| TimelineError::MissingEndMarker { log: log.clone() })?;

    let start_time = timestamp_of(&log, start_line)?;
    let end_time = timestamp_of(&log, end_line)?;

    let timing = RepoTiming {
        org: org.to_string(),
        repo: repo.to_string(),
        start_time,
        end_time,
        duration_mins: duration_mins(&log, start_time, end_time)?,
    };

    Ok((timing, extract_incidents(org, repo, text)))
}

/// Extract incident records, independent of timing.
///
/// Severities are not mutually exclusive: a line containing both `WARN` and
/// `ERROR` yields one incident of each.
#[must_use]
pub fn extract_incidents(org: &str, repo: &str, text: &str) -> Vec<Incident> {
    let mut incidents = Vec::new();

    for line in bracketed_lines(text) {
        if line.contains("WARN") {
            incidents.push(Incident {
                org: org.to_string(),
                repo: repo.to_string(),
                severity: Severity::Warn,
                message: line.trim().to_string(),
            });
        }
    }
    for line in bracketed_lines(text) {
        if line.contains("ERROR") {
            incidents.push(Incident {
                org: org.to_string(),
                repo: repo.to_string(),
                severity: Severity::Error,
                message: line.trim().to_string(),
            });
        }
    }

    incidents
}

/// Extract every repository log of one outcome kind.
///
/// A missing outcome directory yields empty results; both directories are
/// optional. A malformed log becomes a failure entry, not an abort.
pub fn parse_repo_logs(
    org: &str,
    kind: LogKind,
    org_dir: &Path,
) -> Result<(Vec<RepoTiming>, Vec<Incident>, Vec<RepoLogFailure>), TimelineError> {
    let dir = org_dir.join(kind.dir_name());
    if !dir.exists() {
        return Ok((Vec::new(), Vec::new(), Vec::new()));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
        .map_err(|source| TimelineError::Io {
            path: dir.clone(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    entries.sort();

    let mut timings = Vec::new();
    let mut incidents = Vec::new();
    let mut failures = Vec::new();

    for path in entries {
        let repo = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => {
                failures.push(RepoLogFailure {
                    path: path.clone(),
                    error: TimelineError::Io { path, source },
                });
                continue;
            }
        };

        tracing::info!(org, repo = %repo, kind = kind.dir_name(), "parsing repository log");
        match extract_repo_log(org, &repo, kind, &text) {
            Ok((timing, mut log_incidents)) => {
                timings.push(timing);
                incidents.append(&mut log_incidents);
            }
            Err(error) => {
                tracing::warn!(org, repo = %repo, error = %error, "repository log extraction failed");
                failures.push(RepoLogFailure { path, error });
            }
        }
    }

    Ok((timings, incidents, failures))
}

/// Extract everything from one organization's log directory.
///
/// The org log (`README.md`) is required; a malformed org log fails this
/// organization's extraction. Repository logs fail individually.
pub fn parse_org_logs(org: &str, logs_dir: &Path) -> Result<OrgLogReport, TimelineError> {
    let org_dir = logs_dir.join(org);
    let org_log = org_dir.join(ORG_LOG_FILE);

    let text = std::fs::read_to_string(&org_log).map_err(|source| TimelineError::Io {
        path: org_log,
        source,
    })?;
    let timing = extract_org_timing(org, &text)?;

    let (mut repo_timings, mut incidents, mut failures) =
        parse_repo_logs(org, LogKind::Success, &org_dir)?;
    let (mut failed_timings, mut failed_incidents, mut failed_failures) =
        parse_repo_logs(org, LogKind::Failure, &org_dir)?;
    repo_timings.append(&mut failed_timings);
    incidents.append(&mut failed_incidents);
    failures.append(&mut failed_failures);

    Ok(OrgLogReport {
        timing,
        repo_timings,
        incidents,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn org_timing_matches_the_marker_pair() {
        let text = "\
# Migration log
[2024-04-12T01:25:50Z] Organization migration started
[2024-04-12T01:30:00Z] Queued 12 repositories
[2024-04-12T02:10:50Z] Organization migration completed
";
        let timing = extract_org_timing("acme", text).expect("timing should extract");
        assert_eq!(timing.duration_mins, 45);
        assert_eq!(timing.start_time.to_rfc3339(), "2024-04-12T01:25:50+00:00");
    }

    #[test]
    fn sub_minute_precision_is_discarded() {
        let text = "\
[2024-04-12T01:00:00Z] Migration started for acme/api
[2024-04-12T01:01:30Z] Migration complete
";
        let (timing, _) =
            extract_repo_log("acme", "api", LogKind::Success, text).expect("should extract");
        assert_eq!(timing.duration_mins, 1);
    }

    #[test]
    fn unbracketed_lines_are_ignored_for_timing() {
        let text = "\
Migration started without a timestamp does not count
[2024-04-12T01:00:00Z] Migration started for acme/api
[2024-04-12T01:05:00Z] Migration complete
";
        let (timing, _) =
            extract_repo_log("acme", "api", LogKind::Success, text).expect("should extract");
        assert_eq!(timing.duration_mins, 5);
    }

    #[test]
    fn failure_logs_use_the_failed_marker() {
        let text = "\
[2024-04-12T01:00:00Z] Migration started for acme/api
[2024-04-12T01:02:00Z] ERROR: git source migration failed
[2024-04-12T01:03:00Z] Migration failed
";
        let (timing, incidents) =
            extract_repo_log("acme", "api", LogKind::Failure, text).expect("should extract");
        assert_eq!(timing.duration_mins, 3);
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].severity, Severity::Error);
    }

    #[test]
    fn a_missing_start_marker_is_a_typed_error() {
        let text = "[2024-04-12T01:03:00Z] Migration complete\n";
        let err = extract_repo_log("acme", "api", LogKind::Success, text)
            .expect_err("missing start should error");
        assert!(matches!(err, TimelineError::MissingStartMarker { .. }));
    }

    #[test]
    fn repeated_start_markers_are_a_typed_error() {
        let text = "\
[2024-04-12T01:00:00Z] Migration started for acme/api
[2024-04-12T01:01:00Z] Migration started for acme/api
[2024-04-12T01:03:00Z] Migration complete
";
        let err = extract_repo_log("acme", "api", LogKind::Success, text)
            .expect_err("double start should error");
        assert!(matches!(
            err,
            TimelineError::AmbiguousStartMarker { count: 2, .. }
        ));
    }

    #[test]
    fn a_missing_terminal_marker_is_a_typed_error() {
        let text = "[2024-04-12T01:00:00Z] Migration started for acme/api\n";
        let err = extract_repo_log("acme", "api", LogKind::Success, text)
            .expect_err("missing end should error");
        assert!(matches!(err, TimelineError::MissingEndMarker { .. }));
    }

    #[test]
    fn an_inverted_marker_pair_is_a_typed_error() {
        let text = "\
[2024-04-12T02:00:00Z] Migration started for acme/api
[2024-04-12T01:00:00Z] Migration complete
";
        let err = extract_repo_log("acme", "api", LogKind::Success, text)
            .expect_err("inverted timing should error");
        assert!(matches!(err, TimelineError::InvertedTiming { .. }));
    }

    #[test]
    fn one_warn_and_two_errors_yield_three_incidents() {
        let text = "\
[2024-04-12T01:00:00Z] Migration started for acme/api
[2024-04-12T01:01:00Z] WARN: issue #42 has a missing author
[2024-04-12T01:02:00Z] ERROR: attachment too large
[2024-04-12T01:02:30Z] ERROR: review thread dropped
[2024-04-12T01:03:00Z] Migration complete
";
        let incidents = extract_incidents("acme", "api", text);
        assert_eq!(incidents.len(), 3);
        assert_eq!(
            incidents
                .iter()
                .filter(|i| i.severity == Severity::Warn)
                .count(),
            1
        );
        assert_eq!(
            incidents
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count(),
            2
        );
    }

    #[test]
    fn a_line_matching_both_severities_is_counted_twice() {
        let text = "[2024-04-12T01:01:00Z] WARN escalated to ERROR on retry\n";
        let incidents = extract_incidents("acme", "api", text);
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].severity, Severity::Warn);
        assert_eq!(incidents[1].severity, Severity::Error);
        assert_eq!(incidents[0].message, incidents[1].message);
    }

    #[test]
    fn missing_outcome_directories_yield_empty_results() {
        let dir = TempDir::new().expect("tempdir");
        let (timings, incidents, failures) =
            parse_repo_logs("acme", LogKind::Success, dir.path()).expect("missing dir is fine");
        assert!(timings.is_empty());
        assert!(incidents.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn a_malformed_repo_log_fails_alone() {
        let dir = TempDir::new().expect("tempdir");
        let success = dir.path().join("success");
        std::fs::create_dir_all(&success).expect("mkdir");
        std::fs::write(
            success.join("good"),
            "[2024-04-12T01:00:00Z] Migration started\n[2024-04-12T01:05:00Z] Migration complete\n",
        )
        .expect("write good log");
        std::fs::write(success.join("bad"), "no markers at all\n").expect("write bad log");

        let (timings, _, failures) =
            parse_repo_logs("acme", LogKind::Success, dir.path()).expect("driver should continue");
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].repo, "good");
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].error,
            TimelineError::MissingStartMarker { .. }
        ));
    }

    #[test]
    fn parse_org_logs_walks_both_outcome_directories() {
        let dir = TempDir::new().expect("tempdir");
        let org_dir = dir.path().join("acme");
        std::fs::create_dir_all(org_dir.join("success")).expect("mkdir");
        std::fs::create_dir_all(org_dir.join("failure")).expect("mkdir");

        std::fs::write(
            org_dir.join(ORG_LOG_FILE),
            "[2024-04-12T01:25:50Z] Organization migration started\n\
             [2024-04-12T02:10:50Z] Organization migration completed\n",
        )
        .expect("write org log");
        std::fs::write(
            org_dir.join("success").join("api"),
            "[2024-04-12T01:30:00Z] Migration started\n\
             [2024-04-12T01:45:00Z] Migration complete\n",
        )
        .expect("write success log");
        std::fs::write(
            org_dir.join("failure").join("web"),
            "[2024-04-12T01:30:00Z] Migration started\n\
             [2024-04-12T01:32:00Z] ERROR: repository is locked\n\
             [2024-04-12T01:33:00Z] Migration failed\n",
        )
        .expect("write failure log");

        let report = parse_org_logs("acme", dir.path()).expect("report should extract");
        assert_eq!(report.timing.duration_mins, 45);
        assert_eq!(report.repo_timings.len(), 2);
        assert_eq!(report.incidents.len(), 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn a_missing_org_log_is_fatal_for_that_org() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("acme")).expect("mkdir");
        let err = parse_org_logs("acme", dir.path()).expect_err("missing README should error");
        assert!(matches!(err, TimelineError::Io { .. }));
    }
}
