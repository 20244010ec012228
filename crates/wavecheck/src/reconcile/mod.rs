//! Field-level reconciliation between two (or three) captures.
//!
//! Captures are loaded into [`Table`] values: a header row plus rows of
//! nullable cells (an empty CSV cell is a null). Columns are always
//! addressed by name. Comparison is source-driven: every key present in the
//! source capture is looked up in the target capture, and each differing
//! column emits one [`Discrepancy`]. Keys present only in the target are
//! never visited: the source is the ground-truth snapshot.
//!
//! The optional third capture (a second same-side capture taken later)
//! only supplies a context column per discrepancy so a reviewer can tell
//! migration drift from ordinary post-snapshot evolution; it never gates
//! equality.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Columns excluded from the stats reconciliation: timestamps and counters
/// that legitimately differ between captures.
pub const STATS_IGNORE_COLUMNS: [&str; 6] = [
    "createdAt",
    "pushedAt",
    "updatedAt",
    "url",
    "issues.comments.totalCount",
    "issues.timelineItems.totalCount",
];

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("missing capture: {path}")]
    MissingCapture { path: PathBuf },

    #[error("csv error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("capture has no key column {column:?}")]
    MissingKeyColumn { column: String },
}

/// An in-memory capture: headers plus rows of nullable string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    #[must_use]
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding short rows with nulls.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    /// Load a capture CSV. Empty cells become nulls; a missing file is a
    /// fatal reconciliation error.
    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind()
                    && io.kind() == std::io::ErrorKind::NotFound
                {
                    return Err(ReconcileError::MissingCapture {
                        path: path.to_path_buf(),
                    });
                }
                return Err(ReconcileError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let headers = reader
            .headers()
            .map_err(|source| ReconcileError::Csv {
                path: path.to_path_buf(),
                source,
            })?
            .iter()
            .map(str::to_string)
            .collect();
        let mut table = Table::new(headers);

        for record in reader.records() {
            let record = record.map_err(|source| ReconcileError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            table.push_row(
                record
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(table)
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell value by row index and column name.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Drop the named columns, keeping everything else in order.
    pub fn drop_columns(&mut self, names: &[&str]) {
        self.retain_columns(|header| !names.contains(&header));
    }

    /// Drop every column whose name ends with `suffix`.
    pub fn drop_columns_with_suffix(&mut self, suffix: &str) {
        self.retain_columns(|header| !header.ends_with(suffix));
    }

    fn retain_columns(&mut self, keep: impl Fn(&str) -> bool) {
        let mask: Vec<bool> = self.headers.iter().map(|h| keep(h)).collect();
        self.headers = self
            .headers
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(h, _)| h.clone())
            .collect();
        for row in &mut self.rows {
            let mut kept = Vec::with_capacity(self.headers.len());
            for (cell, keep) in row.drain(..).zip(&mask) {
                if *keep {
                    kept.push(cell);
                }
            }
            *row = kept;
        }
    }

    /// First row whose key column equals `key` exactly.
    fn find_row(&self, key_idx: usize, key: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(key_idx).and_then(Option::as_deref) == Some(key))
    }
}

/// Null-aware, case-insensitive equality for capture cells.
///
/// Two nulls are equal; a null and a value are not; text compares
/// case-insensitively.
#[must_use]
pub fn values_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
        _ => false,
    }
}

/// Output shape of a reconciliation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Composite display names and capture dates are included.
    Stats,
    /// Column and values only.
    Snapshots,
}

impl ReportKind {
    /// Column names of this shape's tabular output.
    #[must_use]
    pub fn headers(self) -> Vec<String> {
        let columns: &[&str] = match self {
            ReportKind::Stats => &[
                "source_name",
                "target_name",
                "column",
                "source_value",
                "target_value",
                "context_value",
                "source_date",
                "target_date",
                "context_date",
            ],
            ReportKind::Snapshots => {
                &["column", "source_value", "target_value", "context_value"]
            }
        };
        columns.iter().map(|c| (*c).to_string()).collect()
    }
}

/// One (key, column) pair whose value differs between captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    pub source_name: Option<String>,
    pub target_name: Option<String>,
    pub column: String,
    pub source_value: Option<String>,
    pub target_value: Option<String>,
    pub context_value: Option<String>,
    pub source_date: Option<String>,
    pub target_date: Option<String>,
    pub context_date: Option<String>,
}

impl Discrepancy {
    /// Render as a row of this shape's tabular output.
    #[must_use]
    pub fn to_row(&self, kind: ReportKind) -> Vec<String> {
        let cell = |v: &Option<String>| v.clone().unwrap_or_default();
        match kind {
            ReportKind::Stats => vec![
                cell(&self.source_name),
                cell(&self.target_name),
                self.column.clone(),
                cell(&self.source_value),
                cell(&self.target_value),
                cell(&self.context_value),
                cell(&self.source_date),
                cell(&self.target_date),
                cell(&self.context_date),
            ],
            ReportKind::Snapshots => vec![
                self.column.clone(),
                cell(&self.source_value),
                cell(&self.target_value),
                cell(&self.context_value),
            ],
        }
    }
}

/// Composite `owner.login/name` display name, falling back to the key.
fn display_name(table: &Table, row: usize, key_value: &str) -> String {
    match (table.value(row, "owner.login"), table.value(row, "name")) {
        (Some(owner), Some(name)) => format!("{owner}/{name}"),
        _ => key_value.to_string(),
    }
}

/// Compare two captures of the same key space, column by column.
///
/// For each key in `source`: the first matching `target` row is compared
/// over the source's columns; every differing column yields one
/// [`Discrepancy`]. Keys absent from the target are skipped silently, and
/// target rows whose keys are absent from the source are never visited.
pub fn compare_tables(
    key: &str,
    source: &Table,
    target: &Table,
    context: Option<&Table>,
    kind: ReportKind,
) -> Result<Vec<Discrepancy>, ReconcileError> {
    let source_key = source.column(key).ok_or_else(|| ReconcileError::MissingKeyColumn {
        column: key.to_string(),
    })?;
    let target_key = target.column(key).ok_or_else(|| ReconcileError::MissingKeyColumn {
        column: key.to_string(),
    })?;
    let context_key = context
        .map(|table| {
            table.column(key).ok_or_else(|| ReconcileError::MissingKeyColumn {
                column: key.to_string(),
            })
        })
        .transpose()?;

    let mut diffs = Vec::new();

    for row in 0..source.len() {
        let Some(key_value) = source.rows[row].get(source_key).and_then(Option::as_deref)
        else {
            continue;
        };

        let Some(target_row) = target.find_row(target_key, key_value) else {
            continue;
        };
        let context_row = match (context, context_key) {
            (Some(table), Some(idx)) => table.find_row(idx, key_value),
            _ => None,
        };

        for column in source.headers() {
            let source_value = source.value(row, column);
            let target_value = target.value(target_row, column);
            if values_equal(source_value, target_value) {
                continue;
            }

            let context_value = context
                .zip(context_row)
                .and_then(|(table, ctx_row)| table.value(ctx_row, column));

            let (source_name, target_name, source_date, target_date, context_date) = match kind {
                ReportKind::Stats => (
                    Some(display_name(source, row, key_value)),
                    Some(display_name(target, target_row, key_value)),
                    source.value(row, "Inventoried").map(str::to_string),
                    target.value(target_row, "Inventoried").map(str::to_string),
                    context
                        .zip(context_row)
                        .and_then(|(table, ctx_row)| table.value(ctx_row, "Inventoried"))
                        .map(str::to_string),
                ),
                ReportKind::Snapshots => (None, None, None, None, None),
            };

            diffs.push(Discrepancy {
                source_name,
                target_name,
                column: column.clone(),
                source_value: source_value.map(str::to_string),
                target_value: target_value.map(str::to_string),
                context_value: context_value.map(str::to_string),
                source_date,
                target_date,
                context_date,
            });
        }
    }

    Ok(diffs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cellify(cells: &[&str]) -> Vec<Option<String>> {
        cells
            .iter()
            .map(|c| {
                if c.is_empty() {
                    None
                } else {
                    Some((*c).to_string())
                }
            })
            .collect()
    }

    fn stats_table(rows: &[&[&str]]) -> Table {
        let mut table = Table::new(
            ["name", "owner.login", "visibility", "Inventoried"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        );
        for row in rows {
            table.push_row(cellify(row));
        }
        table
    }

    #[test]
    fn null_and_case_equality_rules() {
        assert!(values_equal(None, None));
        assert!(!values_equal(None, Some("x")));
        assert!(!values_equal(Some("x"), None));
        assert!(values_equal(Some("Foo"), Some("foo")));
        assert!(!values_equal(Some("foo"), Some("bar")));
    }

    #[test]
    fn changed_visibility_emits_one_discrepancy_row() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[&["api", "acme-new", "public", "2024-04-10"]]);
        let context = stats_table(&[&["api", "acme", "private", "2024-04-11"]]);

        let diffs = compare_tables("name", &source, &target, Some(&context), ReportKind::Stats)
            .expect("compare should succeed");

        // owner.login also differs by construction; the visibility row is
        // the one under test.
        let diff = diffs
            .iter()
            .find(|d| d.column == "visibility")
            .expect("visibility discrepancy");
        assert_eq!(diff.source_name.as_deref(), Some("acme/api"));
        assert_eq!(diff.target_name.as_deref(), Some("acme-new/api"));
        assert_eq!(diff.source_value.as_deref(), Some("private"));
        assert_eq!(diff.target_value.as_deref(), Some("public"));
        assert_eq!(diff.context_value.as_deref(), Some("private"));
        assert_eq!(diff.source_date.as_deref(), Some("2024-04-01"));
        assert_eq!(diff.target_date.as_deref(), Some("2024-04-10"));
        assert_eq!(diff.context_date.as_deref(), Some("2024-04-11"));
    }

    #[test]
    fn equal_rows_emit_nothing() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[&["api", "acme", "PRIVATE", "2024-04-01"]]);

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Stats)
            .expect("compare should succeed");
        assert!(diffs.is_empty());
    }

    #[test]
    fn keys_missing_from_the_target_are_skipped_silently() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[]);

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Stats)
            .expect("compare should succeed");
        assert!(diffs.is_empty());
    }

    #[test]
    fn target_only_keys_are_never_visited() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[
            &["api", "acme", "private", "2024-04-01"],
            &["surprise", "acme", "public", "2024-04-01"],
        ]);

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Stats)
            .expect("compare should succeed");
        assert!(diffs.is_empty(), "extra target rows must not be reported");
    }

    #[test]
    fn first_matching_target_row_wins() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[
            &["api", "acme", "public", "2024-04-10"],
            &["api", "acme", "private", "2024-04-11"],
        ]);

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Stats)
            .expect("compare should succeed");
        let diff = diffs
            .iter()
            .find(|d| d.column == "visibility")
            .expect("visibility discrepancy");
        assert_eq!(diff.target_value.as_deref(), Some("public"));
    }

    #[test]
    fn a_missing_context_row_yields_null_context_cells() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[&["api", "acme", "public", "2024-04-10"]]);
        let context = stats_table(&[]);

        let diffs = compare_tables("name", &source, &target, Some(&context), ReportKind::Stats)
            .expect("compare should succeed");
        let diff = &diffs[0];
        assert_eq!(diff.context_value, None);
        assert_eq!(diff.context_date, None);
    }

    #[test]
    fn a_column_absent_from_the_target_compares_as_null() {
        let mut source = Table::new(vec!["name".into(), "environments".into()]);
        source.push_row(cellify(&["api", "2"]));
        let mut target = Table::new(vec!["name".into()]);
        target.push_row(cellify(&["api"]));

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Snapshots)
            .expect("compare should succeed");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].column, "environments");
        assert_eq!(diffs[0].source_value.as_deref(), Some("2"));
        assert_eq!(diffs[0].target_value, None);
    }

    #[test]
    fn snapshots_shape_carries_no_identity_or_dates() {
        let source = stats_table(&[&["api", "acme", "private", "2024-04-01"]]);
        let target = stats_table(&[&["api", "acme", "public", "2024-04-01"]]);

        let diffs = compare_tables("name", &source, &target, None, ReportKind::Snapshots)
            .expect("compare should succeed");
        let diff = &diffs[0];
        assert_eq!(diff.source_name, None);
        assert_eq!(diff.source_date, None);
        assert_eq!(
            diff.to_row(ReportKind::Snapshots),
            vec!["visibility", "private", "public", ""]
        );
    }

    #[test]
    fn a_missing_key_column_is_an_error() {
        let source = Table::new(vec!["login".into()]);
        let target = Table::new(vec!["login".into()]);
        let err = compare_tables("name", &source, &target, None, ReportKind::Snapshots)
            .expect_err("missing key column should error");
        assert!(matches!(err, ReconcileError::MissingKeyColumn { column } if column == "name"));
    }

    #[test]
    fn drop_columns_by_name_and_suffix() {
        let mut table = Table::new(vec![
            "name".into(),
            "url".into(),
            "html_url".into(),
            "pushedAt".into(),
            "visibility".into(),
        ]);
        table.push_row(cellify(&["api", "u", "hu", "2024", "private"]));

        table.drop_columns_with_suffix("url");
        table.drop_columns(&["pushedAt"]);

        assert_eq!(table.headers(), &["name".to_string(), "visibility".to_string()]);
        assert_eq!(table.value(0, "visibility"), Some("private"));
        assert_eq!(table.value(0, "url"), None);
    }

    #[test]
    fn load_reads_empty_cells_as_nulls_and_missing_files_as_errors() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("capture.csv");
        std::fs::write(&path, "name,visibility\napi,\nweb,public\n").expect("write");

        let table = Table::load(&path).expect("load should succeed");
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "visibility"), None);
        assert_eq!(table.value(1, "visibility"), Some("public"));

        let err = Table::load(&dir.path().join("absent.csv"))
            .expect_err("missing capture should error");
        assert!(matches!(err, ReconcileError::MissingCapture { .. }));
    }
}
