//! Report sink boundary.
//!
//! Formatting sinks (spreadsheets, CSV bundles) carry no logic of interest;
//! the engine hands them named tables of rows and nothing else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// A named table of rows handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NamedTable {
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Where reconciliation and timeline outputs go.
pub trait ReportSink {
    fn write_table(&mut self, table: &NamedTable) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_table_starts_empty() {
        let table = NamedTable::new("org-timings", vec!["org".into(), "duration (mins)".into()]);
        assert!(table.is_empty());
        assert_eq!(table.name, "org-timings");
    }
}
