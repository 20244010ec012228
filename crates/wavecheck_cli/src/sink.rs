//! CSV report sink.
//!
//! Each named table becomes `<name>.csv` in the report directory.

use std::path::PathBuf;

use wavecheck::{NamedTable, ReportSink, SinkError};

pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl ReportSink for CsvReportSink {
    fn write_table(&mut self, table: &NamedTable) -> Result<(), SinkError> {
        let path = self.dir.join(format!("{}.csv", table.name));
        let mut writer = csv::Writer::from_path(&path).map_err(SinkError::Csv)?;
        writer.write_record(&table.headers)?;
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        tracing::info!(table = %table.name, rows = table.rows.len(), path = %path.display(), "Wrote report table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_headers_and_rows() {
        let dir = TempDir::new().expect("tempdir");
        let mut sink = CsvReportSink::new(dir.path()).expect("sink");

        let mut table = NamedTable::new("org-timings", vec!["org".into(), "duration (mins)".into()]);
        table.rows.push(vec!["acme".into(), "45".into()]);
        sink.write_table(&table).expect("write");

        let contents =
            std::fs::read_to_string(dir.path().join("org-timings.csv")).expect("read back");
        assert_eq!(contents, "org,duration (mins)\nacme,45\n");
    }
}
