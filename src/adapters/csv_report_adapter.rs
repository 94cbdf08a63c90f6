//! Delimited-file report adapter implementing [`ReportPort`].
//!
//! The comparison table is written metric-major: one record per metric or
//! parameter row, one column per candidate id.

use crate::domain::error::GridtraderError;
use crate::domain::report::ComparisonTable;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter {
    delimiter: u8,
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvReportAdapter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    fn write_records<W: std::io::Write>(
        &self,
        table: &ComparisonTable,
        sink: W,
    ) -> Result<(), GridtraderError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(sink);

        let mut header = vec!["metric".to_string()];
        header.extend(table.columns.iter().cloned());
        writer.write_record(&header).map_err(csv_error)?;

        for (label, cells) in &table.rows {
            let mut record = vec![label.clone()];
            record.extend(cells.iter().cloned());
            writer.write_record(&record).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Render the table to a string, for printing instead of persisting.
    pub fn render(&self, table: &ComparisonTable) -> Result<String, GridtraderError> {
        let mut buffer = Vec::new();
        self.write_records(table, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| GridtraderError::Report {
            reason: format!("non-UTF8 report output: {e}"),
        })
    }
}

fn csv_error(err: csv::Error) -> GridtraderError {
    GridtraderError::Report {
        reason: format!("CSV write error: {err}"),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, table: &ComparisonTable, output_path: &str) -> Result<(), GridtraderError> {
        let file = std::fs::File::create(output_path)?;
        self.write_records(table, file)
    }
}
