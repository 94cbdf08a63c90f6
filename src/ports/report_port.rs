//! Report sink port trait.

use crate::domain::error::GridtraderError;
use crate::domain::report::ComparisonTable;

/// Port for persisting the candidate comparison table.
pub trait ReportPort {
    fn write(&self, table: &ComparisonTable, output_path: &str) -> Result<(), GridtraderError>;
}
