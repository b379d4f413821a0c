//! Naive column statistics in a single statement.

use crate::error::Result;
use crate::query::{Query, RowReader};
use crate::value::DValue;

/// Unconstrained min/max/count over a numeric column.
///
/// Returns exactly one row; the refinement components treat any other row
/// count as a violated invariant.
#[derive(Debug, Clone)]
pub struct BasicColumnStats {
    table: String,
    column: String,
}

impl BasicColumnStats {
    /// Creates the stats query for a table column.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// The single result row of [`BasicColumnStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct BasicStatsRow {
    /// Naive anonymized minimum, if disclosable.
    pub min: DValue<f64>,
    /// Naive anonymized maximum, if disclosable.
    pub max: DValue<f64>,
    /// Anonymized row count.
    pub count: u64,
    /// Noise the backend added to the count, if reported.
    pub count_noise: Option<f64>,
}

impl Query for BasicColumnStats {
    type Row = BasicStatsRow;

    fn statement(&self) -> String {
        format!(
            "select min({col}), max({col}), count(*), count_noise(*) from {table}",
            col = self.column,
            table = self.table,
        )
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        let min = reader.read_value::<f64>()?;
        let max = reader.read_value::<f64>()?;
        let count = reader.read_count()?;
        let count_noise = reader.read_noise()?;
        Ok(BasicStatsRow {
            min,
            max,
            count,
            count_noise,
        })
    }
}
