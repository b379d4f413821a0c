//! Distinct values of a column with their anonymized counts.

use std::time::Duration;

use serde_json::Value as Token;

use crate::error::Result;
use crate::query::{Query, RowReader};
use crate::value::ValueWithCount;

/// Groups the column by itself, yielding one row per disclosable distinct
/// value plus the suppressed and NULL remainder rows.
///
/// The value type is left dynamic: distinct-value exploration runs for every
/// column type, so rows carry the raw token.
#[derive(Debug, Clone)]
pub struct DistinctColumnValues {
    table: String,
    column: String,
}

/// Distinct-value scans touch the whole column; the original service capped
/// them at two minutes rather than inheriting the long default.
const MAX_WAIT: Duration = Duration::from_secs(120);

impl DistinctColumnValues {
    /// Creates the distinct-values query for a table column.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl Query for DistinctColumnValues {
    type Row = ValueWithCount<Token>;

    fn statement(&self) -> String {
        format!(
            "select {col}, count(*), count_noise(*) from {table} group by {col}",
            col = self.column,
            table = self.table,
        )
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        let value = reader.read_value::<Token>()?;
        let count = reader.read_count()?;
        let count_noise = reader.read_noise()?;
        Ok(ValueWithCount::new(value, count, count_noise))
    }

    fn max_wait(&self) -> Option<Duration> {
        Some(MAX_WAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DValue;
    use serde_json::json;

    #[test]
    fn test_statement_shape() {
        let query = DistinctColumnValues::new("clients", "active");
        assert_eq!(
            query.statement(),
            "select active, count(*), count_noise(*) from clients group by active"
        );
    }

    #[test]
    fn test_parses_suppressed_remainder_row() {
        let query = DistinctColumnValues::new("clients", "active");
        let tokens = vec![json!("*"), json!(13), json!(2.5)];
        let mut reader = RowReader::new(&tokens);

        let row = query.parse_row(&mut reader).unwrap();
        assert!(row.value.is_suppressed());
        assert_eq!(row.count, 13);
        assert_eq!(row.count_noise, Some(2.5));
    }

    #[test]
    fn test_parses_boolean_value_row() {
        let query = DistinctColumnValues::new("clients", "active");
        let tokens = vec![json!(true), json!(500), json!(null)];
        let mut reader = RowReader::new(&tokens);

        let row = query.parse_row(&mut reader).unwrap();
        assert_eq!(row.value, DValue::Value(json!(true)));
        assert_eq!(row.count, 500);
        assert_eq!(row.count_noise, None);
    }

    #[test]
    fn test_caps_wait_time() {
        let query = DistinctColumnValues::new("clients", "active");
        assert_eq!(query.max_wait(), Some(Duration::from_secs(120)));
    }
}
