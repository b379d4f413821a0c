//! Constrained and unconstrained min/max estimate queries.
//!
//! The refiner narrows the search range iteratively: each constrained query
//! restricts the column to values strictly better than the current estimate.
//! When too few rows remain to anonymize safely, the backend returns NULL.

use crate::error::Result;
use crate::query::{Query, RowReader};
use crate::value::DValue;

/// Anonymized minimum of a column, optionally below an exclusive upper bound.
///
/// Returns exactly one row holding the estimate, or NULL when the constrained
/// range no longer holds enough values.
#[derive(Debug, Clone)]
pub struct MinEstimate {
    table: String,
    column: String,
    upper_bound: Option<f64>,
}

impl MinEstimate {
    /// Creates a min-estimate query, constrained when `upper_bound` is given.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        upper_bound: Option<f64>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            upper_bound,
        }
    }
}

impl Query for MinEstimate {
    type Row = DValue<f64>;

    fn statement(&self) -> String {
        match self.upper_bound {
            Some(bound) => format!(
                "select min({col}) from {table} where {col} < {bound}",
                col = self.column,
                table = self.table,
            ),
            None => format!(
                "select min({col}) from {table}",
                col = self.column,
                table = self.table,
            ),
        }
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        reader.read_value::<f64>()
    }
}

/// Anonymized maximum of a column, optionally above an exclusive lower bound.
///
/// Symmetric to [`MinEstimate`].
#[derive(Debug, Clone)]
pub struct MaxEstimate {
    table: String,
    column: String,
    lower_bound: Option<f64>,
}

impl MaxEstimate {
    /// Creates a max-estimate query, constrained when `lower_bound` is given.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        lower_bound: Option<f64>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            lower_bound,
        }
    }
}

impl Query for MaxEstimate {
    type Row = DValue<f64>;

    fn statement(&self) -> String {
        match self.lower_bound {
            Some(bound) => format!(
                "select max({col}) from {table} where {col} > {bound}",
                col = self.column,
                table = self.table,
            ),
            None => format!(
                "select max({col}) from {table}",
                col = self.column,
                table = self.table,
            ),
        }
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        reader.read_value::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unconstrained_statement() {
        let query = MinEstimate::new("loans", "amount", None);
        assert_eq!(query.statement(), "select min(amount) from loans");
    }

    #[test]
    fn test_constrained_statements() {
        let min = MinEstimate::new("loans", "amount", Some(250.0));
        assert_eq!(
            min.statement(),
            "select min(amount) from loans where amount < 250"
        );

        let max = MaxEstimate::new("loans", "amount", Some(9000.0));
        assert_eq!(
            max.statement(),
            "select max(amount) from loans where amount > 9000"
        );
    }

    #[test]
    fn test_parses_null_estimate() {
        let query = MinEstimate::new("loans", "amount", Some(10.0));
        let tokens = vec![json!(null)];
        let mut reader = RowReader::new(&tokens);
        assert!(query.parse_row(&mut reader).unwrap().is_null());
    }
}
