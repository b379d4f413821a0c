//! Prefix sampling for text columns over grouping sets.

use std::sync::Arc;

use crate::error::Result;
use crate::grouping::IndexedGroupingSetsResult;
use crate::query::{Query, RowReader};

/// Counts column prefixes at several lengths in one statement, one grouping
/// set per prefix length.
///
/// The anonymization engine suppresses rare full values, but short prefixes
/// aggregate enough rows to disclose the common shapes of a text column.
#[derive(Debug, Clone)]
pub struct TextColumnPrefix {
    table: String,
    column: String,
    lengths: Arc<[usize]>,
}

impl TextColumnPrefix {
    /// Creates the prefix query for the given sample lengths.
    pub fn new(table: impl Into<String>, column: impl Into<String>, lengths: Arc<[usize]>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            lengths,
        }
    }

    /// The sampled prefix lengths, in statement order.
    pub fn lengths(&self) -> &Arc<[usize]> {
        &self.lengths
    }
}

impl Query for TextColumnPrefix {
    type Row = IndexedGroupingSetsResult<usize, String>;

    fn statement(&self) -> String {
        let aliases = (0..self.lengths.len())
            .map(|i| format!("p{i}"))
            .collect::<Vec<_>>();
        let substring_expressions = self
            .lengths
            .iter()
            .zip(&aliases)
            .map(|(length, alias)| {
                format!(
                    "substring({col}, 1, {length}) as {alias}",
                    col = self.column
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        let grouping_sets = aliases
            .iter()
            .map(|alias| format!("({alias})"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "select {substring_expressions}, count(*), count_noise(*), grouping_id({alias_list}) \
             from {table} group by grouping sets ({grouping_sets})",
            alias_list = aliases.join(", "),
            table = self.table,
        )
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        IndexedGroupingSetsResult::parse(reader, &self.lengths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DValue;
    use serde_json::json;

    fn lengths(values: Vec<usize>) -> Arc<[usize]> {
        Arc::from(values.into_boxed_slice())
    }

    #[test]
    fn test_statement_shape() {
        let query = TextColumnPrefix::new("clients", "postcode", lengths(vec![2, 3]));
        assert_eq!(
            query.statement(),
            "select substring(postcode, 1, 2) as p0, substring(postcode, 1, 3) as p1, \
             count(*), count_noise(*), grouping_id(p0, p1) \
             from clients group by grouping sets ((p0), (p1))"
        );
    }

    #[test]
    fn test_parses_prefix_row() {
        let query = TextColumnPrefix::new("clients", "postcode", lengths(vec![2, 3]));
        // Active column 0 has id 0b01 for two grouping columns.
        let tokens = vec![json!("10"), json!(null), json!(230), json!(3.2), json!(0b01)];
        let mut reader = RowReader::new(&tokens);

        let row = query.parse_row(&mut reader).unwrap();
        assert_eq!(row.grouping_index(), 0);
        assert_eq!(*row.grouping_label(), 2);
        assert_eq!(row.value(), &DValue::Value("10".to_string()));
        assert_eq!(row.count(), 230);
    }
}
