//! Multi-resolution histogram query over grouping sets.

use std::sync::Arc;

use crate::error::Result;
use crate::grouping::IndexedGroupingSetsResult;
use crate::query::{Query, RowReader};

/// Buckets a numeric column at several candidate resolutions in one
/// statement, one grouping set per candidate bucket size.
///
/// Each result row belongs to exactly one resolution, identified by the
/// trailing grouping id; the row's value is the bucket's lower bound.
#[derive(Debug, Clone)]
pub struct SingleColumnHistogram {
    table: String,
    column: String,
    bucket_sizes: Arc<[f64]>,
}

impl SingleColumnHistogram {
    /// Creates the histogram query for the given candidate bucket sizes.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        bucket_sizes: Arc<[f64]>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            bucket_sizes,
        }
    }

    /// The candidate bucket sizes, in statement order.
    pub fn bucket_sizes(&self) -> &Arc<[f64]> {
        &self.bucket_sizes
    }
}

impl Query for SingleColumnHistogram {
    type Row = IndexedGroupingSetsResult<f64, f64>;

    fn statement(&self) -> String {
        let aliases = (0..self.bucket_sizes.len())
            .map(|i| format!("b{i}"))
            .collect::<Vec<_>>();
        let bucket_expressions = self
            .bucket_sizes
            .iter()
            .zip(&aliases)
            .map(|(size, alias)| {
                format!("bucket({col} by {size}) as {alias}", col = self.column)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let grouping_sets = aliases
            .iter()
            .map(|alias| format!("({alias})"))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "select {bucket_expressions}, count(*), count_noise(*), grouping_id({alias_list}) \
             from {table} group by grouping sets ({grouping_sets})",
            alias_list = aliases.join(", "),
            table = self.table,
        )
    }

    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row> {
        IndexedGroupingSetsResult::parse(reader, &self.bucket_sizes)
    }
}
