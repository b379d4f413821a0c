//! Distinct values of a column with suppression accounting.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Token;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::ExploreContext;
use crate::connection::Connection;
use crate::metrics::{Metric, MetricValue, PublisherComponent};
use crate::queries::DistinctColumnValues;
use crate::value::{ValueCounts, ValueWithCount};

/// Fetches the distinct values of a column and their anonymized counts.
///
/// A zero total count fails the component with `InsufficientData`: a column
/// with no usable rows cannot be explored at all, so this is the terminal
/// condition for the whole column's analysis rather than a degradable one.
pub struct DistinctValuesComponent {
    conn: Arc<Connection>,
    ctx: ExploreContext,
}

/// Distinct-value rows plus their suppression accounting.
#[derive(Debug, Clone)]
pub struct DistinctValuesResult {
    /// Suppression accounting over all rows; total count is non-zero.
    pub value_counts: ValueCounts,
    /// The raw distinct-value rows, including the suppressed and NULL
    /// remainder rows.
    pub rows: Vec<ValueWithCount<Token>>,
}

impl DistinctValuesComponent {
    /// Creates the component for a column.
    pub fn new(conn: Arc<Connection>, ctx: ExploreContext) -> Self {
        Self { conn, ctx }
    }
}

#[async_trait]
impl Component for DistinctValuesComponent {
    type Output = DistinctValuesResult;

    async fn compute(&self) -> ComponentResult<DistinctValuesResult> {
        let query = DistinctColumnValues::new(&self.ctx.table, &self.ctx.column);
        let rows = self.conn.exec(&query).await?;
        let value_counts = ValueCounts::compute(&rows)?;
        Ok(DistinctValuesResult { value_counts, rows })
    }

    fn name(&self) -> &'static str {
        "distinct_values"
    }
}

/// Publishes `top_distinct_values`, `total_count`, `suppressed_values` and
/// `null_count`.
pub struct DistinctValuesPublisher {
    provider: Arc<dyn ResultProvider<DistinctValuesResult>>,
}

impl DistinctValuesPublisher {
    /// Wraps a distinct-values node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<DistinctValuesResult>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for DistinctValuesPublisher {
    fn name(&self) -> &'static str {
        "distinct_values"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let result = self.provider.result().await?;

        let mut disclosed: Vec<(&Token, u64)> = result
            .rows
            .iter()
            .filter_map(|row| row.value.value().map(|value| (value, row.count)))
            .collect();
        disclosed.sort_by(|a, b| b.1.cmp(&a.1));

        let top_values: Vec<MetricValue> = disclosed
            .iter()
            .map(|(value, count)| {
                MetricValue::record([
                    ("value", MetricValue::from_token(value)),
                    ("count", MetricValue::from(*count)),
                ])
            })
            .collect();

        Ok(vec![
            Metric::new("top_distinct_values", top_values),
            Metric::new("total_count", result.value_counts.total_count),
            Metric::new("suppressed_values", result.value_counts.suppressed_count),
            Metric::new("null_count", result.value_counts.null_count),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Memoized;
    use crate::error::ExploreError;
    use crate::test_utils::ScriptedBackend;
    use serde_json::json;

    fn component(backend: Arc<ScriptedBackend>) -> DistinctValuesComponent {
        DistinctValuesComponent::new(
            Arc::new(Connection::new(backend)),
            ExploreContext::new("clients", "active"),
        )
    }

    #[tokio::test]
    async fn test_zero_total_is_terminal_insufficient_data() {
        let backend = ScriptedBackend::new().rows("group by active", vec![]).build();

        let err = component(backend).compute().await.unwrap_err();
        assert!(matches!(*err, ExploreError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_publishes_top_values_by_descending_count() {
        let backend = ScriptedBackend::new()
            .rows(
                "group by active",
                vec![
                    vec![json!(false), json!(120), json!(1.0)],
                    vec![json!(true), json!(500), json!(1.0)],
                    vec![json!(null), json!(30), json!(null)],
                    vec![json!("*"), json!(10), json!(null)],
                ],
            )
            .build();

        let node = Memoized::new(component(backend));
        let metrics = DistinctValuesPublisher::new(node).yield_metrics().await.unwrap();

        let top = &metrics[0];
        assert_eq!(top.name, "top_distinct_values");
        match &top.value {
            MetricValue::Sequence(values) => {
                assert_eq!(values.len(), 2);
                // Highest count first.
                let first = match &values[0] {
                    MetricValue::Record(fields) => fields,
                    other => panic!("expected record, got {other:?}"),
                };
                assert_eq!(first["value"], MetricValue::Boolean(true));
                assert_eq!(first["count"], MetricValue::Long(500));
            }
            other => panic!("expected sequence, got {other:?}"),
        }

        assert_eq!(metrics[1], Metric::new("total_count", 660u64));
        assert_eq!(metrics[2], Metric::new("suppressed_values", 10u64));
        assert_eq!(metrics[3], Metric::new("null_count", 30u64));
    }
}
