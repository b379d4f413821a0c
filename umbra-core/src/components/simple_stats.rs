//! Naive column statistics: unconstrained count, min and max.

use std::sync::Arc;

use async_trait::async_trait;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::ExploreContext;
use crate::connection::Connection;
use crate::error::ExploreError;
use crate::metrics::{Metric, PublisherComponent};
use crate::queries::BasicColumnStats;

/// Computes the naive (single-query, unrefined) statistics of a column.
///
/// The anonymized bounds this yields are coarse; the min/max refiner narrows
/// them further, and the histogram selector uses them to derive candidate
/// bucket widths.
pub struct SimpleStatsComponent {
    conn: Arc<Connection>,
    ctx: ExploreContext,
}

/// The naive statistics of a column.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleStatsResult {
    /// Anonymized row count.
    pub count: u64,
    /// Noise the backend attached to the count, if any.
    pub count_noise: Option<f64>,
    /// Naive minimum; absent when the backend could not disclose one.
    pub min: Option<f64>,
    /// Naive maximum; absent when the backend could not disclose one.
    pub max: Option<f64>,
}

impl SimpleStatsComponent {
    /// Creates the component for a column.
    pub fn new(conn: Arc<Connection>, ctx: ExploreContext) -> Self {
        Self { conn, ctx }
    }
}

#[async_trait]
impl Component for SimpleStatsComponent {
    type Output = SimpleStatsResult;

    async fn compute(&self) -> ComponentResult<SimpleStatsResult> {
        let query = BasicColumnStats::new(&self.ctx.table, &self.ctx.column);
        let mut rows = self.conn.exec(&query).await?;

        if rows.len() != 1 {
            return Err(Arc::new(ExploreError::unexpected_result(format!(
                "basic stats query returned {} rows, expected exactly one",
                rows.len()
            ))));
        }
        let row = rows.remove(0);

        Ok(SimpleStatsResult {
            count: row.count,
            count_noise: row.count_noise,
            min: row.min.into_value(),
            max: row.max.into_value(),
        })
    }

    fn name(&self) -> &'static str {
        "simple_stats"
    }
}

/// Publishes the naive statistics as `count`, `naive_min` and `naive_max`.
pub struct SimpleStatsPublisher {
    provider: Arc<dyn ResultProvider<SimpleStatsResult>>,
}

impl SimpleStatsPublisher {
    /// Wraps a stats node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<SimpleStatsResult>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for SimpleStatsPublisher {
    fn name(&self) -> &'static str {
        "simple_stats"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let stats = self.provider.result().await?;

        let mut metrics = vec![Metric::new("count", stats.count)];
        if let Some(min) = stats.min {
            metrics.push(Metric::new("naive_min", min));
        }
        if let Some(max) = stats.max {
            metrics.push(Metric::new("naive_max", max));
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Memoized;
    use crate::test_utils::ScriptedBackend;
    use serde_json::json;

    fn connection(backend: Arc<ScriptedBackend>) -> Arc<Connection> {
        Arc::new(Connection::new(backend))
    }

    #[tokio::test]
    async fn test_computes_naive_stats() {
        let backend = ScriptedBackend::new()
            .rows(
                "select min(duration), max(duration)",
                vec![vec![json!(1.0), json!(64.0), json!(820), json!(2.0)]],
            )
            .build();
        let component = SimpleStatsComponent::new(
            connection(backend),
            ExploreContext::new("loans", "duration"),
        );

        let stats = component.compute().await.unwrap();
        assert_eq!(stats.count, 820);
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(64.0));
    }

    #[tokio::test]
    async fn test_multiple_rows_violate_invariant() {
        let backend = ScriptedBackend::new()
            .rows(
                "select min",
                vec![
                    vec![json!(1.0), json!(2.0), json!(3), json!(null)],
                    vec![json!(1.0), json!(2.0), json!(3), json!(null)],
                ],
            )
            .build();
        let component =
            SimpleStatsComponent::new(connection(backend), ExploreContext::new("t", "c"));

        let err = component.compute().await.unwrap_err();
        assert!(matches!(*err, ExploreError::UnexpectedQueryResult(_)));
    }

    #[tokio::test]
    async fn test_publisher_omits_undisclosed_bounds() {
        let backend = ScriptedBackend::new()
            .rows(
                "select min",
                vec![vec![json!(null), json!(null), json!(50), json!(null)]],
            )
            .build();
        let node = Memoized::new(SimpleStatsComponent::new(
            connection(backend),
            ExploreContext::new("t", "c"),
        ));
        let publisher = SimpleStatsPublisher::new(node);

        let metrics = publisher.yield_metrics().await.unwrap();
        let names: Vec<_> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["count"]);
    }
}
