//! Iterative refinement of the anonymized min and max estimates.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::ExploreContext;
use crate::connection::Connection;
use crate::error::{ExploreError, Result};
use crate::metrics::{Metric, PublisherComponent};
use crate::queries::{MaxEstimate, MinEstimate};
use crate::value::DValue;

/// Refinement stops after this many constrained queries per direction.
/// Convergence is usually much faster.
const MAX_ITERATIONS: usize = 10;

/// Narrows the anonymized min and max through constrained re-queries.
///
/// The first unconstrained estimate is coarse; each iteration restricts the
/// search to values strictly better than the current estimate. Refinement
/// stops when the backend can no longer disclose a value in the constrained
/// range, when the estimate stops improving, or when it reaches exactly zero
/// (which cannot be improved upon). The min and max refinements run
/// concurrently.
pub struct MinMaxRefinerComponent {
    conn: Arc<Connection>,
    ctx: ExploreContext,
}

/// The refined bounds of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxResult {
    /// Refined minimum estimate.
    pub min: f64,
    /// Refined maximum estimate.
    pub max: f64,
}

impl MinMaxRefinerComponent {
    /// Creates the component for a column.
    pub fn new(conn: Arc<Connection>, ctx: ExploreContext) -> Self {
        Self { conn, ctx }
    }

    async fn refined_min(&self) -> Result<f64> {
        let mut current = self.min_estimate(None).await?.into_value().ok_or_else(|| {
            ExploreError::insufficient_data("the backend disclosed no minimum estimate")
        })?;

        for iteration in 0..MAX_ITERATIONS {
            // An estimate of exactly zero cannot be improved upon.
            if current == 0.0 {
                break;
            }

            match self.min_estimate(Some(current)).await?.into_value() {
                // Too few rows remain in the constrained range to anonymize,
                // or the estimate stopped improving.
                None => break,
                Some(estimate) if estimate >= current => break,
                Some(estimate) => {
                    debug!(iteration, estimate, "min estimate improved");
                    current = estimate;
                }
            }
        }

        Ok(current)
    }

    async fn refined_max(&self) -> Result<f64> {
        let mut current = self.max_estimate(None).await?.into_value().ok_or_else(|| {
            ExploreError::insufficient_data("the backend disclosed no maximum estimate")
        })?;

        for iteration in 0..MAX_ITERATIONS {
            if current == 0.0 {
                break;
            }

            match self.max_estimate(Some(current)).await?.into_value() {
                None => break,
                Some(estimate) if estimate <= current => break,
                Some(estimate) => {
                    debug!(iteration, estimate, "max estimate improved");
                    current = estimate;
                }
            }
        }

        Ok(current)
    }

    async fn min_estimate(&self, upper_bound: Option<f64>) -> Result<DValue<f64>> {
        let query = MinEstimate::new(&self.ctx.table, &self.ctx.column, upper_bound);
        Self::single_row(self.conn.exec(&query).await?)
    }

    async fn max_estimate(&self, lower_bound: Option<f64>) -> Result<DValue<f64>> {
        let query = MaxEstimate::new(&self.ctx.table, &self.ctx.column, lower_bound);
        Self::single_row(self.conn.exec(&query).await?)
    }

    fn single_row<R>(mut rows: Vec<R>) -> Result<R> {
        if rows.len() != 1 {
            return Err(ExploreError::unexpected_result(format!(
                "estimate query returned {} rows, expected exactly one",
                rows.len()
            )));
        }
        Ok(rows.remove(0))
    }
}

#[async_trait]
impl Component for MinMaxRefinerComponent {
    type Output = MinMaxResult;

    async fn compute(&self) -> ComponentResult<MinMaxResult> {
        let (min, max) = tokio::join!(self.refined_min(), self.refined_max());
        Ok(MinMaxResult {
            min: min.map_err(Arc::new)?,
            max: max.map_err(Arc::new)?,
        })
    }

    fn name(&self) -> &'static str {
        "min_max_refiner"
    }
}

/// Publishes the refined bounds as `refined_min` and `refined_max`.
pub struct MinMaxPublisher {
    provider: Arc<dyn ResultProvider<MinMaxResult>>,
}

impl MinMaxPublisher {
    /// Wraps a refiner node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<MinMaxResult>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for MinMaxPublisher {
    fn name(&self) -> &'static str {
        "min_max_refiner"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let result = self.provider.result().await?;
        Ok(vec![
            Metric::new("refined_min", result.min),
            Metric::new("refined_max", result.max),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedBackend;
    use serde_json::json;

    fn component(backend: Arc<ScriptedBackend>) -> MinMaxRefinerComponent {
        MinMaxRefinerComponent::new(
            Arc::new(Connection::new(backend)),
            ExploreContext::new("loans", "amount"),
        )
    }

    #[tokio::test]
    async fn test_converges_on_monotonically_improving_estimates() {
        let backend = ScriptedBackend::new()
            .rows("where amount < 10", vec![vec![json!(5.0)]])
            .rows("where amount < 5", vec![vec![json!(2.0)]])
            .rows("where amount < 2", vec![vec![json!(2.0)]])
            .rows("select min(amount) from loans", vec![vec![json!(10.0)]])
            .rows("where amount > 100", vec![vec![json!(250.0)]])
            .rows("where amount > 250", vec![vec![json!(null)]])
            .rows("select max(amount) from loans", vec![vec![json!(100.0)]])
            .build();

        let result = component(backend).compute().await.unwrap();
        assert_eq!(result.min, 2.0);
        assert_eq!(result.max, 250.0);
    }

    #[tokio::test]
    async fn test_keeps_unconstrained_estimate_when_backend_discloses_nothing() {
        let backend = ScriptedBackend::new()
            .rows("where amount <", vec![vec![json!(null)]])
            .rows("where amount >", vec![vec![json!(null)]])
            .rows("select min(amount)", vec![vec![json!(7.0)]])
            .rows("select max(amount)", vec![vec![json!(90.0)]])
            .build();

        let result = component(backend.clone()).compute().await.unwrap();
        assert_eq!(result.min, 7.0);
        assert_eq!(result.max, 90.0);

        // Exactly one constrained probe per direction.
        assert_eq!(backend.submitted_matching("where amount <"), 1);
        assert_eq!(backend.submitted_matching("where amount >"), 1);
    }

    #[tokio::test]
    async fn test_zero_estimate_stops_without_further_queries() {
        let backend = ScriptedBackend::new()
            .rows("select min(amount)", vec![vec![json!(0.0)]])
            .rows("select max(amount)", vec![vec![json!(0.0)]])
            .build();

        let result = component(backend.clone()).compute().await.unwrap();
        assert_eq!(result.min, 0.0);
        assert_eq!(result.max, 0.0);
        assert_eq!(backend.submitted_matching("where"), 0);
    }

    #[tokio::test]
    async fn test_iteration_cap_terminates_diverging_backend() {
        // Every constrained min query keeps improving by re-matching the same
        // pattern; the cap must stop the loop regardless.
        let backend = ScriptedBackend::new()
            .rows("where amount <", vec![vec![json!(-1.0)]])
            .rows("select min(amount)", vec![vec![json!(100.0)]])
            .rows("where amount >", vec![vec![json!(null)]])
            .rows("select max(amount)", vec![vec![json!(200.0)]])
            .build();

        let result = component(backend.clone()).compute().await.unwrap();
        // The scripted estimate never improves past -1, so the second
        // constrained query terminates the loop.
        assert_eq!(result.min, -1.0);
        assert!(backend.submitted_matching("where amount <") <= MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_undisclosed_unconstrained_estimate_is_insufficient_data() {
        let backend = ScriptedBackend::new()
            .rows("select min(amount)", vec![vec![json!(null)]])
            .rows("select max(amount)", vec![vec![json!(50.0)]])
            .rows("where amount >", vec![vec![json!(null)]])
            .build();

        let err = component(backend).compute().await.unwrap_err();
        assert!(matches!(*err, ExploreError::InsufficientData(_)));
    }
}
