//! Average estimation from histogram buckets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::histogram::HistogramResult;
use crate::metrics::{Metric, PublisherComponent};

/// Estimates the column average from the selected histogram, weighting each
/// bucket's midpoint by its count.
///
/// Like the quartile estimates this assumes within-bucket uniformity; the
/// result is rounded to two decimals.
pub struct AverageEstimatorComponent {
    histogram: Arc<dyn ResultProvider<HistogramResult>>,
}

impl AverageEstimatorComponent {
    /// Creates the component over the histogram dependency.
    pub fn new(histogram: Arc<dyn ResultProvider<HistogramResult>>) -> Self {
        Self { histogram }
    }
}

#[async_trait]
impl Component for AverageEstimatorComponent {
    type Output = Option<f64>;

    async fn compute(&self) -> ComponentResult<Option<f64>> {
        let result = self.histogram.result().await?;
        let Some(histogram) = result.selected() else {
            return Ok(None);
        };
        if histogram.buckets.is_empty() {
            return Ok(None);
        }

        let weighted_sum: f64 = histogram
            .buckets
            .iter()
            .map(|b| b.count as f64 * (b.lower_bound + b.width / 2.0))
            .sum();
        let estimate = weighted_sum / histogram.value_counts.total_count as f64;

        Ok(Some((estimate * 100.0).round() / 100.0))
    }

    fn name(&self) -> &'static str {
        "average_estimator"
    }
}

/// Publishes the estimate as `avg_estimate`; nothing when the column was
/// unbucketable.
pub struct AveragePublisher {
    provider: Arc<dyn ResultProvider<Option<f64>>>,
}

impl AveragePublisher {
    /// Wraps an average node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<Option<f64>>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for AveragePublisher {
    fn name(&self) -> &'static str {
        "average_estimator"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        match self.provider.result().await? {
            Some(estimate) => Ok(vec![Metric::new("avg_estimate", estimate)]),
            None => Ok(Vec::new()),
        }
    }
}
