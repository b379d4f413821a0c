//! Quartile estimation from histogram buckets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::histogram::{HistogramBucket, HistogramResult};
use crate::metrics::{Metric, MetricValue, PublisherComponent};

/// Estimates the 25th/50th/75th percentile boundaries from histogram buckets
/// without raw row access.
///
/// Walks the buckets in ascending lower-bound order, linearly interpolating
/// each quartile boundary inside the bucket whose running total crosses the
/// threshold. This assumes a uniform distribution within each bucket; the
/// estimates are approximations, not exact quantiles.
pub fn estimate_quartiles(buckets: &[HistogramBucket], total_count: u64) -> Vec<f64> {
    let quartile_count = total_count / 4;
    let mut estimates = Vec::with_capacity(3);
    let mut processed: u64 = 0;
    let mut quartile: u64 = 1;

    for bucket in buckets {
        if processed + bucket.count < quartile_count * quartile {
            // No quartile boundary falls inside this bucket.
            processed += bucket.count;
            continue;
        }

        // One or more boundaries fall inside this bucket.
        let mut remaining = bucket.count;
        let mut lower_bound = bucket.lower_bound;
        let mut range = bucket.width;

        loop {
            let to_process = quartile_count * quartile - processed;
            if to_process > remaining {
                processed += remaining;
                break;
            }

            let sub_range = to_process as f64 / remaining as f64 * range;
            let estimate = lower_bound + sub_range;
            estimates.push(estimate);

            lower_bound = estimate;
            range -= sub_range;
            processed += to_process;
            remaining -= to_process;
            quartile += 1;

            if remaining == 0 || quartile > 3 {
                break;
            }
        }

        if quartile > 3 {
            break;
        }
    }

    estimates
}

/// Computes quartile estimates over the selected histogram.
///
/// Yields nothing for unbucketable columns; the estimator shares the
/// histogram node with the average estimator, so the bucket selection runs
/// once for both.
pub struct QuartileEstimatorComponent {
    histogram: Arc<dyn ResultProvider<HistogramResult>>,
}

impl QuartileEstimatorComponent {
    /// Creates the component over the histogram dependency.
    pub fn new(histogram: Arc<dyn ResultProvider<HistogramResult>>) -> Self {
        Self { histogram }
    }
}

#[async_trait]
impl Component for QuartileEstimatorComponent {
    type Output = Option<Vec<f64>>;

    async fn compute(&self) -> ComponentResult<Option<Vec<f64>>> {
        match self.histogram.result().await? {
            HistogramResult::Unbucketable => Ok(None),
            HistogramResult::Buckets(histogram) => Ok(Some(estimate_quartiles(
                &histogram.buckets,
                histogram.value_counts.total_count,
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "quartile_estimator"
    }
}

/// Publishes the estimates as `quartile_estimates`; nothing when the column
/// was unbucketable.
pub struct QuartilesPublisher {
    provider: Arc<dyn ResultProvider<Option<Vec<f64>>>>,
}

impl QuartilesPublisher {
    /// Wraps a quartile node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<Option<Vec<f64>>>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for QuartilesPublisher {
    fn name(&self) -> &'static str {
        "quartile_estimator"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let Some(estimates) = self.provider.result().await? else {
            return Ok(Vec::new());
        };

        let values: Vec<MetricValue> = estimates.into_iter().map(MetricValue::from).collect();
        Ok(vec![Metric::new("quartile_estimates", values)])
    }
}
