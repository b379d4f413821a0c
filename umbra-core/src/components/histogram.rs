//! Histogram bucket selection under suppression pressure.
//!
//! Small buckets give resolution but push more buckets under the
//! anonymization threshold, losing rows to suppression; large buckets keep
//! rows but blur the distribution. The selector samples several resolutions
//! in one grouping-sets query and keeps the one that loses the fewest rows.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::simple_stats::SimpleStatsResult;
use crate::components::ExploreContext;
use crate::connection::Connection;
use crate::grouping::IndexedGroupingSetsResult;
use crate::metrics::{Metric, MetricValue, PublisherComponent};
use crate::queries::SingleColumnHistogram;
use crate::value::ValueCounts;

/// Target average row count per bucket when deriving candidate widths.
pub const VALUES_PER_BUCKET_TARGET: u64 = 20;

/// Candidates losing more than this fraction of rows to suppression are
/// rejected while an acceptable alternative exists.
pub const SUPPRESSED_RATIO_THRESHOLD: f64 = 0.1;

/// Derives candidate bucket widths for a column's value range.
///
/// The ideal width would put [`VALUES_PER_BUCKET_TARGET`] rows into each
/// bucket under a uniform spread; it is snapped down to a power of ten, and
/// the two next-coarser powers are offered alongside it so the selector can
/// trade resolution against suppression.
pub fn estimate_bucket_resolutions(
    count: u64,
    min: f64,
    max: f64,
    values_per_bucket: u64,
) -> Vec<f64> {
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![1.0];
    }

    let target_buckets = (count / values_per_bucket).max(1);
    let ideal_width = range / target_buckets as f64;
    let snapped = 10f64.powi(ideal_width.log10().floor() as i32);

    vec![snapped, snapped * 10.0, snapped * 100.0]
}

/// One bucket of the selected histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    /// Lower bound of the bucket (inclusive).
    pub lower_bound: f64,
    /// Width of the bucket.
    pub width: f64,
    /// Anonymized count of rows in this bucket.
    pub count: u64,
}

/// The candidate resolution the selector settled on.
#[derive(Debug, Clone)]
pub struct SelectedHistogram {
    /// The selected bucket width.
    pub bucket_size: f64,
    /// Suppression accounting over the candidate's rows.
    pub value_counts: ValueCounts,
    /// Disclosed buckets in ascending lower-bound order.
    pub buckets: Vec<HistogramBucket>,
}

/// Outcome of the bucket selection.
///
/// `Unbucketable` is a degradation, not a failure: the dependent estimators
/// publish nothing for the column instead of erasing unrelated statistics.
#[derive(Debug, Clone)]
pub enum HistogramResult {
    /// A resolution with acceptable suppression was found.
    Buckets(SelectedHistogram),
    /// No candidate resolution survives anonymization at an acceptable
    /// suppression level.
    Unbucketable,
}

impl HistogramResult {
    /// The selected histogram, if the column was bucketable.
    pub fn selected(&self) -> Option<&SelectedHistogram> {
        match self {
            Self::Buckets(histogram) => Some(histogram),
            Self::Unbucketable => None,
        }
    }
}

/// Runs the multi-resolution histogram query and selects a bucket width.
pub struct NumericHistogramComponent {
    conn: Arc<Connection>,
    ctx: ExploreContext,
    stats: Arc<dyn ResultProvider<SimpleStatsResult>>,
}

struct CandidateHistogram {
    bucket_size: f64,
    value_counts: ValueCounts,
    buckets: Vec<HistogramBucket>,
}

impl NumericHistogramComponent {
    /// Creates the component over the naive-stats dependency.
    pub fn new(
        conn: Arc<Connection>,
        ctx: ExploreContext,
        stats: Arc<dyn ResultProvider<SimpleStatsResult>>,
    ) -> Self {
        Self { conn, ctx, stats }
    }

    fn select(mut candidates: Vec<CandidateHistogram>) -> HistogramResult {
        candidates
            .retain(|c| c.value_counts.suppressed_ratio() <= SUPPRESSED_RATIO_THRESHOLD);

        let best = candidates.into_iter().min_by(|a, b| {
            a.value_counts
                .suppressed_count
                .cmp(&b.value_counts.suppressed_count)
                .then(
                    a.bucket_size
                        .partial_cmp(&b.bucket_size)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        match best {
            Some(candidate) => HistogramResult::Buckets(SelectedHistogram {
                bucket_size: candidate.bucket_size,
                value_counts: candidate.value_counts,
                buckets: candidate.buckets,
            }),
            None => HistogramResult::Unbucketable,
        }
    }
}

#[async_trait]
impl Component for NumericHistogramComponent {
    type Output = HistogramResult;

    async fn compute(&self) -> ComponentResult<HistogramResult> {
        let stats = self.stats.result().await?;

        let (Some(min), Some(max)) = (stats.min, stats.max) else {
            debug!("column has no disclosed bounds, skipping histogram");
            return Ok(HistogramResult::Unbucketable);
        };
        if stats.count == 0 {
            return Ok(HistogramResult::Unbucketable);
        }

        let sizes: Arc<[f64]> = estimate_bucket_resolutions(
            stats.count,
            min,
            max,
            VALUES_PER_BUCKET_TARGET,
        )
        .into();

        let query = SingleColumnHistogram::new(&self.ctx.table, &self.ctx.column, sizes.clone());
        let rows = self.conn.exec(&query).await?;

        let mut per_candidate: Vec<Vec<IndexedGroupingSetsResult<f64, f64>>> =
            (0..sizes.len()).map(|_| Vec::new()).collect();
        for row in rows {
            per_candidate[row.grouping_index()].push(row);
        }

        let mut candidates = Vec::with_capacity(sizes.len());
        for (size, rows) in sizes.iter().zip(per_candidate) {
            // A resolution with no rows at all cannot be summarized; drop it.
            let Ok(value_counts) = ValueCounts::compute(&rows) else {
                continue;
            };

            let mut buckets: Vec<HistogramBucket> = rows
                .iter()
                .filter_map(|row| {
                    row.value().value().map(|lower_bound| HistogramBucket {
                        lower_bound: *lower_bound,
                        width: *size,
                        count: row.count(),
                    })
                })
                .collect();
            buckets.sort_by(|a, b| {
                a.lower_bound
                    .partial_cmp(&b.lower_bound)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            candidates.push(CandidateHistogram {
                bucket_size: *size,
                value_counts,
                buckets,
            });
        }

        let result = Self::select(candidates);
        if matches!(result, HistogramResult::Unbucketable) {
            debug!(
                table = %self.ctx.table,
                column = %self.ctx.column,
                "no histogram resolution with acceptable suppression"
            );
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "numeric_histogram"
    }
}

/// Publishes the selected histogram as `histogram.buckets`,
/// `histogram.suppressed_count`, `histogram.suppressed_ratio` and
/// `histogram.value_counts`. Publishes nothing for unbucketable columns.
pub struct HistogramPublisher {
    provider: Arc<dyn ResultProvider<HistogramResult>>,
}

impl HistogramPublisher {
    /// Wraps a histogram node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<HistogramResult>>) -> Self {
        Self { provider }
    }
}

fn value_counts_metric(counts: &ValueCounts) -> MetricValue {
    MetricValue::record([
        ("total_count", MetricValue::from(counts.total_count)),
        ("suppressed_count", MetricValue::from(counts.suppressed_count)),
        ("null_count", MetricValue::from(counts.null_count)),
        ("suppressed_ratio", MetricValue::from(counts.suppressed_ratio())),
    ])
}

#[async_trait]
impl PublisherComponent for HistogramPublisher {
    fn name(&self) -> &'static str {
        "numeric_histogram"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let Some(histogram) = self.provider.result().await?.selected().cloned() else {
            return Ok(Vec::new());
        };

        let buckets: Vec<MetricValue> = histogram
            .buckets
            .iter()
            .map(|bucket| {
                MetricValue::record([
                    ("bucket_size", MetricValue::from(bucket.width)),
                    ("lower_bound", MetricValue::from(bucket.lower_bound)),
                    ("count", MetricValue::from(bucket.count)),
                ])
            })
            .collect();

        Ok(vec![
            Metric::new("histogram.buckets", buckets),
            Metric::new(
                "histogram.suppressed_count",
                histogram.value_counts.suppressed_count,
            ),
            Metric::new(
                "histogram.suppressed_ratio",
                histogram.value_counts.suppressed_ratio(),
            ),
            Metric::new(
                "histogram.value_counts",
                value_counts_metric(&histogram.value_counts),
            ),
        ])
    }
}
