//! The exploration component graph: refinement algorithms and their
//! publishers.
//!
//! Each statistic is a [`crate::component::Component`] wrapped into a
//! memoized node, plus a publisher that renders the node's eventual result as
//! named metrics. Dependencies between statistics are expressed by holding
//! the dependency's node, so shared work (e.g. the naive stats feeding both
//! the histogram and, through it, the quartile estimator) runs exactly once.

mod average;
mod distinct_values;
mod histogram;
mod min_max_refiner;
mod quartiles;
mod simple_stats;
mod text_prefixes;

pub use average::{AverageEstimatorComponent, AveragePublisher};
pub use distinct_values::{DistinctValuesComponent, DistinctValuesPublisher, DistinctValuesResult};
pub use histogram::{
    estimate_bucket_resolutions, HistogramBucket, HistogramResult, NumericHistogramComponent,
    HistogramPublisher, SelectedHistogram, SUPPRESSED_RATIO_THRESHOLD, VALUES_PER_BUCKET_TARGET,
};
pub use min_max_refiner::{MinMaxPublisher, MinMaxRefinerComponent, MinMaxResult};
pub use quartiles::{estimate_quartiles, QuartileEstimatorComponent, QuartilesPublisher};
pub use simple_stats::{SimpleStatsComponent, SimpleStatsPublisher, SimpleStatsResult};
pub use text_prefixes::{TextPrefixes, TextPrefixesComponent, TextPrefixesPublisher};

/// The table/column a component graph explores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreContext {
    /// The table holding the explored column.
    pub table: String,
    /// The explored column.
    pub column: String,
}

impl ExploreContext {
    /// Creates an exploration context.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}
