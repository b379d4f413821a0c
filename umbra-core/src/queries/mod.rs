//! Concrete query contracts submitted by the exploration components.
//!
//! Each contract pairs a backend statement with the positional row parser for
//! its result shape; see [`crate::query`] for the contract trait itself.

mod basic_stats;
mod distinct_values;
mod histogram;
mod min_max;
mod text_prefix;

pub use basic_stats::{BasicColumnStats, BasicStatsRow};
pub use distinct_values::DistinctColumnValues;
pub use histogram::SingleColumnHistogram;
pub use min_max::{MaxEstimate, MinEstimate};
pub use text_prefix::TextColumnPrefix;
