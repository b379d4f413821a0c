//! Prelude for commonly used types and traits in umbra-core.

pub use crate::component::{Component, ComponentResult, Memoized, ResultProvider};
pub use crate::connection::{Connection, ConnectionConfig, JobState, QueryBackend};
pub use crate::error::{ExploreError, Result};
pub use crate::exploration::{ColumnType, Exploration, ExplorationStatus};
pub use crate::logging::LogConfig;
pub use crate::metrics::{Metric, MetricValue, PublisherComponent};
pub use crate::registry::{ExplorationRegistry, PollResponse};
pub use crate::value::{DValue, ValueCounts, ValueWithCount};
