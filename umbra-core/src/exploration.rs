//! The exploration orchestrator.
//!
//! One [`Exploration`] owns the component graph for a (table, column, type)
//! triple: it builds the graph once at start time, schedules every publisher
//! concurrently, aggregates their metrics into a pollable snapshot, and
//! derives its status from the conjunction of their completions.
//!
//! Failure domains are isolated per publisher: the first terminal failure
//! sets the exploration's status, but publishers that already completed keep
//! their metrics, and degradable insufficiencies (an unbucketable histogram,
//! say) publish nothing instead of failing anything.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::component::Memoized;
use crate::components::{
    AverageEstimatorComponent, AveragePublisher, DistinctValuesComponent,
    DistinctValuesPublisher, ExploreContext, MinMaxPublisher, MinMaxRefinerComponent,
    NumericHistogramComponent, HistogramPublisher, QuartileEstimatorComponent,
    QuartilesPublisher, SimpleStatsComponent, SimpleStatsPublisher, TextPrefixesComponent,
    TextPrefixesPublisher,
};
use crate::connection::Connection;
use crate::error::ExploreError;
use crate::metrics::{Metric, MetricsSink, PublisherComponent};

/// The type of the explored column, as reported by the data source's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Boolean column.
    Bool,
    /// Integer-valued numeric column.
    Integer,
    /// Real-valued numeric column.
    Real,
    /// Text column.
    Text,
    /// Date/time column.
    Timestamp,
    /// Any other column type.
    Unknown,
}

/// Lifecycle status of an exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationStatus {
    /// Created; no component has started computing yet.
    New,
    /// At least one component is still outstanding.
    Processing,
    /// All components finished successfully.
    Complete,
    /// A component terminated with a failure.
    Error,
    /// Cancellation was requested and outstanding work was aborted.
    Cancelled,
}

struct ExplorationState {
    begun: AtomicUsize,
    first_failure: Mutex<Option<Arc<ExploreError>>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ExplorationState {
    fn record_failure(&self, failure: Arc<ExploreError>) {
        let mut slot = self.first_failure.lock().expect("failure slot poisoned");
        if slot.is_none() {
            *slot = Some(failure);
        }
    }

    fn first_failure(&self) -> Option<Arc<ExploreError>> {
        self.first_failure
            .lock()
            .expect("failure slot poisoned")
            .clone()
    }
}

/// One running exploration of a single column.
///
/// Created with [`Exploration::start`], which spawns the whole component
/// graph immediately; all accessors are safe to call at any point of the
/// lifecycle. The exploration owns the connection its components share, so
/// dropping the last handle releases it.
pub struct Exploration {
    id: Uuid,
    table: String,
    column: String,
    column_type: ColumnType,
    created_at: DateTime<Utc>,
    connection: Arc<Connection>,
    sink: Arc<MetricsSink>,
    state: Arc<ExplorationState>,
}

impl Exploration {
    /// Builds the component graph for the column type and schedules every
    /// publisher concurrently. Must be called from within a tokio runtime.
    pub fn start(
        connection: Connection,
        table: impl Into<String>,
        column: impl Into<String>,
        column_type: ColumnType,
    ) -> Arc<Self> {
        let table = table.into();
        let column = column.into();
        let connection = Arc::new(connection);
        let sink = Arc::new(MetricsSink::new());

        let ctx = ExploreContext::new(table.as_str(), column.as_str());
        let publishers = build_graph(&connection, ctx, column_type);

        let (done_tx, done_rx) = watch::channel(false);
        let state = Arc::new(ExplorationState {
            begun: AtomicUsize::new(0),
            first_failure: Mutex::new(None),
            done_tx,
            done_rx,
        });

        let exploration = Arc::new(Self {
            id: Uuid::new_v4(),
            table,
            column,
            column_type,
            created_at: Utc::now(),
            connection,
            sink: sink.clone(),
            state: state.clone(),
        });

        info!(
            id = %exploration.id,
            table = %exploration.table,
            column = %exploration.column,
            column_type = ?column_type,
            publishers = publishers.len(),
            "exploration started"
        );

        let mut tasks = JoinSet::new();
        for publisher in publishers {
            let sink = sink.clone();
            let state = state.clone();
            tasks.spawn(async move {
                state.begun.fetch_add(1, Ordering::SeqCst);
                match publisher.yield_metrics().await {
                    Ok(metrics) => sink.extend(metrics),
                    Err(failure) => {
                        warn!(
                            publisher = publisher.name(),
                            error = %failure,
                            "publisher failed"
                        );
                        state.record_failure(failure);
                    }
                }
            });
        }

        tokio::spawn(async move {
            while tasks.join_next().await.is_some() {}
            let _ = state.done_tx.send(true);
        });

        exploration
    }

    /// The process-unique identity of this exploration.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The explored table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The explored column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The explored column's type.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// When the exploration was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Derives the current lifecycle status.
    pub fn status(&self) -> ExplorationStatus {
        if self.is_finished() {
            match self.state.first_failure() {
                None => ExplorationStatus::Complete,
                Some(failure) if failure.is_cancellation() => ExplorationStatus::Cancelled,
                Some(_) => ExplorationStatus::Error,
            }
        } else if self.state.begun.load(Ordering::SeqCst) == 0 {
            ExplorationStatus::New
        } else {
            ExplorationStatus::Processing
        }
    }

    /// A snapshot of everything published so far, in publish order.
    ///
    /// Safe to call at any time, including before completion; partial results
    /// are returned as they accumulate.
    pub fn metrics(&self) -> Vec<Metric> {
        self.sink.snapshot()
    }

    /// Requests cancellation of the shared connection.
    ///
    /// In-flight and not-yet-started queries stop promptly; results that
    /// components already cached are retained and remain visible through
    /// [`Self::metrics`]. Idempotent.
    pub fn cancel(&self) {
        if !self.connection.is_cancelled() {
            info!(id = %self.id, "exploration cancelled");
        }
        self.connection.cancel();
    }

    /// True once every publisher has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        *self.state.done_rx.borrow()
    }

    /// The first terminal failure observed, if any.
    pub fn error(&self) -> Option<Arc<ExploreError>> {
        self.state.first_failure()
    }

    /// Resolves once all publishers have finished, re-surfacing the first
    /// captured failure so the caller can react to it.
    pub async fn completion(&self) -> Result<(), Arc<ExploreError>> {
        let mut done = self.state.done_rx.clone();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                break;
            }
        }

        match self.state.first_failure() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Exploration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exploration")
            .field("id", &self.id)
            .field("table", &self.table)
            .field("column", &self.column)
            .field("column_type", &self.column_type)
            .field("status", &self.status())
            .finish()
    }
}

/// Builds the component graph for a column type.
///
/// The graph is assembled once and never mutated: dependents hold their
/// dependencies' memoized nodes, so shared work like the naive stats feeding
/// the histogram (and, through it, the quartile and average estimators) runs
/// exactly once regardless of fan-out.
fn build_graph(
    connection: &Arc<Connection>,
    ctx: ExploreContext,
    column_type: ColumnType,
) -> Vec<Arc<dyn PublisherComponent>> {
    let distinct = Memoized::new(DistinctValuesComponent::new(connection.clone(), ctx.clone()));
    let mut publishers: Vec<Arc<dyn PublisherComponent>> =
        vec![Arc::new(DistinctValuesPublisher::new(distinct))];

    match column_type {
        ColumnType::Integer | ColumnType::Real => {
            let stats = Memoized::new(SimpleStatsComponent::new(connection.clone(), ctx.clone()));
            let min_max =
                Memoized::new(MinMaxRefinerComponent::new(connection.clone(), ctx.clone()));
            let histogram = Memoized::new(NumericHistogramComponent::new(
                connection.clone(),
                ctx,
                stats.clone(),
            ));
            let quartiles = Memoized::new(QuartileEstimatorComponent::new(histogram.clone()));
            let average = Memoized::new(AverageEstimatorComponent::new(histogram.clone()));

            publishers.push(Arc::new(SimpleStatsPublisher::new(stats)));
            publishers.push(Arc::new(MinMaxPublisher::new(min_max)));
            publishers.push(Arc::new(HistogramPublisher::new(histogram)));
            publishers.push(Arc::new(QuartilesPublisher::new(quartiles)));
            publishers.push(Arc::new(AveragePublisher::new(average)));
        }
        ColumnType::Text => {
            let prefixes =
                Memoized::new(TextPrefixesComponent::new(connection.clone(), ctx));
            publishers.push(Arc::new(TextPrefixesPublisher::new(prefixes)));
        }
        // Distinct values are the only statistic that applies to every
        // remaining type.
        ColumnType::Bool | ColumnType::Timestamp | ColumnType::Unknown => {}
    }

    publishers
}
