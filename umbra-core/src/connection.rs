//! Query execution against the anonymizing backend.
//!
//! The backend itself is an opaque upstream service reached through the
//! [`QueryBackend`] trait: submit a statement, poll the returned job until it
//! reports a terminal state, optionally cancel it. [`Connection`] drives that
//! loop for one exploration, translating backend failures into the crate's
//! failure taxonomy and honoring cooperative cancellation at every poll.
//!
//! A connection is owned by exactly one exploration and never shared across
//! explorations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Token;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{ExploreError, Result};
use crate::logging::truncate_field;
use crate::query::{Query, RowReader};

/// One row as it arrives from the backend: an ordered token sequence.
pub type RowTokens = Vec<Token>;

/// Identifies a submitted query job on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    /// Backend-assigned job identifier.
    pub id: String,
}

impl JobHandle {
    /// Creates a handle from a backend-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Backend-side failure classification, as reported by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The credentials were rejected.
    Unauthorized,
    /// The data source, table or endpoint does not exist.
    NotFound,
    /// The backend hit an internal problem executing the query.
    InternalError(String),
    /// The backend is temporarily unavailable.
    Unavailable,
    /// The backend timed out contacting the data source.
    Timeout,
}

impl BackendFailure {
    fn into_error(self) -> ExploreError {
        match self {
            Self::Unauthorized => ExploreError::BackendUnauthorized,
            Self::NotFound => ExploreError::BackendNotFound,
            Self::InternalError(message) => ExploreError::BackendInternalError(message),
            Self::Unavailable => ExploreError::BackendUnavailable,
            Self::Timeout => {
                ExploreError::timeout("the backend timed out contacting the data source")
            }
        }
    }
}

/// The state of a submitted job, as reported by a poll.
#[derive(Debug, Clone)]
pub enum JobState {
    /// Still executing; poll again later.
    Running,
    /// Finished; all result rows are materialized.
    Succeeded(Vec<RowTokens>),
    /// Failed on the backend side.
    Failed(BackendFailure),
    /// Cancelled on the backend side.
    Cancelled,
}

/// The transport boundary to the anonymizing backend.
///
/// Implementations perform the actual network calls and deserialization;
/// everything above this trait treats the backend as opaque.
#[async_trait]
pub trait QueryBackend: Send + Sync + 'static {
    /// Submits a statement, returning a handle for polling.
    async fn submit(&self, statement: &str) -> Result<JobHandle>;

    /// Reports the current state of a submitted job.
    async fn poll(&self, job: &JobHandle) -> Result<JobState>;

    /// Requests cancellation of a submitted job. Best effort.
    async fn cancel(&self, job: &JobHandle) -> Result<()>;
}

/// Configuration for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Interval between polls while a job is running.
    pub poll_interval: Duration,
    /// Maximum wait for queries that do not specify their own.
    pub default_max_wait: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            default_max_wait: Duration::from_secs(600),
        }
    }
}

/// Executes query contracts against a backend for one exploration.
///
/// All components of an exploration share one connection; its cancellation
/// token is the exploration's single cancellation switch. Once cancelled, all
/// in-flight and future queries fail promptly with
/// [`ExploreError::QueryCancelled`].
pub struct Connection {
    backend: Arc<dyn QueryBackend>,
    config: ConnectionConfig,
    cancellation: CancellationToken,
}

impl Connection {
    /// Creates a connection over a backend with default configuration.
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self::with_config(backend, ConnectionConfig::default())
    }

    /// Creates a connection with custom polling configuration.
    pub fn with_config(backend: Arc<dyn QueryBackend>, config: ConnectionConfig) -> Self {
        Self {
            backend,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Returns the configuration of this connection.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Requests cancellation of all in-flight and future queries.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Executes a query contract: submit, poll until terminal, parse rows.
    ///
    /// Polling stops early when the query's maximum wait elapses or the
    /// connection is cancelled; in both cases a best-effort cancel is sent to
    /// the backend for the job.
    #[instrument(skip_all, fields(statement = %truncate_field(&query.statement(), 256)))]
    pub async fn exec<Q: Query>(&self, query: &Q) -> Result<Vec<Q::Row>> {
        if self.cancellation.is_cancelled() {
            return Err(ExploreError::QueryCancelled);
        }

        let statement = query.statement();
        let max_wait = query.max_wait().unwrap_or(self.config.default_max_wait);

        let job = self.backend.submit(&statement).await?;
        debug!(job = %job.id, "query submitted");

        let rows = match tokio::time::timeout(max_wait, self.poll_until_done(&job)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(job = %job.id, waited_secs = max_wait.as_secs(), "query exceeded max wait");
                if let Err(e) = self.backend.cancel(&job).await {
                    debug!(job = %job.id, error = %e, "failed to cancel timed-out job");
                }
                return Err(ExploreError::timeout(format!(
                    "query exceeded its maximum wait of {}s",
                    max_wait.as_secs()
                )));
            }
        };

        debug!(job = %job.id, rows = rows.len(), "query succeeded");

        rows.iter()
            .map(|tokens| {
                let mut reader = RowReader::new(tokens);
                let row = query.parse_row(&mut reader)?;
                reader.finish()?;
                Ok(row)
            })
            .collect()
    }

    async fn poll_until_done(&self, job: &JobHandle) -> Result<Vec<RowTokens>> {
        loop {
            match self.backend.poll(job).await? {
                JobState::Running => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = self.cancellation.cancelled() => {
                            if let Err(e) = self.backend.cancel(job).await {
                                debug!(job = %job.id, error = %e, "failed to cancel job");
                            }
                            return Err(ExploreError::QueryCancelled);
                        }
                    }
                }
                JobState::Succeeded(rows) => return Ok(rows),
                JobState::Failed(failure) => return Err(failure.into_error()),
                JobState::Cancelled => return Err(ExploreError::QueryCancelled),
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
