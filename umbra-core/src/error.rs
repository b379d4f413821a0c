//! Error types for the Umbra exploration library.
//!
//! This module provides the error handling strategy using `thiserror` for
//! automatic error trait implementations. All failures surfaced by an
//! exploration are represented by the [`ExploreError`] enum, which mirrors
//! the small taxonomy the anonymizing backend and the refinement algorithms
//! can produce.

use thiserror::Error;

/// The main error type for the Umbra library.
///
/// Backend-classified failures carry the wording the backend operators use;
/// the remaining variants describe conditions detected inside the exploration
/// core itself.
#[derive(Error, Debug)]
pub enum ExploreError {
    /// The backend rejected the supplied credentials.
    #[error("Unauthorized -- the backend rejected the API token")]
    BackendUnauthorized,

    /// The backend does not know the requested data source, table or endpoint.
    #[error("Not Found -- unknown data source, table or endpoint")]
    BackendNotFound,

    /// The backend reported a server-side problem while executing the query.
    #[error("Internal Server Error -- the backend failed to execute the query: {0}")]
    BackendInternalError(String),

    /// The backend is temporarily offline or overloaded.
    #[error("Service Unavailable -- the backend is temporarily offline, try again later")]
    BackendUnavailable,

    /// A query exceeded its maximum wait, either locally or reported by the
    /// backend as a gateway timeout.
    #[error("Timeout -- {0}")]
    BackendTimeout(String),

    /// The query was cancelled cooperatively before it produced a result.
    #[error("query cancelled")]
    QueryCancelled,

    /// Anonymization left zero usable rows; the analysis cannot proceed.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A grouping identifier did not resolve to exactly one active column.
    #[error("malformed grouping id {grouping_id} for {group_count} grouping columns")]
    MalformedGroupingId {
        /// Number of grouping columns combined in the statement.
        group_count: u32,
        /// The offending identifier as returned by the backend.
        grouping_id: u32,
    },

    /// A query result violated the shape an algorithm relies on, e.g. a
    /// refinement query returning more or fewer rows than exactly one, or a
    /// row token of an unexpected type.
    #[error("unexpected query result: {0}")]
    UnexpectedQueryResult(String),
}

/// A type alias for `Result<T, ExploreError>`.
///
/// This is the standard `Result` type used throughout the Umbra library.
pub type Result<T> = std::result::Result<T, ExploreError>;

impl ExploreError {
    /// Creates an insufficient-data error with the given message.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    /// Creates an unexpected-query-result error with the given message.
    pub fn unexpected_result(msg: impl Into<String>) -> Self {
        Self::UnexpectedQueryResult(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::BackendTimeout(msg.into())
    }

    /// Returns true if this failure was caused by cooperative cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::QueryCancelled)
    }

    /// Returns true if this failure originated on the backend side.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::BackendUnauthorized
                | Self::BackendNotFound
                | Self::BackendInternalError(_)
                | Self::BackendUnavailable
                | Self::BackendTimeout(_)
        )
    }
}
