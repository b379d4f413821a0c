//! # Umbra - Anonymized Column Exploration
//!
//! Umbra explores a single column of a database table that is only reachable
//! through an anonymizing query API. It issues a battery of statistical
//! queries (counts, min/max, histograms, distinct values), compensates for
//! the artifacts anonymization introduces (value suppression, noisy counts),
//! and publishes a growing set of named metrics describing the column's
//! distribution. Each exploration runs as a long-running, cancellable,
//! pollable background job.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use umbra_core::prelude::*;
//!
//! # async fn example(backend: std::sync::Arc<dyn QueryBackend>) {
//! let registry = ExplorationRegistry::new();
//!
//! // Kick off an exploration; the whole component graph starts computing
//! // concurrently in the background.
//! let connection = Connection::new(backend);
//! let id = registry.start(connection, "loans", "amount", ColumnType::Real);
//!
//! // Poll for a best-effort snapshot at any time.
//! if let Some(response) = registry.poll(&id) {
//!     for metric in &response.metrics {
//!         println!("{} = {}", metric.name, metric.value);
//!     }
//! }
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`value`**: the tri-state column value model (present / null /
//!   suppressed) and suppression accounting
//! - **`grouping`**: decoding of combined grouping-set identifiers
//! - **`query`** / **`queries`**: query contracts pairing statements with
//!   positional row parsers
//! - **`connection`**: submit/poll execution against the backend with
//!   cooperative cancellation and per-query timeouts
//! - **`component`**: lazily-evaluated, memoized, shareable computation nodes
//! - **`components`**: the refinement algorithms (min/max narrowing,
//!   histogram bucket selection, quartile and average estimation, prefix
//!   sampling) and their metric publishers
//! - **`exploration`** / **`registry`**: the orchestrator and the in-memory
//!   handle table behind the start/poll/cancel interface
//!
//! ## Anonymization artifacts
//!
//! The backend suppresses values whose underlying group is too small to
//! disclose safely and attaches noise to counts. Umbra treats suppression as
//! a first-class state distinct from NULL, accounts for suppressed rows in
//! every aggregate, and picks statistic resolutions (histogram bucket widths,
//! prefix lengths) that keep the suppressed fraction acceptable.

pub mod component;
pub mod components;
pub mod connection;
pub mod error;
pub mod exploration;
pub mod grouping;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod queries;
pub mod query;
pub mod registry;
pub mod test_utils;
pub mod value;
