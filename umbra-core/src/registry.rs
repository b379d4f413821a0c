//! In-memory handle table for running explorations.
//!
//! Explorations are identified by their process-unique id and are not
//! persisted: a handle lives from [`ExplorationRegistry::start`] until a poll
//! observes the exploration completed, at which point the handle is removed
//! and dropping it releases the exploration's connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::connection::Connection;
use crate::exploration::{ColumnType, Exploration, ExplorationStatus};
use crate::metrics::Metric;

/// One poll response: a best-effort metrics snapshot plus the status.
///
/// The human-readable `error` cause is present only for `Error` status.
#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    /// The exploration's id.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: ExplorationStatus,
    /// Everything published so far.
    pub metrics: Vec<Metric>,
    /// Human-readable cause, derived from the failure kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The in-memory table of running explorations.
#[derive(Debug, Default)]
pub struct ExplorationRegistry {
    explorations: Mutex<HashMap<Uuid, Arc<Exploration>>>,
}

impl ExplorationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an exploration and stores its handle, returning the id.
    pub fn start(
        &self,
        connection: Connection,
        table: impl Into<String>,
        column: impl Into<String>,
        column_type: ColumnType,
    ) -> Uuid {
        let exploration = Exploration::start(connection, table, column, column_type);
        let id = exploration.id();
        self.explorations
            .lock()
            .expect("exploration table poisoned")
            .insert(id, exploration);
        id
    }

    /// The status of an exploration, if the handle is still live.
    pub fn status(&self, id: &Uuid) -> Option<ExplorationStatus> {
        self.get(id).map(|exploration| exploration.status())
    }

    /// The metrics snapshot of an exploration, if the handle is still live.
    pub fn metrics(&self, id: &Uuid) -> Option<Vec<Metric>> {
        self.get(id).map(|exploration| exploration.metrics())
    }

    /// Polls an exploration: returns its snapshot and, once the caller has
    /// thereby observed completion, removes the handle so the connection can
    /// be released.
    pub fn poll(&self, id: &Uuid) -> Option<PollResponse> {
        let exploration = self.get(id)?;

        let status = exploration.status();
        let error = match status {
            ExplorationStatus::Error => exploration.error().map(|e| e.to_string()),
            _ => None,
        };

        let response = PollResponse {
            id: *id,
            status,
            metrics: exploration.metrics(),
            error,
        };

        if exploration.is_finished() {
            self.explorations
                .lock()
                .expect("exploration table poisoned")
                .remove(id);
            info!(id = %id, status = ?status, "exploration handle removed");
        }

        Some(response)
    }

    /// Requests cancellation of an exploration. Idempotent; returns false
    /// only for unknown handles.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.get(id) {
            Some(exploration) => {
                exploration.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.explorations
            .lock()
            .expect("exploration table poisoned")
            .len()
    }

    /// True when no handles are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: &Uuid) -> Option<Arc<Exploration>> {
        self.explorations
            .lock()
            .expect("exploration table poisoned")
            .get(id)
            .cloned()
    }
}
