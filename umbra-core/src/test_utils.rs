//! Test fixtures for exercising explorations without a live backend.
//!
//! [`ScriptedBackend`] implements [`QueryBackend`] over an in-memory script:
//! each entry pairs a statement pattern with the outcome the backend should
//! produce for it. Patterns are matched as substrings in insertion order, so
//! iterative refinement sequences can be scripted by their distinguishing
//! bounds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::connection::{BackendFailure, JobHandle, JobState, QueryBackend, RowTokens};
use crate::error::{ExploreError, Result};

/// The scripted outcome for one statement pattern.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// The job succeeds with these rows.
    Rows(Vec<RowTokens>),
    /// The job fails with this backend classification.
    Fail(BackendFailure),
    /// The job reports `Running` forever; use to test cancellation and
    /// timeouts.
    NeverReady,
}

#[derive(Debug)]
struct Script {
    pattern: String,
    outcome: ScriptedOutcome,
}

/// An in-memory [`QueryBackend`] driven by a statement script.
///
/// Records every submitted statement and every cancelled job so tests can
/// assert on the traffic an algorithm generated.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<Vec<Script>>,
    jobs: Mutex<HashMap<String, ScriptedOutcome>>,
    poll_counts: Mutex<HashMap<String, u32>>,
    submitted: Mutex<Vec<String>>,
    cancelled: Mutex<Vec<String>>,
    next_job: AtomicU64,
    polls_before_ready: u32,
}

impl ScriptedBackend {
    /// Creates an empty backend; unmatched statements fail their submit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every job report `Running` for this many polls before its
    /// scripted outcome. Defaults to zero.
    pub fn with_polls_before_ready(mut self, polls: u32) -> Self {
        self.polls_before_ready = polls;
        self
    }

    /// Scripts an outcome for statements containing `pattern`.
    pub fn on(self, pattern: impl Into<String>, outcome: ScriptedOutcome) -> Self {
        self.scripts.lock().expect("script table poisoned").push(Script {
            pattern: pattern.into(),
            outcome,
        });
        self
    }

    /// Scripts a successful result for statements containing `pattern`.
    pub fn rows(self, pattern: impl Into<String>, rows: Vec<RowTokens>) -> Self {
        self.on(pattern, ScriptedOutcome::Rows(rows))
    }

    /// Scripts a backend failure for statements containing `pattern`.
    pub fn fail(self, pattern: impl Into<String>, failure: BackendFailure) -> Self {
        self.on(pattern, ScriptedOutcome::Fail(failure))
    }

    /// Scripts a never-completing job for statements containing `pattern`.
    pub fn never_ready(self, pattern: impl Into<String>) -> Self {
        self.on(pattern, ScriptedOutcome::NeverReady)
    }

    /// Finishes the builder, producing the shareable backend.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// All statements submitted so far, in submission order.
    pub fn submitted_statements(&self) -> Vec<String> {
        self.submitted.lock().expect("submit log poisoned").clone()
    }

    /// How many submitted statements contained `pattern`.
    pub fn submitted_matching(&self, pattern: &str) -> usize {
        self.submitted
            .lock()
            .expect("submit log poisoned")
            .iter()
            .filter(|s| s.contains(pattern))
            .count()
    }

    /// How many jobs received a cancel call.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.lock().expect("cancel log poisoned").len()
    }

    fn outcome_for(&self, statement: &str) -> Option<ScriptedOutcome> {
        self.scripts
            .lock()
            .expect("script table poisoned")
            .iter()
            .find(|script| statement.contains(&script.pattern))
            .map(|script| script.outcome.clone())
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn submit(&self, statement: &str) -> Result<JobHandle> {
        self.submitted
            .lock()
            .expect("submit log poisoned")
            .push(statement.to_string());

        let outcome = self.outcome_for(statement).ok_or_else(|| {
            ExploreError::BackendInternalError(format!(
                "no scripted outcome matches statement: {statement}"
            ))
        })?;

        let id = format!("job-{}", self.next_job.fetch_add(1, Ordering::SeqCst));
        self.jobs
            .lock()
            .expect("job table poisoned")
            .insert(id.clone(), outcome);
        Ok(JobHandle::new(id))
    }

    async fn poll(&self, job: &JobHandle) -> Result<JobState> {
        let outcome = self
            .jobs
            .lock()
            .expect("job table poisoned")
            .get(&job.id)
            .cloned()
            .ok_or_else(|| {
                ExploreError::BackendInternalError(format!("unknown job: {}", job.id))
            })?;

        let polls = {
            let mut counts = self.poll_counts.lock().expect("poll counts poisoned");
            let entry = counts.entry(job.id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if polls <= self.polls_before_ready {
            return Ok(JobState::Running);
        }

        Ok(match outcome {
            ScriptedOutcome::Rows(rows) => JobState::Succeeded(rows),
            ScriptedOutcome::Fail(failure) => JobState::Failed(failure),
            ScriptedOutcome::NeverReady => JobState::Running,
        })
    }

    async fn cancel(&self, job: &JobHandle) -> Result<()> {
        self.cancelled
            .lock()
            .expect("cancel log poisoned")
            .push(job.id.clone());
        Ok(())
    }
}

/// Random distinct-value rows for aggregation tests.
///
/// Produces `rows` rows whose counts sum arbitrarily, with roughly the given
/// fractions of suppressed and NULL rows.
#[cfg(any(test, feature = "test-utils"))]
pub fn random_distinct_rows(
    rows: usize,
    suppressed_fraction: f64,
    null_fraction: f64,
    rng: &mut impl rand::Rng,
) -> Vec<RowTokens> {
    use serde_json::json;

    (0..rows)
        .map(|i| {
            let roll: f64 = rng.random();
            let value = if roll < suppressed_fraction {
                json!("*")
            } else if roll < suppressed_fraction + null_fraction {
                json!(null)
            } else {
                json!(i as i64)
            };
            vec![value, json!(rng.random_range(1..100)), json!(null)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_first_matching_script_wins() {
        let backend = ScriptedBackend::new()
            .rows("where amount < 10", vec![vec![json!(5.0)]])
            .rows("select min(amount)", vec![vec![json!(10.0)]]);

        let job = backend
            .submit("select min(amount) from loans where amount < 10")
            .await
            .unwrap();
        match backend.poll(&job).await.unwrap() {
            JobState::Succeeded(rows) => assert_eq!(rows, vec![vec![json!(5.0)]]),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmatched_statement_fails_submit() {
        let backend = ScriptedBackend::new();
        let err = backend.submit("select 1").await.unwrap_err();
        assert!(matches!(err, ExploreError::BackendInternalError(_)));
    }

    #[tokio::test]
    async fn test_running_until_ready() {
        let backend = ScriptedBackend::new()
            .with_polls_before_ready(2)
            .rows("select", vec![vec![json!(1)]]);

        let job = backend.submit("select count(*) from t").await.unwrap();
        assert!(matches!(backend.poll(&job).await.unwrap(), JobState::Running));
        assert!(matches!(backend.poll(&job).await.unwrap(), JobState::Running));
        assert!(matches!(
            backend.poll(&job).await.unwrap(),
            JobState::Succeeded(_)
        ));
    }

    #[test]
    fn test_random_rows_respect_fractions_roughly() {
        use crate::value::{CountedRow, ValueCounts, ValueWithCount};
        use crate::query::RowReader;

        let mut rng = rand::rng();
        let tokens = random_distinct_rows(200, 0.2, 0.1, &mut rng);

        let rows: Vec<ValueWithCount<serde_json::Value>> = tokens
            .iter()
            .map(|t| {
                let mut reader = RowReader::new(t);
                let value = reader.read_value().unwrap();
                let count = reader.read_count().unwrap();
                let noise = reader.read_noise().unwrap();
                ValueWithCount::new(value, count, noise)
            })
            .collect();

        let counts = ValueCounts::compute(&rows).unwrap();
        // The invariant holds regardless of the randomness.
        assert!(counts.suppressed_count + counts.null_count <= counts.total_count);
        assert!(rows.iter().any(|r| r.count() > 0));
    }
}
