//! Lazily-evaluated, memoized computation nodes.
//!
//! Every statistic in an exploration is a component: a zero-argument
//! asynchronous computation whose result is computed on first access, cached
//! for the component's lifetime, and shared with every dependent. Concurrent
//! first-time accessors all observe the same in-flight computation, so no
//! work is duplicated; a failed computation is cached and replayed the same
//! way and is never retried.
//!
//! Dependents hold a reference to the dependency's node, never a copy of its
//! result, so diamond-shaped graphs still compute each node exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ExploreError;

/// A component outcome, cloneable to every accessor.
///
/// Failures are shared behind an `Arc` so that the cached error replays to
/// all dependents without requiring `ExploreError: Clone`.
pub type ComponentResult<T> = std::result::Result<T, Arc<ExploreError>>;

/// A computation node of the exploration graph.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// The result this component computes.
    type Output: Clone + Send + Sync + 'static;

    /// Runs the computation. Called at most once per component instance.
    async fn compute(&self) -> ComponentResult<Self::Output>;

    /// The component's name, used for logging and failure reporting.
    fn name(&self) -> &'static str;
}

/// Read access to a component's eventual result.
///
/// Dependents and publishers are written against this trait so they can hold
/// any node producing the result type they need.
#[async_trait]
pub trait ResultProvider<T>: Send + Sync {
    /// Returns the result, computing it if this is the first access.
    async fn result(&self) -> ComponentResult<T>;
}

/// The once-only result slot around a [`Component`].
///
/// The slot has three states: unstarted, pending, and resolved with a result
/// or failure. The first accessor triggers the computation; accessors
/// arriving while it is pending await the same run.
pub struct Memoized<C: Component> {
    component: C,
    cell: OnceCell<ComponentResult<C::Output>>,
}

impl<C: Component> Memoized<C> {
    /// Wraps a component into a shareable memoized node.
    pub fn new(component: C) -> Arc<Self> {
        Arc::new(Self {
            component,
            cell: OnceCell::new(),
        })
    }

    /// Returns the result, computing it if this is the first access.
    pub async fn result(&self) -> ComponentResult<C::Output> {
        self.cell
            .get_or_init(|| async {
                debug!(component = self.component.name(), "computing component result");
                let result = self.component.compute().await;
                if let Err(e) = &result {
                    debug!(component = self.component.name(), error = %e, "component failed");
                }
                result
            })
            .await
            .clone()
    }
}

#[async_trait]
impl<C: Component> ResultProvider<C::Output> for Memoized<C> {
    async fn result(&self) -> ComponentResult<C::Output> {
        Memoized::result(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingComponent {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Component for CountingComponent {
        type Output = u64;

        async fn compute(&self) -> ComponentResult<u64> {
            // Yield so concurrent accessors really overlap the pending state.
            tokio::time::sleep(Duration::from_millis(10)).await;
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Arc::new(ExploreError::insufficient_data("scripted")));
            }
            Ok(run as u64 + 41)
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_concurrent_access_computes_exactly_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = Memoized::new(CountingComponent {
            runs: runs.clone(),
            fail: false,
        });

        let accessors: Vec<_> = (0..16)
            .map(|_| {
                let node = node.clone();
                tokio::spawn(async move { node.result().await })
            })
            .collect();

        for accessor in accessors {
            assert_eq!(accessor.await.unwrap().unwrap(), 41);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Later accesses replay the cached result without recomputation.
        assert_eq!(node.result().await.unwrap(), 41);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_and_replayed() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = Memoized::new(CountingComponent {
            runs: runs.clone(),
            fail: true,
        });

        let first = node.result().await.unwrap_err();
        let second = node.result().await.unwrap_err();

        // Identical failure instance, not a retried computation.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shared_dependency_observed_through_provider() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = Memoized::new(CountingComponent {
            runs: runs.clone(),
            fail: false,
        });

        // Two dependents holding the same node: a diamond's two edges.
        let left: Arc<dyn ResultProvider<u64>> = node.clone();
        let right: Arc<dyn ResultProvider<u64>> = node.clone();

        let (a, b) = tokio::join!(left.result(), right.result());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
