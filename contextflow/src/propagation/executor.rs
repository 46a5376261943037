//! Executor abstraction and the context-propagating decorator.

use std::sync::Arc;
use tracing::warn;

use crate::manager::{global_registry, ManagerRegistry};
use crate::snapshot::ContextSnapshot;

use super::ContextualTask;

/// A minimal executor-like facility: something that runs boxed units
/// of work, typically on other threads.
///
/// This crate never owns a scheduler; it decorates work handed to an
/// externally supplied pool.
pub trait Executor: Send + Sync {
    /// Submits a unit of work for execution.
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

/// Decorates an [`Executor`] so every submitted task carries the
/// submitting thread's context.
///
/// At submission time a snapshot is captured; when the task runs
/// (on whatever thread the inner executor picks) the snapshot is
/// reactivated around the work and unconditionally released after.
/// Propagation failures around a fire-and-forget task have no caller
/// to report to, so they are logged.
pub struct PropagatingExecutor<E> {
    inner: E,
    registry: Arc<ManagerRegistry>,
}

impl<E: Executor> PropagatingExecutor<E> {
    /// Wraps the given executor, capturing from the process-wide
    /// registry.
    #[must_use]
    pub fn new(inner: E) -> Self {
        Self::with_registry(inner, global_registry())
    }

    /// Wraps the given executor with an explicit registry to capture
    /// from.
    #[must_use]
    pub fn with_registry(inner: E, registry: Arc<ManagerRegistry>) -> Self {
        Self { inner, registry }
    }

    /// Returns the wrapped executor.
    #[must_use]
    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Executor> Executor for PropagatingExecutor<E> {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        let snapshot = ContextSnapshot::capture_with(&self.registry);
        let contextual = ContextualTask::with_snapshot(snapshot, task);
        self.inner.execute(Box::new(move || {
            let snapshot_id = contextual.snapshot().id();
            if let Err(error) = contextual.run() {
                warn!(
                    snapshot_id = %snapshot_id,
                    error = %error,
                    "context propagation failed around submitted task"
                );
            }
        }));
    }
}

impl<E: std::fmt::Debug> std::fmt::Debug for PropagatingExecutor<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropagatingExecutor")
            .field("inner", &self.inner)
            .finish()
    }
}

/// An [`Executor`] that hands work to Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioBlockingExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioBlockingExecutor {
    /// Creates an executor over the given runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Creates an executor over the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, as
    /// [`tokio::runtime::Handle::current`] does.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Executor for TokioBlockingExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(task);
    }
}
