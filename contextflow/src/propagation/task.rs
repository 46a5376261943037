//! The context-propagating unit of work.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use tracing::warn;

use crate::errors::ContextError;
use crate::snapshot::ContextSnapshot;

/// A unit of work bundled with the context snapshot of the thread
/// that created it.
///
/// The snapshot is captured at construction time (i.e. when the work
/// is scheduled), not when it runs, so the executing thread sees
/// whatever was ambient at the submission point. Construction is
/// reentrant: nested submissions each capture their own snapshot.
pub struct ContextualTask<F> {
    snapshot: ContextSnapshot,
    work: F,
}

impl<F, R> ContextualTask<F>
where
    F: FnOnce() -> R,
{
    /// Wraps `work`, capturing the calling thread's context from the
    /// process-wide registry.
    #[must_use]
    pub fn new(work: F) -> Self {
        Self {
            snapshot: ContextSnapshot::capture(),
            work,
        }
    }

    /// Wraps `work` with an explicit, pre-captured snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: ContextSnapshot, work: F) -> Self {
        Self { snapshot, work }
    }

    /// The snapshot this task will reactivate around the work.
    #[must_use]
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// Reactivates the snapshot, runs the work, and unconditionally
    /// closes the reactivation.
    ///
    /// If the work panics, the reactivation is still closed and the
    /// panic resumes; a close failure in that case is logged rather
    /// than masking the panic. If the work completes and the close
    /// fails, the close failure is what the caller observes.
    ///
    /// # Errors
    ///
    /// Reactivation or close failures, per [`ContextError`]. If
    /// reactivation fails the work never runs.
    pub fn run(self) -> Result<R, ContextError> {
        let Self { snapshot, work } = self;
        let reactivation = snapshot.reactivate()?;

        let outcome = catch_unwind(AssertUnwindSafe(work));
        let close_result = reactivation.close();

        match outcome {
            Ok(value) => {
                close_result?;
                Ok(value)
            }
            Err(payload) => {
                if let Err(error) = close_result {
                    warn!(
                        snapshot_id = %snapshot.id(),
                        error = %error,
                        "reactivation close failed after task panic"
                    );
                }
                resume_unwind(payload)
            }
        }
    }
}

impl<F> std::fmt::Debug for ContextualTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextualTask")
            .field("snapshot_id", &self.snapshot.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ManagerRegistry, StackContextManager};
    use crate::testing::FlakyManager;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_run_applies_snapshot_around_work() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        registry.register(locale.clone());

        let scope = locale.activate_value("en".to_string());
        let snapshot = ContextSnapshot::capture_with(&registry);
        scope.close();

        let observer = locale.clone();
        let task = ContextualTask::with_snapshot(snapshot, move || observer.current());
        let seen = task.run().unwrap();

        assert_eq!(seen, Some("en".to_string()));
        assert_eq!(locale.current(), None);
    }

    #[test]
    fn test_panicking_work_still_closes() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        registry.register(locale.clone());

        let scope = locale.activate_value("en".to_string());
        let snapshot = ContextSnapshot::capture_with(&registry);
        scope.close();

        let task = ContextualTask::with_snapshot(snapshot, || panic!("work blew up"));
        let outcome = catch_unwind(AssertUnwindSafe(|| task.run()));

        assert!(outcome.is_err());
        assert_eq!(locale.current(), None);
    }

    #[test]
    fn test_close_failure_surfaces_when_work_succeeds() {
        let registry = ManagerRegistry::new();
        let flaky = Arc::new(FlakyManager::new("flaky"));
        registry.register(flaky.clone());

        let snapshot = ContextSnapshot::capture_with(&registry);
        flaky.panic_on_close(true);

        let task = ContextualTask::with_snapshot(snapshot, || 42);
        let err = task.run().unwrap_err();
        assert!(matches!(err, ContextError::Close(_)));
    }

    #[test]
    fn test_reactivation_failure_prevents_work() {
        let registry = ManagerRegistry::new();
        let flaky = Arc::new(FlakyManager::new("flaky"));
        registry.register(flaky.clone());

        let snapshot = ContextSnapshot::capture_with(&registry);
        flaky.fail_activate(true);

        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        let task = ContextualTask::with_snapshot(snapshot, move || {
            ran_clone.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(task.run().is_err());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
