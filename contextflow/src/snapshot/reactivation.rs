//! The live result of applying a snapshot to a thread.

use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use uuid::Uuid;

use crate::errors::{CloseReport, ContextError};
use crate::scope::ScopedContext;

use super::panic_message;

/// The scopes created by re-applying a [`ContextSnapshot`] on the
/// current thread.
///
/// Single-use and single-thread: the type is `!Send`, so it must be
/// closed on the thread that created it. Closing undoes the scopes in
/// reverse activation order; if the owner forgets, `Drop` closes them
/// and logs.
///
/// [`ContextSnapshot`]: super::ContextSnapshot
pub struct Reactivation {
    snapshot_id: Uuid,
    scopes: Vec<(String, ScopedContext)>,
    closed: AtomicBool,
    // Reactivations are bound to their creating thread.
    _not_send: PhantomData<*const ()>,
}

impl Reactivation {
    pub(crate) fn new(snapshot_id: Uuid, scopes: Vec<(String, ScopedContext)>) -> Self {
        Self {
            snapshot_id,
            scopes,
            closed: AtomicBool::new(false),
            _not_send: PhantomData,
        }
    }

    /// Identity of the snapshot this reactivation came from.
    #[must_use]
    pub fn snapshot_id(&self) -> Uuid {
        self.snapshot_id
    }

    /// Number of scopes this reactivation created.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Returns whether this reactivation has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes the created scopes in reverse activation order.
    ///
    /// Idempotent: a second call is a no-op returning `Ok`. A scope
    /// whose close panics is logged and does not prevent closing the
    /// remaining scopes; the first failure is what this returns.
    ///
    /// # Errors
    ///
    /// [`ContextError::Close`] reporting the failures, if any scope
    /// failed to close.
    pub fn close(&self) -> Result<(), ContextError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let total = self.scopes.len();
        let mut report: Option<CloseReport> = None;

        for (manager, scope) in self.scopes.iter().rev() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| scope.close())) {
                let message = panic_message(payload.as_ref());
                warn!(
                    manager = %manager,
                    message = %message,
                    "scope close failed while closing a reactivation"
                );
                match report.as_mut() {
                    Some(report) => report.record(manager.clone()),
                    None => report = Some(CloseReport::new(total, manager.clone(), message)),
                }
            }
        }

        match report {
            Some(report) => Err(ContextError::Close(report)),
            None => Ok(()),
        }
    }
}

impl Drop for Reactivation {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(
                snapshot_id = %self.snapshot_id,
                "reactivation dropped without being closed; closing now"
            );
            if let Err(error) = self.close() {
                warn!(error = %error, "close during drop reported failures");
            }
        }
    }
}

impl std::fmt::Debug for Reactivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactivation")
            .field("snapshot_id", &self.snapshot_id)
            .field("scope_count", &self.scope_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ContextManager, ManagerRegistry, StackContextManager};
    use crate::snapshot::ContextSnapshot;
    use crate::testing::FlakyManager;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_close_is_idempotent() {
        // P3, reactivation half.
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        registry.register(locale.clone());

        let scope = locale.activate_value("en".to_string());
        let snapshot = ContextSnapshot::capture_with(&registry);
        scope.close();

        let reactivation = snapshot.reactivate().unwrap();
        reactivation.close().unwrap();
        reactivation.close().unwrap();
        assert!(reactivation.is_closed());
        assert_eq!(locale.current(), None);
    }

    #[test]
    fn test_scopes_close_in_reverse_order() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        let tenant = Arc::new(StackContextManager::<u64>::new("tenant"));
        registry.register(locale.clone());
        registry.register(tenant.clone());

        let l = locale.activate_value("en".to_string());
        let t = tenant.activate_value(7);
        let snapshot = ContextSnapshot::capture_with(&registry);
        t.close();
        l.close();

        let reactivation = snapshot.reactivate().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (name, scope) in &reactivation.scopes {
            let name = name.clone();
            let order = order.clone();
            scope.on_close(move || order.lock().push(name));
        }

        reactivation.close().unwrap();
        assert_eq!(*order.lock(), vec!["tenant".to_string(), "locale".to_string()]);
    }

    #[test]
    fn test_close_failure_is_collected_and_sweep_continues() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        let flaky = Arc::new(FlakyManager::new("flaky"));
        registry.register(locale.clone());
        registry.register(flaky.clone());

        let f = flaky.activate(Some("x".to_string())).unwrap();
        let snapshot = ContextSnapshot::capture_with(&registry);
        f.close();

        flaky.panic_on_close(true);
        let reactivation = snapshot.reactivate().unwrap();
        let err = reactivation.close().unwrap_err();

        let ContextError::Close(report) = err else {
            panic!("expected a close report");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.total, 2);
        assert_eq!(report.first_manager, "flaky");
        // The locale scope was still closed despite the earlier panic.
        assert_eq!(locale.current(), None);
    }

    #[test]
    fn test_drop_closes_unclosed_reactivation() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("locale"));
        registry.register(locale.clone());

        let scope = locale.activate_value("en".to_string());
        let snapshot = ContextSnapshot::capture_with(&registry);
        scope.close();

        {
            let _reactivation = snapshot.reactivate().unwrap();
            assert_eq!(locale.current(), Some("en".to_string()));
        }
        assert_eq!(locale.current(), None);
    }
}
