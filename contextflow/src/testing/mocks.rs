//! Misbehaving context managers for failure-path tests.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::manager::ContextManager;
use crate::scope::{ContextStack, ScopedContext};

/// A stack-backed manager whose failure modes can be toggled at
/// runtime.
///
/// Each toggle affects the corresponding operation from the moment it
/// is set: `fail_capture` makes `active_value()` return an error,
/// `fail_activate`/`panic_on_activate` break `activate()`, and
/// `panic_on_close` attaches a panicking close hook to every scope
/// activated while it is on.
pub struct FlakyManager {
    id: String,
    stack: ContextStack<String>,
    fail_capture: AtomicBool,
    fail_activate: AtomicBool,
    panic_on_activate: AtomicBool,
    panic_on_close: AtomicBool,
    panic_on_clear: AtomicBool,
}

impl FlakyManager {
    /// Creates a well-behaved manager; flip toggles to break it.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stack: ContextStack::new(),
            fail_capture: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
            panic_on_activate: AtomicBool::new(false),
            panic_on_close: AtomicBool::new(false),
            panic_on_clear: AtomicBool::new(false),
        }
    }

    /// Makes `active_value()` fail.
    pub fn fail_capture(&self, on: bool) {
        self.fail_capture.store(on, Ordering::SeqCst);
    }

    /// Makes `activate()` return an error.
    pub fn fail_activate(&self, on: bool) {
        self.fail_activate.store(on, Ordering::SeqCst);
    }

    /// Makes `activate()` panic instead of returning.
    pub fn panic_on_activate(&self, on: bool) {
        self.panic_on_activate.store(on, Ordering::SeqCst);
    }

    /// Makes scopes activated from now on panic when closed.
    pub fn panic_on_close(&self, on: bool) {
        self.panic_on_close.store(on, Ordering::SeqCst);
    }

    /// Makes `clear()` panic.
    pub fn panic_on_clear(&self, on: bool) {
        self.panic_on_clear.store(on, Ordering::SeqCst);
    }
}

impl ContextManager for FlakyManager {
    type Value = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn activate(&self, value: Option<String>) -> anyhow::Result<ScopedContext> {
        if self.fail_activate.load(Ordering::SeqCst) {
            anyhow::bail!("injected activation failure");
        }
        assert!(
            !self.panic_on_activate.load(Ordering::SeqCst),
            "injected activation panic"
        );
        let scope = self.stack.push(value);
        if self.panic_on_close.load(Ordering::SeqCst) {
            scope.on_close(|| panic!("injected close failure"));
        }
        Ok(scope)
    }

    fn active_value(&self) -> anyhow::Result<Option<String>> {
        if self.fail_capture.load(Ordering::SeqCst) {
            anyhow::bail!("injected capture failure");
        }
        Ok(self.stack.current_value())
    }

    fn clear(&self) {
        assert!(
            !self.panic_on_clear.load(Ordering::SeqCst),
            "injected clear panic"
        );
        self.stack.clear();
    }
}

impl std::fmt::Debug for FlakyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyManager").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_behaved_by_default() {
        let manager = FlakyManager::new("flaky");
        let scope = manager.activate(Some("x".to_string())).unwrap();
        assert_eq!(manager.active_value().unwrap(), Some("x".to_string()));
        scope.close();
        assert_eq!(manager.active_value().unwrap(), None);
    }

    #[test]
    fn test_capture_toggle() {
        let manager = FlakyManager::new("flaky");
        manager.fail_capture(true);
        assert!(manager.active_value().is_err());

        manager.fail_capture(false);
        assert!(manager.active_value().is_ok());
    }

    #[test]
    fn test_close_toggle_only_affects_new_scopes() {
        let manager = FlakyManager::new("flaky");
        let quiet = manager.activate(Some("a".to_string())).unwrap();

        manager.panic_on_close(true);
        let noisy = manager.activate(Some("b".to_string())).unwrap();

        let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| noisy.close()));
        assert!(panicked.is_err());

        // The scope activated before the toggle closes cleanly.
        quiet.close();
    }
}
