//! The scoped context guard representing one activation.

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::stack;

/// A type-erased ambient value carried by a scope and by snapshots.
///
/// Typed layers downcast this back to the concrete value type.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// A hook invoked the first time a scope is closed.
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// Shared state of one activation.
///
/// Lives as long as a handle, a stack head, or a child's parent chain
/// still references it.
pub(crate) struct ScopeInner {
    /// The carried value, immutable once constructed.
    pub(crate) value: Option<ContextValue>,
    /// The scope that was active immediately before this one on the
    /// same thread, if any.
    pub(crate) parent: Option<Arc<ScopeInner>>,
    /// Open -> Closed is the only transition; terminal.
    pub(crate) closed: AtomicBool,
    /// Identity of the owning stack, if this scope was pushed onto one.
    pub(crate) stack_id: Option<u64>,
    /// Optional close hook, taken on first close.
    pub(crate) on_close: Mutex<Option<CloseHook>>,
}

impl ScopeInner {
    pub(crate) fn new(
        value: Option<ContextValue>,
        parent: Option<Arc<ScopeInner>>,
        stack_id: Option<u64>,
    ) -> Self {
        Self {
            value,
            parent,
            closed: AtomicBool::new(false),
            stack_id,
            on_close: Mutex::new(None),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A closeable guard representing one activation of a context value.
///
/// Handles are cheap to clone and share the same underlying state;
/// closing any handle closes the activation. A scope never re-opens,
/// and `close()` is idempotent, so try/finally-style cleanup may call
/// it any number of times.
///
/// There is intentionally no `Drop`-close: handles are shared (the
/// thread-local stack and child scopes keep references), so dropping
/// one handle must not end the activation.
#[derive(Clone)]
pub struct ScopedContext {
    inner: Arc<ScopeInner>,
}

impl ScopedContext {
    pub(crate) fn from_inner(inner: Arc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<ScopeInner> {
        &self.inner
    }

    /// Creates a scope that is not tracked by any stack.
    ///
    /// Intended for managers that keep no stack of their own and only
    /// need a closeable handle (typically paired with [`Self::on_close`]).
    #[must_use]
    pub fn detached(value: Option<ContextValue>) -> Self {
        Self {
            inner: Arc::new(ScopeInner::new(value, None, None)),
        }
    }

    /// Returns the value this activation carries, if any.
    #[must_use]
    pub fn value(&self) -> Option<ContextValue> {
        self.inner.value.clone()
    }

    /// Returns the carried value downcast to `T`.
    #[must_use]
    pub fn value_as<T: Clone + 'static>(&self) -> Option<T> {
        self.inner
            .value
            .as_ref()
            .and_then(|v| v.downcast_ref::<T>().cloned())
    }

    /// Returns whether this scope has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Registers a hook to run the first time this scope closes.
    ///
    /// If the scope is already closed, the hook runs immediately.
    /// At most one hook is kept; a later registration replaces an
    /// earlier unfired one.
    pub fn on_close<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The flag is re-read under the lock so a close racing on
        // another handle either runs the stored hook itself or is
        // already done, in which case the hook runs here.
        let mut slot = self.inner.on_close.lock();
        if self.is_closed() {
            drop(slot);
            hook();
        } else {
            *slot = Some(Box::new(hook));
        }
    }

    /// Closes this scope.
    ///
    /// Idempotent: only the first call has any effect. If this scope
    /// is currently the raw head of its stack, the stack unwinds to
    /// the nearest still-open ancestor. If it is not the head, the
    /// closed flag alone is recorded and the next unwind (triggered
    /// by any read or any other close) skips past it.
    ///
    /// Must be called on the thread that activated the scope.
    pub fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(stack_id) = self.inner.stack_id {
                stack::unwind_if_head(stack_id, &self.inner);
            }
            let hook = self.inner.on_close.lock().take();
            if let Some(hook) = hook {
                hook();
            }
        }
    }
}

impl std::fmt::Debug for ScopedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedContext")
            .field("closed", &self.is_closed())
            .field("has_value", &self.inner.value.is_some())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
