//! Per-context-type thread-local stacks of scoped contexts.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::scoped::{ContextValue, ScopeInner, ScopedContext};

// Raw stack heads for every live stack on this thread, keyed by the
// stack's instance id. A head, when present, may point at an
// already-closed scope; readers call `unwind` before trusting it.
thread_local! {
    static STACK_HEADS: RefCell<HashMap<u64, Arc<ScopeInner>>> = RefCell::new(HashMap::new());
}

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

/// Advances the head for `stack_id` past closed scopes to the nearest
/// open ancestor, clearing the slot when the chain is exhausted.
/// Returns the resulting head.
fn unwind(stack_id: u64) -> Option<Arc<ScopeInner>> {
    STACK_HEADS.with(|heads| {
        let mut heads = heads.borrow_mut();
        let mut current = heads.get(&stack_id).cloned();
        while let Some(scope) = &current {
            if !scope.is_closed() {
                break;
            }
            current = scope.parent.clone();
        }
        match &current {
            Some(scope) => {
                heads.insert(stack_id, Arc::clone(scope));
            }
            None => {
                heads.remove(&stack_id);
            }
        }
        current
    })
}

/// Unwinds the stack only if `scope` is its current raw head.
///
/// Called from [`ScopedContext::close`]. When the closed scope is not
/// the head (something newer is still open, or an earlier unwind
/// already advanced past it), the stack is left alone; its closed
/// flag makes the next unwind skip it.
pub(crate) fn unwind_if_head(stack_id: u64, scope: &Arc<ScopeInner>) {
    let is_head = STACK_HEADS.with(|heads| {
        heads
            .borrow()
            .get(&stack_id)
            .is_some_and(|head| Arc::ptr_eq(head, scope))
    });
    if is_head {
        unwind(stack_id);
    }
}

/// A thread-local stack of [`ScopedContext`]s for one context type.
///
/// Each concrete manager owns one instance; the stack itself is an
/// identity, and every thread that pushes onto it gets its own
/// independent chain of scopes. Out-of-order closes are tolerated:
/// closing an outer scope before an inner one is absorbed lazily by
/// the unwind step, which always recovers to the nearest still-open
/// ancestor.
pub struct ContextStack<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for ContextStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ContextStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new stack with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Pushes a new scope carrying `value` onto this thread's stack.
    ///
    /// The stack is unwound first, and the resulting head becomes the
    /// new scope's parent, so closing the returned scope restores
    /// whatever was active before this call.
    pub fn push(&self, value: Option<T>) -> ScopedContext {
        let parent = unwind(self.id);
        let value = value.map(|v| Arc::new(v) as ContextValue);
        let inner = Arc::new(ScopeInner::new(value, parent, Some(self.id)));
        STACK_HEADS.with(|heads| {
            heads.borrow_mut().insert(self.id, Arc::clone(&inner));
        });
        ScopedContext::from_inner(inner)
    }

    /// Returns the nearest open scope on this thread's stack, if any.
    #[must_use]
    pub fn current(&self) -> Option<ScopedContext> {
        unwind(self.id).map(ScopedContext::from_inner)
    }

    /// Returns the value of the nearest open scope, if any.
    #[must_use]
    pub fn current_value(&self) -> Option<T> {
        self.current().and_then(|scope| scope.value_as::<T>())
    }

    /// Drops this thread's stack state outright, without closing the
    /// scopes it references.
    ///
    /// Escape hatch for pool-boundary hygiene: a scope that was never
    /// closed would otherwise leave stale values behind when the
    /// thread is reused.
    pub fn clear(&self) {
        STACK_HEADS.with(|heads| {
            heads.borrow_mut().remove(&self.id);
        });
    }

    /// Returns the number of open scopes on this thread's stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = unwind(self.id);
        while let Some(scope) = current {
            if !scope.is_closed() {
                depth += 1;
            }
            current = scope.parent.clone();
        }
        depth
    }
}

impl<T> std::fmt::Debug for ContextStack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextStack").field("id", &self.id).finish()
    }
}
