//! The canonical stack-backed context manager.

use crate::scope::{ContextStack, ScopedContext};

use super::ContextManager;

/// A [`ContextManager`] backed by its own [`ContextStack`].
///
/// This is the canonical implementation: most context kinds are a
/// value plus thread-local LIFO activation semantics, which is
/// exactly what the stack provides. Integrations with their own
/// storage (an external MDC store, a tracing span scope) implement
/// [`ContextManager`] directly instead.
pub struct StackContextManager<T> {
    id: String,
    stack: ContextStack<T>,
}

impl<T> StackContextManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a manager with the given stable identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stack: ContextStack::new(),
        }
    }

    /// Returns the underlying stack.
    #[must_use]
    pub fn stack(&self) -> &ContextStack<T> {
        &self.stack
    }

    /// Activates `value` on the current thread.
    ///
    /// Typed convenience over [`ContextManager::activate`]; stack
    /// pushes cannot fail.
    pub fn activate_value(&self, value: T) -> ScopedContext {
        self.stack.push(Some(value))
    }

    /// Returns the value currently active on the calling thread.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.stack.current_value()
    }
}

impl<T> ContextManager for StackContextManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> &str {
        &self.id
    }

    fn activate(&self, value: Option<T>) -> anyhow::Result<ScopedContext> {
        Ok(self.stack.push(value))
    }

    fn active_value(&self) -> anyhow::Result<Option<T>> {
        Ok(self.stack.current_value())
    }

    fn clear(&self) {
        self.stack.clear();
    }
}

impl<T> std::fmt::Debug for StackContextManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackContextManager")
            .field("id", &self.id)
            .finish()
    }
}
