//! The context manager capability contract.

use std::sync::Arc;

use crate::errors::ContextError;
use crate::scope::{ContextValue, ScopedContext};

/// A capability provider for one kind of ambient value (a locale, a
/// security principal, a trace span, log-correlation fields, ...).
///
/// Implementations are constructed once, live for the process
/// lifetime, and are looked up through the registry. `id()` must be
/// stable and unique per manager: it is the de-duplication key for
/// registration and names the manager in logs and errors.
pub trait ContextManager: Send + Sync + 'static {
    /// The concrete value type this manager carries.
    type Value: Clone + Send + Sync + 'static;

    /// Stable identity of this manager.
    fn id(&self) -> &str;

    /// Activates `value` on the current thread, returning a guard
    /// that deactivates it when closed. `None` activates an explicit
    /// "nothing" (a captured absence still shadows whatever was
    /// active before).
    fn activate(&self, value: Option<Self::Value>) -> anyhow::Result<ScopedContext>;

    /// Returns the value currently active on the calling thread.
    fn active_value(&self) -> anyhow::Result<Option<Self::Value>>;

    /// Best-effort reset of this manager's state on the calling
    /// thread. Not required to be equivalent to closing every open
    /// scope; managers that track no per-thread state may leave this
    /// as the default no-op. Intended for returning a pooled thread
    /// in a clean state.
    fn clear(&self) {}
}

/// Object-safe form of [`ContextManager`] moving type-erased values.
///
/// This is what the registry and snapshots store. Every
/// [`ContextManager`] gets it through a blanket implementation;
/// integrations never implement it directly.
pub trait ErasedContextManager: Send + Sync {
    /// Stable identity of this manager.
    fn id(&self) -> &str;

    /// Activates an erased captured value, downcasting it first.
    ///
    /// # Errors
    ///
    /// [`ContextError::ValueType`] if the value does not downcast to
    /// the manager's value type, [`ContextError::Activation`] if the
    /// manager itself fails.
    fn activate_erased(&self, value: Option<ContextValue>) -> Result<ScopedContext, ContextError>;

    /// Captures the currently active value in erased form.
    fn active_value_erased(&self) -> anyhow::Result<Option<ContextValue>>;

    /// Best-effort reset, see [`ContextManager::clear`].
    fn clear_erased(&self);
}

impl<M: ContextManager> ErasedContextManager for M {
    fn id(&self) -> &str {
        ContextManager::id(self)
    }

    fn activate_erased(&self, value: Option<ContextValue>) -> Result<ScopedContext, ContextError> {
        let typed = match value {
            Some(erased) => Some(erased.downcast_ref::<M::Value>().cloned().ok_or_else(|| {
                ContextError::ValueType {
                    manager: ContextManager::id(self).to_string(),
                }
            })?),
            None => None,
        };
        self.activate(typed).map_err(|source| ContextError::Activation {
            manager: ContextManager::id(self).to_string(),
            source,
        })
    }

    fn active_value_erased(&self) -> anyhow::Result<Option<ContextValue>> {
        Ok(self
            .active_value()?
            .map(|v| Arc::new(v) as ContextValue))
    }

    fn clear_erased(&self) {
        self.clear();
    }
}
