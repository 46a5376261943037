//! The process-wide registry of context managers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use super::{DiscoveryScope, ErasedContextManager};

#[derive(Default)]
struct ScopeState {
    /// Managers in discovery-then-registration order. The order is
    /// load-bearing: it drives capture order, and through it
    /// reactivation and close order.
    managers: Vec<Arc<dyn ErasedContextManager>>,
    discovered: bool,
}

impl ScopeState {
    fn push_dedup(&mut self, manager: Arc<dyn ErasedContextManager>) {
        if self.managers.iter().any(|m| m.id() == manager.id()) {
            return;
        }
        self.managers.push(manager);
    }
}

/// Registry of [`ErasedContextManager`]s, keyed by discovery scope.
///
/// Reads hand out a cloned manager list, so iteration is never
/// blocked by (rare) registration or discovery events. Discovery runs
/// lazily, once per scope, and its result is cached; switching the
/// active scope switches cache entries without discarding either.
pub struct ManagerRegistry {
    default_scope: DiscoveryScope,
    active_scope: RwLock<DiscoveryScope>,
    scopes: RwLock<HashMap<u64, ScopeState>>,
}

impl ManagerRegistry {
    /// Creates a registry whose default scope has no providers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_scope(DiscoveryScope::new())
    }

    /// Creates a registry with the given default discovery scope.
    #[must_use]
    pub fn with_default_scope(scope: DiscoveryScope) -> Self {
        Self {
            default_scope: scope.clone(),
            active_scope: RwLock::new(scope),
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a manager in the active scope.
    ///
    /// Idempotent by manager identity: a manager whose `id()` is
    /// already present is ignored.
    pub fn register(&self, manager: Arc<dyn ErasedContextManager>) {
        let scope = self.active_scope.read().clone();
        self.ensure_discovered(&scope);
        let mut scopes = self.scopes.write();
        scopes.entry(scope.id()).or_default().push_dedup(manager);
    }

    /// Returns every registered manager, in stable order.
    ///
    /// Runs discovery for the active scope if it has not run yet.
    /// Zero managers is a valid outcome.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<dyn ErasedContextManager>> {
        let scope = self.active_scope.read().clone();
        self.ensure_discovered(&scope);
        let scopes = self.scopes.read();
        scopes
            .get(&scope.id())
            .map(|state| state.managers.clone())
            .unwrap_or_default()
    }

    /// Returns the number of managers in the active scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.all().len()
    }

    /// Returns whether the active scope has no managers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Overrides where providers are discovered from.
    ///
    /// `None` restores the default scope. Each scope keeps its own
    /// cached discovery result and registrations, so an override
    /// never leaks managers into the default scope or vice versa.
    pub fn set_discovery_scope(&self, scope: Option<DiscoveryScope>) {
        *self.active_scope.write() = scope.unwrap_or_else(|| self.default_scope.clone());
    }

    /// Calls `clear()` on every manager in the active scope.
    ///
    /// A panicking manager is logged and does not stop the sweep.
    /// Intended for returning a thread to a pool in a clean state.
    pub fn clear_all(&self) {
        for manager in self.all() {
            if catch_unwind(AssertUnwindSafe(|| manager.clear_erased())).is_err() {
                warn!(manager = manager.id(), "context manager panicked during clear");
            }
        }
    }

    /// Drops all cached scopes and restores the default scope.
    ///
    /// Test hook; production code has no reason to call this.
    pub fn reset(&self) {
        self.scopes.write().clear();
        *self.active_scope.write() = self.default_scope.clone();
    }

    fn ensure_discovered(&self, scope: &DiscoveryScope) {
        {
            let scopes = self.scopes.read();
            if scopes.get(&scope.id()).is_some_and(|s| s.discovered) {
                return;
            }
        }

        let mut scopes = self.scopes.write();
        let state = scopes.entry(scope.id()).or_default();
        if state.discovered {
            return;
        }
        state.discovered = true;

        for provider in scope.providers() {
            match catch_unwind(AssertUnwindSafe(|| provider.discover())) {
                Ok(Ok(managers)) => {
                    for manager in managers {
                        state.push_dedup(manager);
                    }
                }
                Ok(Err(error)) => {
                    warn!(
                        provider = provider.name(),
                        error = %error,
                        "context manager provider failed; skipping"
                    );
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        "context manager provider panicked; skipping"
                    );
                }
            }
        }
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("active_scope", &*self.active_scope.read())
            .field("manager_count", &self.len())
            .finish()
    }
}

// Global registry
static GLOBAL_REGISTRY: RwLock<Option<Arc<ManagerRegistry>>> = RwLock::new(None);

/// Gets the process-wide manager registry, creating it on first use.
pub fn global_registry() -> Arc<ManagerRegistry> {
    let read = GLOBAL_REGISTRY.read();
    if let Some(ref registry) = *read {
        return registry.clone();
    }
    drop(read);

    let mut write = GLOBAL_REGISTRY.write();
    write
        .get_or_insert_with(|| Arc::new(ManagerRegistry::new()))
        .clone()
}

/// Replaces the process-wide registry (test isolation hook).
pub fn reset_global_registry() {
    *GLOBAL_REGISTRY.write() = None;
}

/// Registers a manager in the process-wide registry.
pub fn register_manager(manager: Arc<dyn ErasedContextManager>) {
    global_registry().register(manager);
}

/// Clears every manager in the process-wide registry, tolerating
/// individual failures.
pub fn clear_all() {
    global_registry().clear_all();
}
