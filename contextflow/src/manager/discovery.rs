//! Pluggable discovery of context manager providers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ErasedContextManager;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// A source of context managers, injected at process start.
///
/// A provider typically represents one plugin or integration bundle.
/// Discovery may legitimately find zero managers; a provider that
/// fails (or panics) is logged and skipped without affecting other
/// providers.
///
/// Providers must not call back into the registry that is running
/// them; discovery holds the registry's write lock.
pub trait DiscoveryProvider: Send + Sync {
    /// Name used in logs when the provider is skipped.
    fn name(&self) -> &str;

    /// Constructs the managers this provider contributes, in the
    /// order they should be registered.
    fn discover(&self) -> anyhow::Result<Vec<Arc<dyn ErasedContextManager>>>;
}

/// A provider that hands out a fixed set of managers.
///
/// Useful for wiring managers at startup and as a fixture in tests.
pub struct StaticDiscovery {
    name: String,
    managers: Vec<Arc<dyn ErasedContextManager>>,
}

impl StaticDiscovery {
    /// Creates a provider with no managers.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managers: Vec::new(),
        }
    }

    /// Adds a manager to the provided set.
    #[must_use]
    pub fn with_manager(mut self, manager: Arc<dyn ErasedContextManager>) -> Self {
        self.managers.push(manager);
        self
    }
}

impl DiscoveryProvider for StaticDiscovery {
    fn name(&self) -> &str {
        &self.name
    }

    fn discover(&self) -> anyhow::Result<Vec<Arc<dyn ErasedContextManager>>> {
        Ok(self.managers.clone())
    }
}

/// A provider-lookup context: an ordered list of providers with its
/// own identity.
///
/// The registry caches discovery results per scope, so overriding the
/// scope (primarily for test isolation) and later restoring the
/// default never mixes the two provider sets. Clones share the same
/// identity and therefore the same cache entry.
#[derive(Clone)]
pub struct DiscoveryScope {
    id: u64,
    providers: Vec<Arc<dyn DiscoveryProvider>>,
}

impl DiscoveryScope {
    /// Creates an empty scope with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            providers: Vec::new(),
        }
    }

    /// Adds a provider to this scope.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn DiscoveryProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// The scope's identity (the discovery-cache key).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The scope's providers, in discovery order.
    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn DiscoveryProvider>] {
        &self.providers
    }
}

impl Default for DiscoveryScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiscoveryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryScope")
            .field("id", &self.id)
            .field("provider_count", &self.providers.len())
            .finish()
    }
}
