//! Context manager capability contract, registry, and discovery.
//!
//! This module provides:
//! - The typed [`ContextManager`] trait integrations implement
//! - An object-safe erased form stored by the registry and snapshots
//! - The canonical stack-backed manager
//! - Pluggable, per-scope-cached provider discovery

mod contract;
mod discovery;
mod registry;
mod stacked;

pub use contract::{ContextManager, ErasedContextManager};
pub use discovery::{DiscoveryProvider, DiscoveryScope, StaticDiscovery};
pub use registry::{
    clear_all, global_registry, register_manager, reset_global_registry, ManagerRegistry,
};
pub use stacked::StackContextManager;
