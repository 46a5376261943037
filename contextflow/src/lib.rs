//! # Contextflow
//!
//! Thread-local ambient context, captured once and re-applied
//! anywhere.
//!
//! Independent context sources (trace spans, locale, security
//! principal, log-correlation fields) register a [`ContextManager`]
//! once; any caller can then capture everything currently active as a
//! single portable [`ContextSnapshot`] and later reactivate it on a
//! different thread, e.g. inside a worker-pool task. Contextflow
//! provides:
//!
//! - **Scoped activation**: per-context-type thread-local stacks of
//!   closeable guards, tolerant of idempotent and out-of-order closes
//! - **Pluggable managers**: a capability trait with registry-based
//!   discovery and per-scope caching
//! - **Snapshot/reactivate**: atomic-in-effect capture across all
//!   managers, reverse-order undo, and rollback on partial failure
//! - **Executor decoration**: transparent propagation around work
//!   submitted to any external thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use contextflow::prelude::*;
//! use std::sync::Arc;
//!
//! // One manager per kind of ambient value, registered once.
//! let registry = ManagerRegistry::new();
//! let locale = Arc::new(StackContextManager::<String>::new("locale"));
//! registry.register(locale.clone());
//!
//! // Activate a value, capture everything, shadow it, reactivate.
//! let scope = locale.activate_value("en".to_string());
//! let snapshot = ContextSnapshot::capture_with(&registry);
//!
//! let shadow = locale.activate_value("de".to_string());
//! let reactivation = snapshot.reactivate()?;
//! assert_eq!(locale.current(), Some("en".to_string()));
//!
//! reactivation.close()?;
//! assert_eq!(locale.current(), Some("de".to_string()));
//!
//! shadow.close();
//! scope.close();
//! # Ok::<(), contextflow::ContextError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod errors;
pub mod manager;
pub mod propagation;
pub mod scope;
pub mod snapshot;
pub mod testing;

pub use errors::ContextError;
pub use manager::ContextManager;
pub use scope::ScopedContext;
pub use snapshot::ContextSnapshot;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::{CloseReport, ContextError};
    pub use crate::manager::{
        clear_all, global_registry, register_manager, ContextManager, DiscoveryProvider,
        DiscoveryScope, ErasedContextManager, ManagerRegistry, StackContextManager,
        StaticDiscovery,
    };
    pub use crate::propagation::{
        ContextualTask, Executor, PropagatingExecutor, TokioBlockingExecutor,
    };
    pub use crate::scope::{ContextStack, ContextValue, ScopedContext};
    pub use crate::snapshot::{ContextSnapshot, Reactivation};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn library_end_to_end() {
        let registry = ManagerRegistry::new();
        let locale = Arc::new(StackContextManager::<String>::new("e2e-locale"));
        registry.register(locale.clone());

        let scope = locale.activate_value("en".to_string());
        let snapshot = ContextSnapshot::capture_with(&registry);
        scope.close();

        let reactivation = snapshot.reactivate().unwrap();
        assert_eq!(locale.current(), Some("en".to_string()));
        reactivation.close().unwrap();
        assert_eq!(locale.current(), None);
    }
}
