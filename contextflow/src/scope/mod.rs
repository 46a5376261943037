//! Scoped context guards and per-type thread-local stacks.
//!
//! This module provides:
//! - Closeable guards representing one activation of a value
//! - Thread-local stacks with unwind-past-closed-scopes recovery

mod scoped;
#[cfg(test)]
mod scope_tests;
mod stack;

pub use scoped::{CloseHook, ContextValue, ScopedContext};
pub use stack::ContextStack;
