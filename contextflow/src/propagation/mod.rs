//! Context propagation around asynchronous task execution.
//!
//! This module provides:
//! - A unit-of-work wrapper that snapshots at submission time
//! - An executor decorator applying it to every submitted task
//! - A Tokio blocking-pool adapter

mod executor;
mod task;

pub use executor::{Executor, PropagatingExecutor, TokioBlockingExecutor};
pub use task::ContextualTask;
