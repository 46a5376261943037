//! Test support: misbehaving managers and simple executors.
//!
//! These types exercise the failure-isolation paths of the snapshot
//! protocol and give tests a pool-like executor without depending on
//! a real scheduler. They are ordinary public types so downstream
//! crates can reuse them in their own tests.

mod executors;
mod mocks;

pub use executors::ThreadPerTaskExecutor;
pub use mocks::FlakyManager;

/// Installs a compact tracing subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
