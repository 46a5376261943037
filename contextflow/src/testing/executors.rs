//! Simple executors for exercising propagation in tests.

use parking_lot::Mutex;
use std::thread::JoinHandle;

use crate::propagation::Executor;

/// An [`Executor`] that runs every task on a freshly spawned thread.
///
/// Nothing pool-like about it, but a freshly spawned thread has
/// guaranteed-empty thread-local state, which is exactly what
/// propagation tests want to observe against.
#[derive(Default)]
pub struct ThreadPerTaskExecutor {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPerTaskExecutor {
    /// Creates a new executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for every submitted task to finish.
    ///
    /// # Panics
    ///
    /// Panics if any task panicked.
    pub fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                panic!("a submitted task panicked");
            }
        }
    }
}

impl Executor for ThreadPerTaskExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        let handle = std::thread::spawn(move || task());
        self.handles.lock().push(handle);
    }
}

impl std::fmt::Debug for ThreadPerTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPerTaskExecutor")
            .field("pending", &self.handles.lock().len())
            .finish()
    }
}
