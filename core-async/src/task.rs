//! Task spawning.
//!
//! [`spawn`] mirrors `tokio::task::spawn`. [`ScopedTask`] ties a spawned
//! task's lifetime to a value: dropping the handle aborts the task. State
//! machines that own a timer (crossfade, settle delays) store a `ScopedTask`
//! so that replacing the state retires the timer with it.

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

use std::future::Future;

/// Spawns a new asynchronous task on the current runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Handle to a spawned task that aborts the task when dropped.
#[derive(Debug)]
pub struct ScopedTask {
    handle: JoinHandle<()>,
}

impl ScopedTask {
    /// Spawns `future` and returns a handle scoped to the caller.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: spawn(future),
        }
    }

    /// Aborts the task now. Dropping the handle has the same effect.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns `true` once the task has completed or been aborted.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
