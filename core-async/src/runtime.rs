//! Runtime helpers for synchronous callers.

pub use tokio::runtime::{Builder, Handle, Runtime};

use std::io;

/// Builds a current-thread runtime with timers and I/O enabled.
pub fn current_thread() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Runs the provided future to completion on a fresh current-thread runtime.
///
/// # Panics
///
/// Panics if the runtime cannot be built, which only happens when the OS
/// refuses to hand out the timer or I/O driver.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    match current_thread() {
        Ok(runtime) => runtime.block_on(future),
        Err(err) => panic!("core_async::runtime::block_on: failed to build runtime: {err}"),
    }
}
