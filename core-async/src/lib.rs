//! Async runtime facade for the Cadence playback core.
//!
//! Every `core-*` crate spawns tasks, sleeps and locks through this crate
//! instead of naming tokio directly, so the executor can be swapped in one
//! place.
//!
//! # Modules
//!
//! - `task`: task spawning plus [`task::ScopedTask`], a handle that aborts its
//!   task when dropped
//! - `time`: sleeps, intervals and instants
//! - `sync`: async mutexes and channels
//! - `runtime`: blocking entry point for synchronous callers
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! # core_async::runtime::block_on(async {
//! let handle = task::spawn(async {
//!     sleep(Duration::from_millis(1)).await;
//!     42
//! });
//! assert_eq!(handle.await.unwrap(), 42);
//! # });
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
