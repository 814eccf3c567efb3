//! Async synchronization primitives.
//!
//! The playback engine is owned by a single async [`Mutex`]; timer tasks talk
//! back to it over [`mpsc`] channels. Short, non-async critical sections
//! elsewhere in the workspace use `parking_lot` instead.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    RwLockReadGuard, RwLockWriteGuard,
};
