//! Workspace facade crate.
//!
//! Host applications depend on `cadence-workspace` and pick a feature instead
//! of wiring each crate by hand:
//!
//! - `desktop-shims` (default): the full [`core_service::CoreService`] with
//!   desktop bridge defaults.
//! - `engine-only`: just the playback engine and library reconciler, for hosts
//!   that drive the timer loop themselves.
//! - `local-scanner`: the filesystem scanner for local music folders.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(any(feature = "engine-only", feature = "local-scanner"))]
pub use core_library as library;

#[cfg(feature = "engine-only")]
pub use core_playback as playback;
