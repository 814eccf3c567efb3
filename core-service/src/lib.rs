//! Core service facade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (output channel, audio engine,
//! settings store, window visibility) and the host's library scanner into the
//! playback core. Desktop apps typically enable the `desktop-shims` feature,
//! which lets [`CoreConfig`](core_runtime::config::CoreConfig) fall back to
//! the JSON file settings store from `bridge-desktop`.
//!
//! ```ignore
//! use core_service::{CoreService, ServiceOptions};
//!
//! let config = CoreConfig::builder()
//!     .audio_output(output)
//!     .audio_engine(engine)
//!     .build()?;
//! let core = CoreService::bootstrap(config, scanner, covers, ServiceOptions::default()).await?;
//! core.start_library_poller().await;
//! ```

pub mod error;
pub mod service;

pub use error::{CoreError, Result};
pub use service::{CoreService, ServiceOptions};

pub use core_library as library;
pub use core_playback as playback;
pub use core_runtime as runtime;
