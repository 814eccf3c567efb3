//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host but cannot provide on
//! its own.
//!
//! ## Overview
//!
//! The core decides what plays, when transitions happen and how audio is
//! routed. Everything that touches a device, a window or the disk sits behind
//! one of the traits below, so the core can be driven by a desktop shell, a
//! headless test harness, or anything in between.
//!
//! ## Traits
//!
//! ### Audio
//! - [`AudioOutput`](audio::AudioOutput) - The single output channel: load, play, pause, seek, volume
//! - [`AudioEngine`](audio::AudioEngine) - The host audio context that may be suspended or closed
//! - [`SampleProcessor`](audio::SampleProcessor) - PCM stage the engine runs output through when attached
//!
//! ### Persistence
//! - [`ConfigStore`](storage::ConfigStore) - Whole-blob read/write of the persisted settings document
//!
//! ### Platform Integration
//! - [`VisibilityMonitor`](visibility::VisibilityMonitor) - Whether the player window is currently visible
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Wall-clock source for cache expiry
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should map host failures onto it with a message that names the operation.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! between the engine task, timer tasks and the audio thread.

pub mod audio;
pub mod error;
pub mod logging;
pub mod storage;
pub mod time;
pub mod visibility;

pub use error::BridgeError;

pub use audio::{AudioEngine, AudioOutput, EngineState, MediaSource, SampleProcessor};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use storage::ConfigStore;
pub use time::{Clock, SystemClock};
pub use visibility::{VisibilityMonitor, WindowVisibility};
