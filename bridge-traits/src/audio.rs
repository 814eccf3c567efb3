//! Audio output bridge traits.
//!
//! The core drives exactly one output channel. Track transitions, fades and
//! volume changes all land on that channel or, when the processing graph is
//! active, on the graph's master gain. The host owns decoding and the device;
//! the core only issues commands.

use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What the output channel should load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// File on the local filesystem.
    LocalFile { path: PathBuf },
    /// Remote stream fetched by the host. Hosts must request it with CORS
    /// enabled so the processing graph may read its samples.
    RemoteStream { url: String },
}

impl MediaSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::RemoteStream { .. })
    }

    /// Opaque locator string, used to detect whether a source is already loaded.
    pub fn locator(&self) -> String {
        match self {
            MediaSource::LocalFile { path } => path.to_string_lossy().into_owned(),
            MediaSource::RemoteStream { url } => url.clone(),
        }
    }
}

/// The playback primitive: one output channel.
///
/// Volume is normalized to `0.0..=1.0`.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Pause, rewind and replace the current source, then start buffering it.
    async fn load(&self, source: MediaSource) -> Result<()>;

    /// Begin or resume playback of the loaded source.
    ///
    /// Hosts reject this when nothing is loaded or the source cannot be decoded.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the source.
    async fn pause(&self) -> Result<()>;

    /// Pause and rewind to the start of the source.
    async fn stop(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Set the channel volume.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Lifecycle of the host audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created but not yet allowed to produce audio.
    Suspended,
    /// Producing audio.
    Running,
    /// Torn down. A closed engine must be reopened before use.
    Closed,
}

/// A PCM processing stage the engine inserts between the output channel and
/// the device.
///
/// Called on the audio thread with interleaved `f32` samples.
pub trait SampleProcessor: Send + Sync {
    fn process(&self, samples: &mut [f32], channels: usize);
}

/// The host audio context.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Current lifecycle state.
    fn state(&self) -> EngineState;

    /// Ask a suspended engine to start running.
    async fn resume(&self) -> Result<()>;

    /// Replace a closed engine with a fresh one. Any attached processor is lost.
    async fn reopen(&self) -> Result<()>;

    /// Output sample rate in hertz.
    fn sample_rate(&self) -> u32;

    /// Route the output channel through `processor`, replacing any previous one.
    fn attach_processor(&self, processor: Arc<dyn SampleProcessor>) -> Result<()>;

    /// Route the output channel straight to the device again.
    fn detach_processor(&self);
}
