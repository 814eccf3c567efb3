//! # Playback Error Types
//!
//! Error types for sequencing, transitions and the processing graph.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Track id is not part of the current library.
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// The output channel could not load the track's locator.
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// The output channel rejected a command.
    #[error("Output rejected command: {0}")]
    Output(#[from] BridgeError),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    // ========================================================================
    // Processing Graph Errors
    // ========================================================================
    /// The host audio engine is missing, closed or refuses to run.
    #[error("Audio engine unavailable: {0}")]
    AudioEngineUnavailable(String),

    /// A graph node could not be configured.
    #[error("Processing graph error: {0}")]
    Graph(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisting settings failed.
    #[error("Settings error: {0}")]
    Settings(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceUnavailable(_)
                | PlaybackError::AudioEngineUnavailable(_)
                | PlaybackError::Output(BridgeError::NotAvailable(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PlaybackError::SourceUnavailable("x".into()).is_transient());
        assert!(PlaybackError::Output(BridgeError::NotAvailable("device".into())).is_transient());
        assert!(!PlaybackError::Output(BridgeError::Rejected("codec".into())).is_transient());
        assert!(!PlaybackError::TrackNotFound("t".into()).is_transient());
    }
}
