//! # Event Bus System
//!
//! Typed notifications from the core to whoever is rendering it, carried over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The engine and the library reconciler never call back into the UI. They
//! emit a [`CoreEvent`] and move on; subscribers re-read whatever snapshot they
//! need. Emitting with no subscribers is not an error worth handling, so
//! emitters ignore the result of [`EventBus::emit`].
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ PlaybackEngine   ├────────>│           ├────────────>│ UI adapter │
//! └──────────────────┘         │ EventBus  │             └────────────┘
//! ┌──────────────────┐  emit   │           │  subscribe  ┌────────────┐
//! │ LibraryReconciler├────────>│           ├────────────>│ Presence   │
//! └──────────────────┘         └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut stream = EventStream::new(bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Playback(_)));
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Paused {
//!     track_id: "t1".to_string(),
//!     position_ms: 1_500,
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback paused");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell `n` events behind. Events
//!   here are notifications, not state, so a lagging subscriber should simply
//!   re-read the engine snapshot.
//! - **`RecvError::Closed`**: the bus was dropped; the core is shutting down.

use core_async::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default capacity for the broadcast channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Library reconciliation events
    Library(LibraryEvent),
    /// Playback and queue events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Library(LibraryEvent::SourceFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Library(LibraryEvent::Updated { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::TrackChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Library Events
// ============================================================================

/// Events produced by library reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A reconciliation pass changed the visible track/folder set.
    Updated {
        /// Combined revision fingerprint now applied.
        revision: String,
        track_count: usize,
        folder_count: usize,
    },
    /// One scan source failed during a pass. The pass continued without it.
    SourceFailed {
        /// Folder path or remote server id.
        source: String,
        message: String,
    },
    /// A cover image locator was resolved for every track sharing `audio_url`.
    CoverResolved { audio_url: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::Updated { .. } => "Library updated",
            LibraryEvent::SourceFailed { .. } => "Library source failed",
            LibraryEvent::CoverResolved { .. } => "Cover resolved",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to playback and queue state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The current track was switched.
    TrackChanged {
        track_id: String,
        title: String,
        artist: String,
        /// Whether the previous track faded out first.
        crossfaded: bool,
    },
    /// Playback started or resumed.
    Started { track_id: String },
    /// Playback paused.
    Paused {
        track_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback stopped because there is nothing left to play.
    Stopped { track_id: Option<String> },
    /// A fade-out towards `next_track_id` began.
    CrossfadeStarted {
        track_id: Option<String>,
        next_track_id: String,
        duration_ms: u64,
    },
    /// Manual queue, context or removal set changed.
    QueueChanged {
        manual_len: usize,
        upcoming_len: usize,
    },
    /// Shuffle, repeat, volume or mute changed.
    ModeChanged,
    /// Audio processing route changed.
    RouteChanged {
        /// `true` when volume now lands on the processing graph.
        graph_active: bool,
    },
    /// The playback primitive rejected a request.
    Error {
        track_id: Option<String>,
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::CrossfadeStarted { .. } => "Crossfade started",
            PlaybackEvent::QueueChanged { .. } => "Queue changed",
            PlaybackEvent::ModeChanged => "Playback mode changed",
            PlaybackEvent::RouteChanged { .. } => "Audio route changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus that buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered event that passes the filter, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn track_changed(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::TrackChanged {
            track_id: id.to_string(),
            title: "Song".to_string(),
            artist: "Artist".to_string(),
            crossfaded: false,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(track_changed("t1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = track_changed("t1");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|e| matches!(e, CoreEvent::Library(_)));

        bus.emit(track_changed("t1")).ok();
        let library = CoreEvent::Library(LibraryEvent::Updated {
            revision: "a|b".to_string(),
            track_count: 3,
            folder_count: 1,
        });
        bus.emit(library.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), library);
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_and_reports_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|e| e.severity() >= EventSeverity::Warning);

        bus.emit(track_changed("t1")).ok();
        assert!(stream.try_recv().is_none());

        bus.emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id: None,
            message: "decode failed".to_string(),
        }))
        .ok();
        assert!(matches!(stream.try_recv(), Some(Ok(_))));
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(track_changed(&format!("t{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(track_changed("t").severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Library(LibraryEvent::SourceFailed {
                source: "/music".to_string(),
                message: "gone".to_string(),
            })
            .severity(),
            EventSeverity::Warning
        );
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::ModeChanged).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&track_changed("t9")).unwrap();
        assert!(json.contains("\"type\":\"Playback\""));
        assert!(json.contains("\"event\":\"TrackChanged\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, track_changed("t9"));
    }
}
