//! # Playback Engine
//!
//! The single owner of player state. Wires the sequencer, the crossfade
//! controller and the graph builder to one output channel.
//!
//! ## Overview
//!
//! Every operation takes `&mut self`; callers serialize access (the service
//! layer keeps the engine behind one async mutex). Timer callbacks come back
//! as [`TimerEvent`]s on the receiver returned by [`PlaybackEngine::new`] and
//! must be fed to [`PlaybackEngine::handle_timer`] under the same lock.
//!
//! ## Volume routing
//!
//! Volume lands on exactly one place: the graph's master gain while the
//! graph is active, the output channel otherwise. The route is read from the
//! graph builder on every write, never cached.
//!
//! ## Transitions
//!
//! [`PlaybackEngine::play_track`] either fades the current track out and
//! swaps when the fade completes, or swaps immediately. A new request always
//! retires the previous fade and any pending snap-back first.

use crate::config::PlaybackConfig;
use crate::crossfade::{CrossfadeController, FadeStep, TimerEvent};
use crate::equalizer::AudioSettings;
use crate::error::{PlaybackError, Result};
use crate::graph::{AudioGraphBuilder, GraphStatus};
use crate::sequencer::{Cursor, ItemSource, PlaybackSequencer};
use crate::state::{PlayerState, RepeatMode};
use bridge_traits::audio::{AudioEngine, AudioOutput};
use core_async::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use core_library::{LibrarySnapshot, Track};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

fn cursor<'a>(current: &'a Option<Track>, state: &PlayerState) -> Cursor<'a> {
    Cursor::new(
        current.as_ref().map(|track| track.id.as_str()),
        state.is_shuffled,
        state.repeat_mode,
    )
}

/// Playback engine.
pub struct PlaybackEngine {
    output: Arc<dyn AudioOutput>,
    graph: AudioGraphBuilder,
    sequencer: PlaybackSequencer,
    fade: CrossfadeController,
    config: PlaybackConfig,
    audio: AudioSettings,
    state: PlayerState,
    current: Option<Track>,
    library: Arc<LibrarySnapshot>,
    /// Tracks handed in through contexts and the manual queue
    known: HashMap<String, Track>,
    loaded_locator: Option<String>,
    /// Track id the near-end crossfade already fired for
    auto_advanced_for: Option<String>,
    /// Manual entry leaving the queue at the next switch to it
    pending_manual: Option<String>,
    /// Canonical ids started since the last drain
    played: Vec<String>,
    events: Option<EventBus>,
}

impl PlaybackEngine {
    /// Create an engine and the receiver its timers post to.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        audio_engine: Option<Arc<dyn AudioEngine>>,
        config: PlaybackConfig,
    ) -> Result<(Self, UnboundedReceiver<TimerEvent>)> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let (timer_tx, timer_rx) = unbounded_channel();
        let engine = Self {
            output,
            graph: AudioGraphBuilder::new(audio_engine),
            sequencer: PlaybackSequencer::new(config.history_capacity),
            fade: CrossfadeController::new(config.fade_steps, config.settle_delay, timer_tx),
            state: PlayerState::with_volume(config.default_volume),
            config,
            audio: AudioSettings::default(),
            current: None,
            library: Arc::new(LibrarySnapshot::default()),
            known: HashMap::new(),
            loaded_locator: None,
            auto_advanced_for: None,
            pending_manual: None,
            played: Vec::new(),
            events: None,
        };
        Ok((engine, timer_rx))
    }

    /// Publish playback events on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Start from previously saved audio settings.
    pub fn with_audio_settings(mut self, settings: AudioSettings) -> Self {
        self.audio = settings;
        self
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn audio_settings(&self) -> &AudioSettings {
        &self.audio
    }

    pub fn graph_status(&self) -> GraphStatus {
        self.graph.status()
    }

    pub fn graph(&self) -> &AudioGraphBuilder {
        &self.graph
    }

    pub fn context_label(&self) -> &str {
        self.sequencer.context_label()
    }

    pub fn history(&self) -> Vec<String> {
        self.sequencer.history()
    }

    /// Whether a fade or snap-back is pending.
    pub fn is_transition_in_flight(&self) -> bool {
        !self.fade.is_idle()
    }

    /// Manual queue entries as tracks, in queue order.
    pub fn manual_queue_tracks(&self) -> Vec<Track> {
        self.sequencer
            .manual_queue()
            .iter()
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    /// Upcoming context tracks, minus anything already in the manual queue.
    pub fn upcoming_tracks(&mut self) -> Vec<Track> {
        let ids = self
            .sequencer
            .upcoming_context_ids(cursor(&self.current, &self.state));
        let manual = self.sequencer.manual_queue();
        ids.iter()
            .filter(|id| !manual.contains(id))
            .filter_map(|id| self.resolve(id))
            .collect()
    }

    /// Canonical ids of tracks started since the previous call, oldest first.
    pub fn drain_played(&mut self) -> Vec<String> {
        std::mem::take(&mut self.played)
    }

    // ========================================================================
    // Library and queues
    // ========================================================================

    /// Adopt a freshly reconciled library and re-bind the current track to
    /// its new entry, matched by id first and audio URL second.
    pub fn update_library(&mut self, library: Arc<LibrarySnapshot>) {
        let rebound = self.current.as_ref().and_then(|current| {
            library
                .track(&current.id)
                .or_else(|| library.track_by_audio_url(&current.audio_url))
                .filter(|track| *track != current)
                .cloned()
        });
        if let Some(track) = rebound {
            debug!(track_id = %track.id, "Current track re-bound after library update");
            self.current = Some(track);
        }
        self.library = library;
    }

    /// Replace the context when its ordered ids changed.
    pub fn set_context(&mut self, tracks: &[Track], label: &str) -> bool {
        for track in tracks {
            self.known.insert(track.id.clone(), track.clone());
        }
        let changed = self
            .sequencer
            .set_context(tracks.iter().map(|t| t.id.clone()), label);
        if changed {
            self.emit_queue_changed();
        }
        changed
    }

    pub fn enqueue(&mut self, track: Track) {
        let id = track.id.clone();
        self.known.insert(id.clone(), track);
        self.sequencer.enqueue(id);
        self.emit_queue_changed();
    }

    pub fn remove_manual_at(&mut self, index: usize) -> Option<String> {
        let removed = self.sequencer.remove_manual_at(index);
        if removed.is_some() {
            self.emit_queue_changed();
        }
        removed
    }

    pub fn remove_from_context(&mut self, track_id: &str) {
        self.sequencer.remove_from_context(track_id);
        self.emit_queue_changed();
    }

    pub fn consume_manual_through(&mut self, track_id: &str) -> usize {
        let dropped = self.sequencer.consume_manual_through(track_id);
        if dropped > 0 {
            self.emit_queue_changed();
        }
        dropped
    }

    fn resolve(&self, id: &str) -> Option<Track> {
        self.library
            .track(id)
            .or_else(|| self.known.get(id))
            .cloned()
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Switch to `track`, fading the current one out first when
    /// `use_crossfade` is set, a crossfade length is configured and
    /// something is playing.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play_track(&mut self, track: Track, use_crossfade: bool) -> Result<()> {
        let settling = self.fade.is_settling();
        self.fade.cancel();

        let target = self.state.effective_volume();
        let fade_seconds = self.audio.crossfade;
        if use_crossfade && fade_seconds > 0 && self.state.is_playing && self.current.is_some() {
            if settling {
                // Finish the snap-back the new fade would have skipped.
                self.route_volume(target).await;
            }
            self.emit(PlaybackEvent::CrossfadeStarted {
                track_id: self.current.as_ref().map(|t| t.id.clone()),
                next_track_id: track.id.clone(),
                duration_ms: u64::from(fade_seconds) * 1000,
            });
            self.fade.begin(track, target, fade_seconds);
            return Ok(());
        }

        self.route_volume(target).await;
        self.switch_to(track, false, target).await
    }

    /// Play a track the user picked. Reshuffles around it when shuffled.
    pub async fn select_track(&mut self, track: Track) -> Result<()> {
        if self.state.is_shuffled {
            self.sequencer.bump_shuffle_nonce();
        }
        self.play_track(track, false).await
    }

    /// Play the manual entry at `index`, dropping it and everything before it.
    pub async fn play_manual_at(&mut self, index: usize) -> Result<Option<Track>> {
        let Some(id) = self.sequencer.manual_queue().get(index).cloned() else {
            return Ok(None);
        };
        for _ in 0..index {
            self.sequencer.remove_manual_at(0);
        }
        self.pending_manual = Some(id.clone());
        let track = self
            .resolve(&id)
            .ok_or_else(|| PlaybackError::TrackNotFound(id.clone()))?;
        self.play_track(track.clone(), false).await?;
        Ok(Some(track))
    }

    /// Skip to the next item. Stops when nothing is left.
    pub async fn next(&mut self) -> Result<Option<Track>> {
        self.advance(false).await
    }

    /// Go back one item. Stops when nothing is before the current track.
    #[instrument(skip(self))]
    pub async fn previous(&mut self) -> Result<Option<Track>> {
        // History entries may point at tracks that left the library.
        let attempts = self.sequencer.history().len() + 1;
        for _ in 0..attempts {
            let Some(id) = self
                .sequencer
                .previous_item(cursor(&self.current, &self.state))
            else {
                break;
            };
            if let Some(track) = self.resolve(&id) {
                self.play_track(track.clone(), false).await?;
                return Ok(Some(track));
            }
            warn!(track_id = %id, "Previous track no longer available");
            if !self.state.is_shuffled {
                break;
            }
        }
        self.stop_at_end().await?;
        Ok(None)
    }

    async fn advance(&mut self, use_crossfade: bool) -> Result<Option<Track>> {
        let item = self
            .sequencer
            .next_item(cursor(&self.current, &self.state));
        let Some(item) = item else {
            self.stop_at_end().await?;
            return Ok(None);
        };

        if item.source == ItemSource::Manual {
            self.pending_manual = Some(item.track_id.clone());
        }
        let track = self
            .resolve(&item.track_id)
            .ok_or_else(|| PlaybackError::TrackNotFound(item.track_id.clone()))?;
        self.play_track(track.clone(), use_crossfade).await?;
        Ok(Some(track))
    }

    /// The swap itself: make `track` current and start it with the route at
    /// `volume`.
    async fn switch_to(&mut self, track: Track, crossfaded: bool, volume: f32) -> Result<()> {
        let previous = self.current.as_ref().map(|t| t.id.clone());
        self.sequencer.record_switch(previous.as_deref(), &track.id);

        let from_manual = self
            .pending_manual
            .take()
            .is_some_and(|id| id == track.id);
        let source = if from_manual {
            self.sequencer.consume_manual_through(&track.id);
            ItemSource::Manual
        } else {
            ItemSource::Context
        };
        self.sequencer.mark_playing(&track.id, source);

        self.state.is_playing = true;
        self.state.current_time = 0.0;
        self.state.duration = track.duration as f64;
        self.auto_advanced_for = None;
        self.played.push(track.canonical_id.clone());

        info!(
            track_id = %track.id,
            title = %track.display_title(),
            crossfaded,
            "Track switched"
        );
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            title: track.display_title(),
            artist: track.artist.clone(),
            crossfaded,
        });
        self.current = Some(track);
        if from_manual {
            self.emit_queue_changed();
        }

        self.start_playback(volume).await
    }

    async fn start_playback(&mut self, volume: f32) -> Result<()> {
        let Some(track) = self.current.clone() else {
            return Err(PlaybackError::NoTrackLoaded);
        };

        self.ensure_graph().await;

        let source = track.media_source();
        let locator = source.locator();
        if self.loaded_locator.as_deref() != Some(locator.as_str()) {
            self.loaded_locator = None;
            if let Err(e) = self.output.load(source).await {
                return Err(self.fail(PlaybackError::SourceUnavailable(format!(
                    "{}: {}",
                    track.audio_url, e
                ))));
            }
            self.loaded_locator = Some(locator);
        }

        self.route_volume(volume).await;

        if let Err(e) = self.output.play().await {
            return Err(self.fail(e.into()));
        }
        self.state.is_playing = true;
        self.emit(PlaybackEvent::Started { track_id: track.id });
        Ok(())
    }

    async fn stop_at_end(&mut self) -> Result<()> {
        self.fade.cancel();
        self.state.is_playing = false;
        self.state.current_time = 0.0;
        debug!("Sequence exhausted, stopping");
        self.emit(PlaybackEvent::Stopped {
            track_id: self.current.as_ref().map(|t| t.id.clone()),
        });
        if self.loaded_locator.is_some() {
            self.output.stop().await?;
        }
        Ok(())
    }

    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        self.state.is_playing = false;
        let track_id = self.current.as_ref().map(|t| t.id.clone());
        error!(track_id = ?track_id, error = %error, "Playback failed");
        self.emit(PlaybackEvent::Error {
            track_id,
            message: error.to_string(),
        });
        error
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// Deliver a timer callback. Stale events are ignored.
    pub async fn handle_timer(&mut self, event: TimerEvent) -> Result<()> {
        match event {
            TimerEvent::FadeTick { generation } => match self.fade.on_tick(generation) {
                FadeStep::Continue { volume } => {
                    // Mute and volume changes made mid-fade cap the fade.
                    let volume = volume.min(self.state.effective_volume());
                    trace!(volume, "Fade step");
                    self.route_volume(volume).await;
                    Ok(())
                }
                FadeStep::Swap {
                    armed,
                    original_volume,
                } => self.complete_fade(*armed, original_volume).await,
                FadeStep::Stale => {
                    trace!(generation, "Stale fade tick");
                    Ok(())
                }
            },
            TimerEvent::Settle { generation } => {
                if let Some(volume) = self.fade.on_settle(generation) {
                    debug!(volume, "Volume restored after crossfade");
                    self.route_volume(volume).await;
                }
                Ok(())
            }
        }
    }

    async fn complete_fade(&mut self, armed: Track, original_volume: f32) -> Result<()> {
        self.route_volume(0.0).await;
        // On failure the route stays silent; there is no snap-back.
        self.switch_to(armed, true, 0.0).await?;
        self.fade.begin_settle(original_volume);
        Ok(())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub async fn toggle_play_pause(&mut self) -> Result<()> {
        if self.state.is_playing {
            if let Some(volume) = self.fade.restore_volume() {
                self.fade.cancel();
                self.route_volume(volume).await;
            }
            self.output.pause().await?;
            self.state.is_playing = false;
            if let Some(track) = &self.current {
                self.emit(PlaybackEvent::Paused {
                    track_id: track.id.clone(),
                    position_ms: (self.state.current_time * 1000.0) as u64,
                });
            }
            return Ok(());
        }

        if self.current.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.start_playback(self.state.effective_volume()).await
    }

    pub async fn seek(&mut self, seconds: f64) -> Result<()> {
        let seconds = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        self.output
            .seek(Duration::from_secs_f64(seconds))
            .await?;
        self.state.current_time = seconds;
        if let Some(remaining) = self.state.remaining() {
            if remaining > f64::from(self.audio.crossfade) {
                self.auto_advanced_for = None;
            }
        }
        Ok(())
    }

    pub async fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            warn!(volume, "Ignoring non-finite volume");
            return;
        }
        self.state.volume = volume.clamp(0.0, 1.0);
        self.apply_user_volume().await;
    }

    pub async fn toggle_mute(&mut self) {
        self.state.is_muted = !self.state.is_muted;
        self.apply_user_volume().await;
    }

    async fn apply_user_volume(&mut self) {
        let volume = self.state.effective_volume();
        if self.fade.is_idle() {
            self.route_volume(volume).await;
        } else {
            self.fade.set_restore_volume(volume);
        }
        self.emit(PlaybackEvent::ModeChanged);
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.state.is_shuffled = !self.state.is_shuffled;
        if self.state.is_shuffled {
            self.sequencer.bump_shuffle_nonce();
        }
        debug!(shuffled = self.state.is_shuffled, "Shuffle toggled");
        self.emit(PlaybackEvent::ModeChanged);
        self.emit_queue_changed();
        self.state.is_shuffled
    }

    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.state.repeat_mode = self.state.repeat_mode.cycle();
        debug!(mode = ?self.state.repeat_mode, "Repeat mode changed");
        self.emit(PlaybackEvent::ModeChanged);
        self.emit_queue_changed();
        self.state.repeat_mode
    }

    // ========================================================================
    // Output callbacks
    // ========================================================================

    /// The output reached the end of the current source.
    #[instrument(skip(self))]
    pub async fn on_track_ended(&mut self) -> Result<Option<Track>> {
        if self.current.is_none() {
            self.state.is_playing = false;
            self.state.current_time = 0.0;
            return Ok(None);
        }

        // The old track ran out before its fade did: swap now.
        if let Some(armed) = self.fade.armed_track().cloned() {
            let restore = self.fade.restore_volume().unwrap_or(0.0);
            self.fade.cancel();
            self.complete_fade(armed.clone(), restore).await?;
            return Ok(Some(armed));
        }

        if self.state.repeat_mode == RepeatMode::One {
            self.output.seek(Duration::ZERO).await?;
            self.state.current_time = 0.0;
            self.auto_advanced_for = None;
            if let Err(e) = self.output.play().await {
                return Err(self.fail(e.into()));
            }
            self.state.is_playing = true;
            return Ok(self.current.clone());
        }

        self.advance(false).await
    }

    /// Position update from the output, in seconds.
    ///
    /// Starts the near-end crossfade once per track when the remaining time
    /// drops to the crossfade length.
    pub async fn on_position_changed(&mut self, seconds: f64) -> Result<()> {
        self.state.current_time = seconds.max(0.0);

        let Some(current_id) = self.current.as_ref().map(|t| t.id.clone()) else {
            return Ok(());
        };
        let crossfade = self.audio.crossfade;
        let due = self
            .state
            .remaining()
            .is_some_and(|remaining| remaining <= f64::from(crossfade));

        if !self.config.auto_crossfade
            || crossfade == 0
            || !self.state.is_playing
            || !self.fade.is_idle()
            || self.state.repeat_mode == RepeatMode::One
            || !due
            || self.auto_advanced_for.as_deref() == Some(current_id.as_str())
        {
            return Ok(());
        }

        self.auto_advanced_for = Some(current_id);
        let item = self
            .sequencer
            .next_item(cursor(&self.current, &self.state));
        if item.is_none() {
            // Let the track end naturally.
            return Ok(());
        }
        debug!("Near end of track, crossfading to next");
        self.advance(true).await.map(|_| ())
    }

    /// The output learned the real duration of the loaded source.
    pub fn on_duration_changed(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.state.duration = seconds;
        }
    }

    /// The output reported an error for the loaded source.
    pub fn on_playback_error(&mut self, message: &str) {
        self.state.is_playing = false;
        let track_id = self.current.as_ref().map(|t| t.id.clone());
        error!(track_id = ?track_id, message, "Output reported an error");
        self.emit(PlaybackEvent::Error {
            track_id,
            message: message.to_string(),
        });
    }

    // ========================================================================
    // Audio settings and routing
    // ========================================================================

    /// Adopt new EQ, crossfade and normalize settings.
    ///
    /// The graph is only (re)built once playback has started at least once.
    pub async fn apply_audio_settings(&mut self, settings: AudioSettings) -> GraphStatus {
        self.audio = settings;
        if self.graph.status() == GraphStatus::Uninitialized {
            return GraphStatus::Uninitialized;
        }
        let status = self.ensure_graph().await;
        if self.fade.is_idle() {
            self.route_volume(self.state.effective_volume()).await;
        }
        status
    }

    async fn ensure_graph(&mut self) -> GraphStatus {
        let before = self.graph.status();
        let status = self.graph.ensure(&self.audio).await;
        if status != before {
            if status == GraphStatus::Active {
                if let Err(e) = self.output.set_volume(1.0).await {
                    warn!(error = %e, "Could not pin output volume");
                }
            }
            info!(route = ?status, "Audio route changed");
            self.emit(PlaybackEvent::RouteChanged {
                graph_active: status == GraphStatus::Active,
            });
        }
        status
    }

    async fn route_volume(&self, volume: f32) {
        if self.graph.set_master_gain(volume) {
            return;
        }
        if let Err(e) = self.output.set_volume(volume).await {
            warn!(error = %e, volume, "Volume write rejected");
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    fn emit_queue_changed(&mut self) {
        if self.events.is_none() {
            return;
        }
        let manual_len = self.sequencer.manual_queue().len();
        let upcoming_len = self.upcoming_tracks().len();
        self.emit(PlaybackEvent::QueueChanged {
            manual_len,
            upcoming_len,
        });
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state)
            .field("current", &self.current.as_ref().map(|t| &t.id))
            .field("graph", &self.graph.status())
            .field("fade", &self.fade)
            .finish_non_exhaustive()
    }
}
