//! Engine scenarios against a recording output channel.
//!
//! Timer tests run on tokio's paused clock, so fades complete instantly in
//! wall time while keeping their virtual timing.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bridge_traits::audio::{
        AudioEngine, AudioOutput, EngineState, MediaSource, SampleProcessor,
    };
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_library::{LibrarySnapshot, Track, TrackSource};
    use core_playback::{
        AudioSettings, GraphStatus, PlaybackConfig, PlaybackEngine, PlaybackError, RepeatMode,
        TimerEvent,
    };
    use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    // ------------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String),
        Play,
        Pause,
        Stop,
        Seek(Duration),
        Volume(f32),
    }

    #[derive(Default)]
    struct RecordingOutput {
        calls: Mutex<Vec<Call>>,
        reject_play: Mutex<bool>,
    }

    impl RecordingOutput {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn clear(&self) {
            self.calls.lock().clear();
        }

        fn volumes(&self) -> Vec<f32> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Volume(v) => Some(v),
                    _ => None,
                })
                .collect()
        }

        fn loads(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Load(locator) => Some(locator),
                    _ => None,
                })
                .collect()
        }

        fn last_volume(&self) -> Option<f32> {
            self.volumes().last().copied()
        }
    }

    #[async_trait]
    impl AudioOutput for RecordingOutput {
        async fn load(&self, source: MediaSource) -> BridgeResult<()> {
            self.calls.lock().push(Call::Load(source.locator()));
            Ok(())
        }

        async fn play(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Play);
            if *self.reject_play.lock() {
                return Err(BridgeError::Rejected("unsupported codec".to_string()));
            }
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Pause);
            Ok(())
        }

        async fn stop(&self) -> BridgeResult<()> {
            self.calls.lock().push(Call::Stop);
            Ok(())
        }

        async fn seek(&self, position: Duration) -> BridgeResult<()> {
            self.calls.lock().push(Call::Seek(position));
            Ok(())
        }

        async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
            self.calls.lock().push(Call::Volume(volume));
            Ok(())
        }
    }

    struct RunningEngine {
        detached: Mutex<usize>,
    }

    #[async_trait]
    impl AudioEngine for RunningEngine {
        fn state(&self) -> EngineState {
            EngineState::Running
        }

        async fn resume(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn reopen(&self) -> BridgeResult<()> {
            Ok(())
        }

        fn sample_rate(&self) -> u32 {
            44_100
        }

        fn attach_processor(&self, _processor: Arc<dyn SampleProcessor>) -> BridgeResult<()> {
            Ok(())
        }

        fn detach_processor(&self) {
            *self.detached.lock() += 1;
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            canonical_id: format!("canon-{}", id),
            title: format!("Song {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration: 200,
            cover_url: None,
            audio_url: format!("/music/{}.flac", id),
            folder_id: None,
            source: TrackSource::Local,
        }
    }

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter().map(|id| track(id)).collect()
    }

    fn settings(crossfade: u32) -> AudioSettings {
        AudioSettings {
            crossfade,
            ..Default::default()
        }
    }

    struct Harness {
        engine: PlaybackEngine,
        timers: UnboundedReceiver<TimerEvent>,
        output: Arc<RecordingOutput>,
    }

    fn harness(crossfade: u32) -> Harness {
        let output = Arc::new(RecordingOutput::default());
        let (engine, timers) =
            PlaybackEngine::new(output.clone(), None, PlaybackConfig::default()).unwrap();
        Harness {
            engine: engine.with_audio_settings(settings(crossfade)),
            timers,
            output,
        }
    }

    impl Harness {
        fn current_id(&self) -> Option<String> {
            self.engine.current_track().map(|t| t.id.clone())
        }

        /// Deliver timer events until no transition is pending.
        async fn settle(&mut self) {
            while self.engine.is_transition_in_flight() {
                let event = self.timers.recv().await.unwrap();
                self.engine.handle_timer(event).await.unwrap();
            }
        }

        /// Deliver `count` fade ticks.
        async fn ticks(&mut self, count: usize) {
            for _ in 0..count {
                let event = self.timers.recv().await.unwrap();
                self.engine.handle_timer(event).await.unwrap();
            }
        }

        /// Deliver whatever retired timers left in the channel.
        async fn drain_stale(&mut self) {
            tokio::time::sleep(Duration::from_secs(30)).await;
            while let Ok(event) = self.timers.try_recv() {
                self.engine.handle_timer(event).await.unwrap();
            }
        }

        async fn start(&mut self, ids: &[&str]) {
            let list = tracks(ids);
            self.engine.set_context(&list, "Album");
            self.engine.play_track(list[0].clone(), false).await.unwrap();
        }
    }

    // ------------------------------------------------------------------------
    // Instant transitions
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_play_track_without_crossfade() {
        let mut h = harness(0);
        h.engine.play_track(track("a"), true).await.unwrap();

        assert_eq!(
            h.output.calls(),
            vec![
                Call::Volume(0.8),
                Call::Load("/music/a.flac".to_string()),
                Call::Volume(0.8),
                Call::Play,
            ]
        );
        let state = h.engine.state();
        assert!(state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.duration, 200.0);
        assert_eq!(h.current_id().as_deref(), Some("a"));
        assert_eq!(h.engine.drain_played(), vec!["canon-a".to_string()]);
        assert!(h.engine.drain_played().is_empty());
    }

    #[tokio::test]
    async fn test_resume_does_not_reload_source() {
        let mut h = harness(0);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.toggle_play_pause().await.unwrap();
        assert!(!h.engine.state().is_playing);

        h.output.clear();
        h.engine.toggle_play_pause().await.unwrap();
        assert!(h.engine.state().is_playing);
        assert!(h.output.loads().is_empty());
        assert_eq!(h.output.calls().last(), Some(&Call::Play));
    }

    #[tokio::test]
    async fn test_toggle_without_track_fails() {
        let mut h = harness(0);
        let err = h.engine.toggle_play_pause().await.unwrap_err();
        assert!(matches!(err, PlaybackError::NoTrackLoaded));
    }

    #[tokio::test]
    async fn test_rejected_play_stops_and_reports() {
        let mut h = harness(0);
        let bus = EventBus::new(64);
        let mut events = bus.subscribe();
        h.engine = h.engine.with_event_bus(bus);
        *h.output.reject_play.lock() = true;

        let err = h.engine.play_track(track("a"), false).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Output(BridgeError::Rejected(_))));
        assert!(!h.engine.state().is_playing);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let CoreEvent::Playback(PlaybackEvent::Error { track_id, .. }) = event {
                assert_eq!(track_id.as_deref(), Some("a"));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_output_error_callback_clears_playing() {
        let mut h = harness(0);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.on_playback_error("decode error");
        assert!(!h.engine.state().is_playing);
    }

    // ------------------------------------------------------------------------
    // Crossfade
    // ------------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_fades_swaps_and_restores() {
        let mut h = harness(1);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.output.clear();

        h.engine.play_track(track("b"), true).await.unwrap();
        assert!(h.engine.is_transition_in_flight());
        assert_eq!(h.current_id().as_deref(), Some("a"));

        h.settle().await;

        assert_eq!(h.current_id().as_deref(), Some("b"));
        let volumes = h.output.volumes();
        // Nine steps down, silence for the swap, then the snap-back.
        assert_eq!(volumes.len(), 12);
        assert!(volumes[..9].windows(2).all(|w| w[1] < w[0]));
        assert_eq!(volumes[9], 0.0);
        assert_eq!(volumes[10], 0.0);
        assert_eq!(volumes[11], 0.8);
        assert_eq!(h.output.loads(), vec!["/music/b.flac".to_string()]);
        assert_eq!(h.engine.history(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossfade_skipped_when_paused() {
        let mut h = harness(3);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.toggle_play_pause().await.unwrap();

        h.engine.play_track(track("b"), true).await.unwrap();
        assert!(!h.engine.is_transition_in_flight());
        assert_eq!(h.current_id().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_play_during_fade_leaves_no_residue() {
        let mut h = harness(2);
        h.engine.play_track(track("a"), false).await.unwrap();

        h.engine.play_track(track("b"), true).await.unwrap();
        h.ticks(3).await;
        assert!(h.output.last_volume().unwrap() < 0.8);

        h.output.clear();
        h.engine.play_track(track("c"), false).await.unwrap();
        assert_eq!(h.current_id().as_deref(), Some("c"));
        assert!(!h.engine.is_transition_in_flight());

        h.drain_stale().await;

        assert_eq!(h.output.loads(), vec!["/music/c.flac".to_string()]);
        assert_eq!(h.output.volumes(), vec![0.8, 0.8]);
        assert_eq!(h.current_id().as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fade_retires_previous_fade() {
        let mut h = harness(1);
        h.engine.play_track(track("a"), false).await.unwrap();

        h.engine.play_track(track("b"), true).await.unwrap();
        h.ticks(4).await;
        h.engine.play_track(track("c"), true).await.unwrap();
        h.settle().await;
        h.drain_stale().await;

        assert_eq!(h.current_id().as_deref(), Some("c"));
        assert!(!h.output.loads().contains(&"/music/b.flac".to_string()));
        assert_eq!(h.output.last_volume(), Some(0.8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_change_during_fade_is_restored() {
        let mut h = harness(1);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.play_track(track("b"), true).await.unwrap();
        h.ticks(2).await;

        h.engine.set_volume(0.4).await;
        h.settle().await;

        assert_eq!(h.output.last_volume(), Some(0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_swap_leaves_volume_silent() {
        let mut h = harness(1);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.play_track(track("b"), true).await.unwrap();
        *h.output.reject_play.lock() = true;

        let mut result = Ok(());
        while h.engine.is_transition_in_flight() {
            let event = h.timers.recv().await.unwrap();
            result = h.engine.handle_timer(event).await;
            if result.is_err() {
                break;
            }
        }

        assert!(result.is_err());
        assert!(!h.engine.state().is_playing);
        assert_eq!(h.output.last_volume(), Some(0.0));
        assert!(!h.engine.is_transition_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_near_end_position_crossfades_once() {
        let mut h = harness(5);
        h.start(&["a", "b", "c"]).await;

        h.engine.on_position_changed(100.0).await.unwrap();
        assert!(!h.engine.is_transition_in_flight());

        h.engine.on_position_changed(195.5).await.unwrap();
        assert!(h.engine.is_transition_in_flight());
        h.settle().await;
        assert_eq!(h.current_id().as_deref(), Some("b"));

        h.engine.on_position_changed(2.0).await.unwrap();
        assert!(!h.engine.is_transition_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_near_end_fade_keeps_manual_entry() {
        let mut h = harness(5);
        h.start(&["a", "b"]).await;
        h.engine.enqueue(track("q"));

        h.engine.on_position_changed(196.0).await.unwrap();
        assert!(h.engine.is_transition_in_flight());
        let queued: Vec<String> = h
            .engine
            .manual_queue_tracks()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(queued, vec!["q"]);

        h.engine.toggle_play_pause().await.unwrap();
        assert!(!h.engine.is_transition_in_flight());
        assert_eq!(h.engine.manual_queue_tracks().len(), 1);

        let next = h.engine.on_track_ended().await.unwrap();
        assert_eq!(next.map(|t| t.id), Some("q".to_string()));
        assert!(h.engine.manual_queue_tracks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_entry_leaves_queue_at_swap() {
        let mut h = harness(5);
        h.start(&["a", "b"]).await;
        h.engine.enqueue(track("q"));

        h.engine.on_position_changed(196.0).await.unwrap();
        h.settle().await;

        assert_eq!(h.current_id().as_deref(), Some("q"));
        assert!(h.engine.manual_queue_tracks().is_empty());
        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mute_during_fade_silences_remaining_steps() {
        let mut h = harness(2);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.play_track(track("b"), true).await.unwrap();
        h.ticks(1).await;
        assert!(h.output.last_volume().unwrap() > 0.0);

        h.engine.toggle_mute().await;
        h.output.clear();
        h.ticks(3).await;
        assert_eq!(h.output.volumes(), vec![0.0, 0.0, 0.0]);

        h.settle().await;
        assert_eq!(h.current_id().as_deref(), Some("b"));
        assert_eq!(h.output.last_volume(), Some(0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_during_snap_back_restores_first() {
        let mut h = harness(1);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.play_track(track("b"), true).await.unwrap();
        while h.current_id().as_deref() != Some("b") {
            h.ticks(1).await;
        }
        assert!(h.engine.is_transition_in_flight());
        assert_eq!(h.output.last_volume(), Some(0.0));

        h.output.clear();
        h.engine.play_track(track("c"), true).await.unwrap();
        assert_eq!(h.output.volumes(), vec![0.8]);

        h.settle().await;
        h.drain_stale().await;
        assert_eq!(h.current_id().as_deref(), Some("c"));
        assert_eq!(h.output.last_volume(), Some(0.8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_track_end_during_fade_swaps_immediately() {
        let mut h = harness(10);
        h.start(&["a", "b"]).await;

        h.engine.on_position_changed(191.0).await.unwrap();
        assert!(h.engine.is_transition_in_flight());

        let next = h.engine.on_track_ended().await.unwrap();
        assert_eq!(next.map(|t| t.id), Some("b".to_string()));
        assert_eq!(h.current_id().as_deref(), Some("b"));

        h.settle().await;
        assert_eq!(h.output.last_volume(), Some(0.8));
    }

    // ------------------------------------------------------------------------
    // Sequencing through the engine
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_manual_queue_plays_before_context() {
        let mut h = harness(0);
        h.start(&["a", "b", "c"]).await;
        h.engine.enqueue(track("q1"));
        h.engine.enqueue(track("q2"));

        let upcoming: Vec<String> = h.engine.upcoming_tracks().into_iter().map(|t| t.id).collect();
        assert_eq!(upcoming, vec!["b", "c"]);

        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "q1");
        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "q2");
        assert!(h.engine.manual_queue_tracks().is_empty());
        // The context resumes after the last context track that played.
        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "b");
        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "c");
        assert!(h.engine.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unqueued_track_outside_context_restarts_context() {
        let mut h = harness(0);
        h.start(&["a", "b"]).await;
        h.engine.play_track(track("elsewhere"), false).await.unwrap();

        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_upcoming_hides_manual_and_removed_ids() {
        let mut h = harness(0);
        h.start(&["a", "b", "c", "d"]).await;
        h.engine.enqueue(track("c"));
        h.engine.remove_from_context("d");

        let upcoming: Vec<String> = h.engine.upcoming_tracks().into_iter().map(|t| t.id).collect();
        assert_eq!(upcoming, vec!["b"]);
        let manual: Vec<String> = h
            .engine
            .manual_queue_tracks()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(manual, vec!["c"]);
    }

    #[tokio::test]
    async fn test_play_manual_at_consumes_through_index() {
        let mut h = harness(0);
        h.start(&["a"]).await;
        for id in ["q1", "q2", "q3"] {
            h.engine.enqueue(track(id));
        }

        let played = h.engine.play_manual_at(1).await.unwrap().unwrap();
        assert_eq!(played.id, "q2");
        let manual: Vec<String> = h
            .engine
            .manual_queue_tracks()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(manual, vec!["q3"]);
        assert!(h.engine.play_manual_at(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exhaustion_stops_and_rewinds() {
        let mut h = harness(0);
        h.start(&["a", "b"]).await;
        h.engine.next().await.unwrap();
        h.engine.on_position_changed(120.0).await.unwrap();

        assert!(h.engine.next().await.unwrap().is_none());
        let state = h.engine.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(h.output.calls().last(), Some(&Call::Stop));
    }

    #[tokio::test]
    async fn test_repeat_all_wraps_on_track_end() {
        let mut h = harness(0);
        h.start(&["a", "b"]).await;
        h.engine.cycle_repeat_mode();
        assert_eq!(h.engine.state().repeat_mode, RepeatMode::All);

        assert_eq!(h.engine.on_track_ended().await.unwrap().unwrap().id, "b");
        assert_eq!(h.engine.on_track_ended().await.unwrap().unwrap().id, "a");
    }

    #[tokio::test]
    async fn test_repeat_one_restarts_on_end_but_next_advances() {
        let mut h = harness(0);
        h.start(&["a", "b"]).await;
        h.engine.cycle_repeat_mode();
        h.engine.cycle_repeat_mode();
        assert_eq!(h.engine.state().repeat_mode, RepeatMode::One);

        h.engine.on_position_changed(199.0).await.unwrap();
        h.output.clear();
        let same = h.engine.on_track_ended().await.unwrap().unwrap();
        assert_eq!(same.id, "a");
        assert_eq!(h.output.calls(), vec![Call::Seek(Duration::ZERO), Call::Play]);
        assert_eq!(h.engine.state().current_time, 0.0);

        assert_eq!(h.engine.next().await.unwrap().unwrap().id, "b");
        assert!(h.engine.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_previous_walks_back_and_stops_at_start() {
        let mut h = harness(0);
        h.start(&["a", "b", "c"]).await;
        h.engine.next().await.unwrap();

        assert_eq!(h.engine.previous().await.unwrap().unwrap().id, "a");
        assert!(h.engine.previous().await.unwrap().is_none());
        assert!(!h.engine.state().is_playing);
    }

    #[tokio::test]
    async fn test_shuffled_previous_uses_history() {
        let mut h = harness(0);
        let list = tracks(&["a", "b", "c", "d", "e", "f"]);
        h.engine.set_context(&list, "All tracks");
        assert!(h.engine.toggle_shuffle());

        h.engine.select_track(list[2].clone()).await.unwrap();
        let second = h.engine.next().await.unwrap().unwrap();
        let third = h.engine.next().await.unwrap().unwrap();
        assert_ne!(second.id, "c");
        assert_ne!(third.id, second.id);

        assert_eq!(h.engine.previous().await.unwrap().unwrap().id, second.id);
        // Going back is itself a switch, so the track we left is now on top.
        assert_eq!(h.engine.previous().await.unwrap().unwrap().id, third.id);
        assert_eq!(
            h.engine.history(),
            vec!["c".to_string(), second.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_shuffle_with_event_bus_heads_order_with_played_track() {
        let mut h = harness(0);
        h.engine = h.engine.with_event_bus(EventBus::new(256));
        let ids: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
        let names: Vec<&str> = ids.iter().map(String::as_str).collect();
        let list = tracks(&names);

        h.engine.toggle_shuffle();
        h.engine.set_context(&list, "All tracks");
        h.engine.enqueue(track("q"));
        h.engine.remove_manual_at(0);
        h.engine.play_track(list[5].clone(), false).await.unwrap();

        let upcoming = h.engine.upcoming_tracks();
        assert_eq!(upcoming.len(), 9);
        assert!(upcoming.iter().all(|t| t.id != "t5"));

        let mut seen = vec!["t5".to_string()];
        while let Some(track) = h.engine.next().await.unwrap() {
            seen.push(track.id);
        }
        seen.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_shuffle_visits_whole_context_once() {
        let mut h = harness(0);
        let ids = ["a", "b", "c", "d", "e", "f", "g"];
        let list = tracks(&ids);
        h.engine.set_context(&list, "All tracks");
        h.engine.toggle_shuffle();
        h.engine.select_track(list[0].clone()).await.unwrap();

        let mut seen = vec!["a".to_string()];
        while let Some(track) = h.engine.next().await.unwrap() {
            seen.push(track.id);
        }
        seen.sort();
        assert_eq!(seen, ids.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_library_update_rebinds_current_track() {
        let mut h = harness(0);
        h.start(&["a"]).await;

        let mut rescanned = track("a-new-id");
        rescanned.audio_url = "/music/a.flac".to_string();
        rescanned.cover_url = Some("data:image/png;base64,AAAA".to_string());
        h.engine
            .update_library(Arc::new(LibrarySnapshot::new(vec![rescanned], vec![], None)));

        let current = h.engine.current_track().unwrap();
        assert_eq!(current.id, "a-new-id");
        assert!(current.cover_url.is_some());
    }

    // ------------------------------------------------------------------------
    // Volume routing
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_mute_routes_zero_and_back() {
        let mut h = harness(0);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.engine.toggle_mute().await;
        assert_eq!(h.output.last_volume(), Some(0.0));
        h.engine.set_volume(0.5).await;
        assert_eq!(h.output.last_volume(), Some(0.0));
        h.engine.toggle_mute().await;
        assert_eq!(h.output.last_volume(), Some(0.5));
    }

    #[tokio::test]
    async fn test_non_finite_volume_ignored() {
        let mut h = harness(0);
        h.engine.play_track(track("a"), false).await.unwrap();
        h.output.clear();

        h.engine.set_volume(f32::NAN).await;
        h.engine.set_volume(f32::INFINITY).await;

        assert!(h.output.volumes().is_empty());
        assert_eq!(h.engine.state().volume, 0.8);
    }

    #[tokio::test]
    async fn test_active_graph_owns_volume() {
        let output = Arc::new(RecordingOutput::default());
        let audio_engine = Arc::new(RunningEngine {
            detached: Mutex::new(0),
        });
        let (engine, _timers) = PlaybackEngine::new(
            output.clone(),
            Some(audio_engine.clone()),
            PlaybackConfig::default(),
        )
        .unwrap();
        let mut engine = engine.with_audio_settings(AudioSettings::default());

        engine.play_track(track("a"), false).await.unwrap();
        assert_eq!(engine.graph_status(), GraphStatus::Active);
        // Output pinned to unity; the user volume lives on the master gain.
        assert_eq!(output.last_volume(), Some(1.0));
        let graph = engine.graph().graph().cloned().unwrap();
        assert_eq!(graph.master_gain(), 0.8);

        engine.set_volume(0.3).await;
        assert_eq!(graph.master_gain(), 0.3);
        assert_eq!(output.last_volume(), Some(1.0));

        // Turning processing off hands the volume back to the output.
        let off = AudioSettings {
            eq_enabled: false,
            normalize: false,
            ..Default::default()
        };
        assert_eq!(engine.apply_audio_settings(off).await, GraphStatus::Inactive);
        assert_eq!(*audio_engine.detached.lock(), 1);
        assert_eq!(output.last_volume(), Some(0.3));
    }

    #[tokio::test]
    async fn test_settings_before_playback_do_not_build_graph() {
        let mut h = harness(0);
        let status = h.engine.apply_audio_settings(settings(4)).await;
        assert_eq!(status, GraphStatus::Uninitialized);
        assert_eq!(h.engine.audio_settings().crossfade, 4);
        assert!(h.output.calls().is_empty());
    }
}
