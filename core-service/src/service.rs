//! # Core Service
//!
//! The host-facing facade: one playback engine, one library reconciler and
//! the persisted settings, kept consistent with each other.
//!
//! ## Overview
//!
//! - The engine sits behind one async mutex. Host calls and timer callbacks
//!   both take that lock, so every transition observes a settled engine.
//! - A background task forwards crossfade timer events into the engine.
//! - An optional poller reconciles the library every few seconds while the
//!   window is visible.
//! - Track switches are written to the recent list; covers for the playing
//!   track are resolved in the background.

use crate::error::{CoreError, Result};
use bridge_traits::VisibilityMonitor;
use core_async::sync::mpsc::UnboundedReceiver;
use core_async::sync::{Mutex, MutexGuard};
use core_async::task::{spawn, ScopedTask};
use core_async::time::delayed_interval;
use core_library::{
    CoverCache, CoverResolver, LibraryConfig, LibraryReconciler, LibraryScanner, LibrarySnapshot,
    LibrarySources, Reconciliation, Track,
};
use core_playback::{
    AudioSettings, GraphStatus, PlaybackConfig, PlaybackEngine, PlaybackError, TimerEvent,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::settings::{AppSettings, ConfigService};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

/// Engine and library tunables.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub playback: PlaybackConfig,
    pub library: LibraryConfig,
}

struct Inner {
    engine: Mutex<PlaybackEngine>,
    reconciler: LibraryReconciler,
    settings: ConfigService,
    events: EventBus,
    visibility: Arc<dyn VisibilityMonitor>,
}

/// Primary facade exposed to host applications.
pub struct CoreService {
    inner: Arc<Inner>,
    _timer_loop: ScopedTask,
    poller: Mutex<Option<ScopedTask>>,
}

fn library_sources(settings: &AppSettings) -> LibrarySources {
    LibrarySources::new(
        settings.music_folders.clone(),
        settings
            .enabled_servers()
            .map(|server| server.id.clone())
            .collect(),
    )
}

impl CoreService {
    /// Load settings, build the engine and reconciler, and run the initial
    /// library load.
    ///
    /// # Errors
    ///
    /// Fails when `config` or `options` are invalid or the settings store
    /// cannot be read.
    #[instrument(skip_all)]
    pub async fn bootstrap(
        config: CoreConfig,
        scanner: Arc<dyn LibraryScanner>,
        covers: Arc<dyn CoverResolver>,
        options: ServiceOptions,
    ) -> Result<Self> {
        config.validate()?;
        options
            .library
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let settings = ConfigService::load(Arc::clone(&config.config_store)).await?;
        let document = settings.snapshot().await;
        let events = EventBus::new(config.event_buffer_size);

        let (engine, timers) = PlaybackEngine::new(
            Arc::clone(&config.audio_output),
            config.audio_engine.clone(),
            options.playback,
        )?;
        let engine = engine
            .with_event_bus(events.clone())
            .with_audio_settings(AudioSettings::from(&document));

        let cover_cache = Arc::new(CoverCache::new(covers, options.library.cover_cache_capacity));
        let reconciler = LibraryReconciler::new(
            scanner,
            cover_cache,
            Arc::clone(&config.clock),
            options.library,
        );

        let inner = Arc::new(Inner {
            engine: Mutex::new(engine),
            reconciler,
            settings,
            events,
            visibility: Arc::clone(&config.visibility),
        });
        let timer_loop = ScopedTask::spawn(run_timer_loop(Arc::clone(&inner), timers));

        let reconciliation = inner
            .reconciler
            .initial_load(&library_sources(&document))
            .await;
        inner.publish(&reconciliation).await;

        info!(
            tracks = inner.reconciler.snapshot().tracks.len(),
            "Core service ready"
        );
        Ok(Self {
            inner,
            _timer_loop: timer_loop,
            poller: Mutex::new(None),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Lock the engine for queue edits, volume and other direct operations.
    pub async fn engine(&self) -> MutexGuard<'_, PlaybackEngine> {
        self.inner.engine.lock().await
    }

    pub fn library(&self) -> Arc<LibrarySnapshot> {
        self.inner.reconciler.snapshot()
    }

    pub async fn settings(&self) -> AppSettings {
        self.inner.settings.snapshot().await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn transport<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut PlaybackEngine) -> BoxFuture<'a, core_playback::Result<T>>,
    {
        let (result, played) = {
            let mut engine = self.inner.engine.lock().await;
            let result = op(&mut *engine).await;
            (result, engine.drain_played())
        };
        self.inner.after_switch(played).await;
        Ok(result?)
    }

    pub async fn play_track(&self, track: Track, use_crossfade: bool) -> Result<()> {
        self.transport(|engine| Box::pin(engine.play_track(track, use_crossfade)))
            .await
    }

    pub async fn select_track(&self, track: Track) -> Result<()> {
        self.transport(|engine| Box::pin(engine.select_track(track)))
            .await
    }

    pub async fn play_manual_at(&self, index: usize) -> Result<Option<Track>> {
        self.transport(|engine| Box::pin(engine.play_manual_at(index)))
            .await
    }

    pub async fn next(&self) -> Result<Option<Track>> {
        self.transport(|engine| Box::pin(engine.next())).await
    }

    pub async fn previous(&self) -> Result<Option<Track>> {
        self.transport(|engine| Box::pin(engine.previous())).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.transport(|engine| Box::pin(engine.toggle_play_pause()))
            .await
    }

    pub async fn on_track_ended(&self) -> Result<Option<Track>> {
        self.transport(|engine| Box::pin(engine.on_track_ended()))
            .await
    }

    pub async fn on_position_changed(&self, seconds: f64) -> Result<()> {
        self.transport(|engine| Box::pin(engine.on_position_changed(seconds)))
            .await
    }

    // ========================================================================
    // Library
    // ========================================================================

    /// Run one reconciliation pass now.
    pub async fn refresh_library(&self) -> Reconciliation {
        self.inner.refresh().await
    }

    /// Reconcile every `poll_interval` while the window is visible. Calling
    /// it again restarts the poller.
    pub async fn start_library_poller(&self) {
        let inner = Arc::clone(&self.inner);
        let period = inner.reconciler.config().poll_interval;
        let task = ScopedTask::spawn(async move {
            let mut ticker = delayed_interval(period);
            loop {
                ticker.tick().await;
                if !inner.visibility.is_visible() {
                    trace!("Window hidden, skipping library poll");
                    continue;
                }
                // Overlapping passes are dropped by the reconciler.
                let pass = Arc::clone(&inner);
                spawn(async move {
                    pass.refresh().await;
                });
            }
        });
        *self.poller.lock().await = Some(task);
        debug!(period_ms = period.as_millis() as u64, "Library poller started");
    }

    pub async fn stop_library_poller(&self) {
        if self.poller.lock().await.take().is_some() {
            debug!("Library poller stopped");
        }
    }

    /// Replace the local folder list and reconcile.
    pub async fn set_music_folders(&self, folders: Vec<String>) -> Result<Reconciliation> {
        self.inner
            .settings
            .update(|settings| settings.music_folders = folders)
            .await?;
        Ok(self.inner.refresh().await)
    }

    // ========================================================================
    // Favorites and recents
    // ========================================================================

    /// Flip the favorite flag of a track. Returns the new state.
    pub async fn toggle_favorite(&self, canonical_id: &str) -> Result<bool> {
        let favorite = self
            .inner
            .settings
            .update(|settings| settings.toggle_favorite(canonical_id))
            .await?;
        debug!(canonical_id, favorite, "Favorite toggled");
        Ok(favorite)
    }

    /// Favorite tracks present in the library, in the order they were added.
    pub async fn favorites(&self) -> Vec<Track> {
        let ids = self.inner.settings.snapshot().await.favorites;
        self.tracks_by_canonical_ids(&ids)
    }

    /// Recently played tracks present in the library, most recent first.
    pub async fn recent_tracks(&self) -> Vec<Track> {
        let ids = self.inner.settings.snapshot().await.recent_tracks;
        self.tracks_by_canonical_ids(&ids)
    }

    fn tracks_by_canonical_ids(&self, ids: &[String]) -> Vec<Track> {
        let library = self.library();
        let by_canonical: HashMap<&str, &Track> = library
            .tracks
            .iter()
            .map(|track| (track.canonical_id.as_str(), track))
            .collect();
        ids.iter()
            .filter_map(|id| by_canonical.get(id.as_str()).map(|t| (*t).clone()))
            .collect()
    }

    // ========================================================================
    // Audio settings
    // ========================================================================

    /// Persist EQ, crossfade and normalize settings and apply them.
    pub async fn save_audio_settings(&self, settings: AudioSettings) -> Result<GraphStatus> {
        let persisted = settings.clone();
        self.inner
            .settings
            .update(move |document| persisted.write_to(document))
            .await?;
        let status = self.inner.engine.lock().await.apply_audio_settings(settings).await;
        Ok(status)
    }
}

impl Inner {
    async fn refresh(&self) -> Reconciliation {
        let document = self.settings.snapshot().await;
        let reconciliation = self.reconciler.reconcile(&library_sources(&document)).await;
        self.publish(&reconciliation).await;
        reconciliation
    }

    async fn publish(&self, reconciliation: &Reconciliation) {
        for failure in &reconciliation.failures {
            warn!(
                source = %failure.source,
                reused_previous = failure.reused_previous,
                message = %failure.message,
                "Library source failed"
            );
            self.emit(LibraryEvent::SourceFailed {
                source: failure.source.to_string(),
                message: failure.message.clone(),
            });
        }

        let Some(snapshot) = reconciliation.applied() else {
            return;
        };
        self.engine
            .lock()
            .await
            .update_library(Arc::clone(snapshot));
        info!(
            tracks = snapshot.tracks.len(),
            folders = snapshot.folders.len(),
            "Library applied"
        );
        self.emit(LibraryEvent::Updated {
            revision: snapshot.revision.clone().unwrap_or_default(),
            track_count: snapshot.tracks.len(),
            folder_count: snapshot.folders.len(),
        });
    }

    /// Record played tracks and resolve the current cover in the background.
    async fn after_switch(self: &Arc<Self>, played: Vec<String>) {
        if played.is_empty() {
            return;
        }
        let recorded = self
            .settings
            .update(|settings| {
                for canonical_id in &played {
                    settings.record_recent(canonical_id);
                }
            })
            .await;
        if let Err(e) = recorded {
            warn!(error = %e, "Could not record recent tracks");
        }

        let audio_url = self
            .engine
            .lock()
            .await
            .current_track()
            .filter(|track| track.cover_url.is_none())
            .map(|track| track.audio_url.clone());
        if let Some(audio_url) = audio_url {
            let inner = Arc::clone(self);
            spawn(async move {
                inner.resolve_cover(&audio_url).await;
            });
        }
    }

    async fn resolve_cover(&self, audio_url: &str) {
        if self.reconciler.ensure_cover(audio_url).await.is_none() {
            return;
        }
        let snapshot = self.reconciler.snapshot();
        self.engine.lock().await.update_library(snapshot);
        self.emit(LibraryEvent::CoverResolved {
            audio_url: audio_url.to_string(),
        });
    }

    fn emit(&self, event: LibraryEvent) {
        let _ = self.events.emit(CoreEvent::Library(event));
    }
}

async fn run_timer_loop(inner: Arc<Inner>, mut timers: UnboundedReceiver<TimerEvent>) {
    while let Some(event) = timers.recv().await {
        let (result, played) = {
            let mut engine = inner.engine.lock().await;
            let result = engine.handle_timer(event).await;
            (result, engine.drain_played())
        };
        if let Err(e) = result {
            report_timer_failure(&e);
        }
        inner.after_switch(played).await;
    }
}

fn report_timer_failure(error: &PlaybackError) {
    warn!(error = %error, transient = error.is_transient(), "Timer-driven transition failed");
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService").finish_non_exhaustive()
    }
}
