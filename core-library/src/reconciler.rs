//! # Library Reconciler
//!
//! Merges per-source scan results into one track and folder set.
//!
//! ## Overview
//!
//! Each pass scans every configured local folder and, when the remote cache
//! is stale, every enabled remote server. The per-source revisions are joined
//! and checked against the [`RevisionGate`]; an unchanged library costs one
//! string comparison and leaves the published [`LibrarySnapshot`] untouched
//! (the same `Arc` stays in place).
//!
//! ## Remote cache
//!
//! Remote results are reused for `remote_ttl`. The cache is keyed by the
//! sorted ids of the enabled servers joined with `|`; a new key forces a
//! refresh. Remote refreshes have their own in-flight flag. When the key
//! changed but a refresh cannot start, the cache is emptied for the new key
//! so removed servers disappear immediately.
//!
//! ## Failures
//!
//! A failing source never aborts a pass. Its last successful result is used
//! instead, or it is left out when it never succeeded.

use crate::config::LibraryConfig;
use crate::covers::CoverCache;
use crate::folders::FolderForest;
use crate::models::{MusicFolder, ScanResult, Track};
use crate::revision::{self, RevisionGate};
use crate::scanner::{LibraryScanner, ScanSource};
use bridge_traits::Clock;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Inputs and outputs
// =============================================================================

/// The sources a pass should cover, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySources {
    pub local_folders: Vec<String>,
    /// Ids of enabled remote servers
    pub remote_servers: Vec<String>,
}

impl LibrarySources {
    pub fn new(local_folders: Vec<String>, remote_servers: Vec<String>) -> Self {
        Self {
            local_folders,
            remote_servers,
        }
    }

    /// Identity of the enabled server set.
    pub fn server_key(&self) -> String {
        let mut ids: Vec<&str> = self.remote_servers.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.join("|")
    }
}

/// The merged library as last applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibrarySnapshot {
    pub tracks: Vec<Track>,
    pub folders: Vec<MusicFolder>,
    /// Combined revision this snapshot was built from
    pub revision: Option<String>,
    index: HashMap<String, usize>,
}

impl LibrarySnapshot {
    pub fn new(tracks: Vec<Track>, folders: Vec<MusicFolder>, revision: Option<String>) -> Self {
        let index = tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self {
            tracks,
            folders,
            revision,
            index,
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }

    pub fn track_by_audio_url(&self, audio_url: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.audio_url == audio_url)
    }

    pub fn forest(&self) -> FolderForest<'_> {
        FolderForest::new(&self.folders)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.folders.is_empty()
    }
}

/// What a pass did.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// Another pass was running; nothing was scanned
    SkippedInFlight,
    /// The combined revision matched the applied one
    Unchanged,
    /// A new snapshot was published
    Applied(Arc<LibrarySnapshot>),
}

/// A source that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: ScanSource,
    pub message: String,
    /// Whether the last good result stood in for it
    pub reused_previous: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub outcome: ReconcileOutcome,
    pub failures: Vec<SourceFailure>,
}

impl Reconciliation {
    fn skipped() -> Self {
        Self {
            outcome: ReconcileOutcome::SkippedInFlight,
            failures: Vec::new(),
        }
    }

    pub fn applied(&self) -> Option<&Arc<LibrarySnapshot>> {
        match &self.outcome {
            ReconcileOutcome::Applied(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone, Default)]
struct RemoteCache {
    results: Vec<ScanResult>,
    server_key: String,
    refreshed_at_ms: i64,
}

#[derive(Default)]
struct ReconcilerState {
    gate: RevisionGate,
    snapshot: Arc<LibrarySnapshot>,
    remote: Option<RemoteCache>,
    last_good: HashMap<ScanSource, ScanResult>,
}

pub struct LibraryReconciler {
    scanner: Arc<dyn LibraryScanner>,
    covers: Arc<CoverCache>,
    clock: Arc<dyn Clock>,
    config: LibraryConfig,
    state: Mutex<ReconcilerState>,
    pass_in_flight: AtomicBool,
    remote_in_flight: AtomicBool,
}

struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LibraryReconciler {
    pub fn new(
        scanner: Arc<dyn LibraryScanner>,
        covers: Arc<CoverCache>,
        clock: Arc<dyn Clock>,
        config: LibraryConfig,
    ) -> Self {
        Self {
            scanner,
            covers,
            clock,
            config,
            state: Mutex::new(ReconcilerState::default()),
            pass_in_flight: AtomicBool::new(false),
            remote_in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// The currently published library.
    pub fn snapshot(&self) -> Arc<LibrarySnapshot> {
        Arc::clone(&self.state.lock().snapshot)
    }

    pub fn applied_revision(&self) -> Option<String> {
        self.state.lock().gate.applied().map(str::to_string)
    }

    pub fn is_pass_in_flight(&self) -> bool {
        self.pass_in_flight.load(Ordering::Acquire)
    }

    /// First pass after startup: refreshes remotes regardless of age and
    /// publishes unconditionally, priming the revision gate.
    #[instrument(skip(self, sources))]
    pub async fn initial_load(&self, sources: &LibrarySources) -> Reconciliation {
        self.run_pass(sources, true).await
    }

    /// Periodic pass; publishes only when the combined revision changed.
    #[instrument(skip(self, sources))]
    pub async fn reconcile(&self, sources: &LibrarySources) -> Reconciliation {
        self.run_pass(sources, false).await
    }

    /// Resolve a cover and patch it into the published snapshot.
    ///
    /// Returns the locator when a new cover was resolved.
    pub async fn ensure_cover(&self, audio_url: &str) -> Option<String> {
        let cover = self.covers.ensure(audio_url).await?;

        let mut state = self.state.lock();
        if state.snapshot.tracks.iter().any(|t| t.audio_url == audio_url) {
            let mut tracks = state.snapshot.tracks.clone();
            for track in tracks.iter_mut().filter(|t| t.audio_url == audio_url) {
                track.cover_url = Some(cover.clone());
            }
            state.snapshot = Arc::new(LibrarySnapshot::new(
                tracks,
                state.snapshot.folders.clone(),
                state.snapshot.revision.clone(),
            ));
        }
        Some(cover)
    }

    async fn run_pass(&self, sources: &LibrarySources, force: bool) -> Reconciliation {
        let Some(_pass) = FlagGuard::acquire(&self.pass_in_flight) else {
            debug!("Library pass already in flight, skipping");
            return Reconciliation::skipped();
        };

        let mut failures = Vec::new();

        let local_sources: Vec<ScanSource> = sources
            .local_folders
            .iter()
            .cloned()
            .map(ScanSource::LocalFolder)
            .collect();
        let local_results = self.scan_all(&local_sources, &mut failures).await;

        self.refresh_remote(sources, force, &mut failures).await;

        let remote_results = self
            .state
            .lock()
            .remote
            .as_ref()
            .map(|cache| cache.results.clone())
            .unwrap_or_default();

        let combined = revision::combine(
            local_results.iter().map(|r| r.revision.as_str()),
            remote_results.iter().map(|r| r.revision.as_str()),
        );

        {
            let mut state = self.state.lock();
            if force {
                state.gate.prime(combined.clone());
            } else if !state.gate.admit(&combined) {
                debug!(revision = %combined, "Library unchanged");
                return Reconciliation {
                    outcome: ReconcileOutcome::Unchanged,
                    failures,
                };
            }
        }

        let snapshot = Arc::new(self.merge(
            local_results.into_iter().chain(remote_results),
            combined,
        ));

        info!(
            tracks = snapshot.tracks.len(),
            folders = snapshot.folders.len(),
            "Library updated"
        );

        self.state.lock().snapshot = Arc::clone(&snapshot);

        Reconciliation {
            outcome: ReconcileOutcome::Applied(snapshot),
            failures,
        }
    }

    async fn refresh_remote(
        &self,
        sources: &LibrarySources,
        force: bool,
        failures: &mut Vec<SourceFailure>,
    ) {
        let server_key = sources.server_key();
        let now = self.clock.unix_timestamp_millis();
        let ttl_ms = i64::try_from(self.config.remote_ttl.as_millis()).unwrap_or(i64::MAX);

        let should_refresh = !sources.remote_servers.is_empty() && {
            let state = self.state.lock();
            match &state.remote {
                None => true,
                Some(cache) => {
                    force
                        || cache.server_key != server_key
                        || now.saturating_sub(cache.refreshed_at_ms) > ttl_ms
                }
            }
        };

        let guard = if should_refresh {
            FlagGuard::acquire(&self.remote_in_flight)
        } else {
            None
        };

        if let Some(_remote) = guard {
            let remote_sources: Vec<ScanSource> = sources
                .remote_servers
                .iter()
                .cloned()
                .map(ScanSource::RemoteServer)
                .collect();
            let results = self.scan_all(&remote_sources, failures).await;

            debug!(servers = remote_sources.len(), "Remote library refreshed");
            self.state.lock().remote = Some(RemoteCache {
                results,
                server_key,
                refreshed_at_ms: self.clock.unix_timestamp_millis(),
            });
            return;
        }

        let mut state = self.state.lock();
        if let Some(cache) = state.remote.as_mut() {
            if cache.server_key != server_key {
                debug!("Enabled servers changed, clearing remote cache");
                cache.results.clear();
                cache.server_key = server_key;
            }
        }
    }

    /// Scan every source concurrently, substituting the last good result for
    /// failures. Results keep the order of `sources`.
    async fn scan_all(
        &self,
        sources: &[ScanSource],
        failures: &mut Vec<SourceFailure>,
    ) -> Vec<ScanResult> {
        let outcomes = join_all(sources.iter().map(|s| self.scanner.scan_source(s))).await;

        let mut state = self.state.lock();
        let mut results = Vec::with_capacity(sources.len());
        for (source, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    state.last_good.insert(source.clone(), result.clone());
                    results.push(result);
                }
                Err(e) => {
                    let previous = state.last_good.get(source).cloned();
                    warn!(
                        source = %source,
                        error = %e,
                        reused_previous = previous.is_some(),
                        "Library source failed"
                    );
                    failures.push(SourceFailure {
                        source: source.clone(),
                        message: e.to_string(),
                        reused_previous: previous.is_some(),
                    });
                    results.extend(previous);
                }
            }
        }
        results
    }

    fn merge<I>(&self, results: I, combined: String) -> LibrarySnapshot
    where
        I: IntoIterator<Item = ScanResult>,
    {
        let mut tracks: Vec<Track> = Vec::new();
        let mut track_index: HashMap<String, usize> = HashMap::new();
        let mut folders: Vec<MusicFolder> = Vec::new();
        let mut folder_index: HashMap<String, usize> = HashMap::new();

        for result in results {
            for track in result.tracks {
                match track_index.get(&track.id) {
                    Some(&i) => tracks[i] = track,
                    None => {
                        track_index.insert(track.id.clone(), tracks.len());
                        tracks.push(track);
                    }
                }
            }
            for folder in result.folders {
                match folder_index.get(&folder.path) {
                    Some(&i) => folders[i] = folder,
                    None => {
                        folder_index.insert(folder.path.clone(), folders.len());
                        folders.push(folder);
                    }
                }
            }
        }

        self.covers.apply(&mut tracks);
        LibrarySnapshot::new(tracks, folders, Some(combined))
    }
}
