//! # Persisted Settings
//!
//! The user-facing settings document and the service that reads and writes it.
//!
//! ## Overview
//!
//! Settings live in one JSON document (camelCase keys) held by a
//! [`ConfigStore`]. The document is always read and written whole. Keys this
//! crate does not model (window chrome, theme selection) are kept in
//! [`AppSettings::extra`] so that a write from the core never drops what the
//! shell stored.
//!
//! [`ConfigService::update`] is the only write path. It serializes
//! read-modify-write cycles, re-reading the store each time so that a write
//! from another process between two updates is not lost.

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use bridge_traits::storage::ConfigStore;
use core_async::sync::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of equalizer bands in `eqValues`.
pub const EQ_BAND_COUNT: usize = 10;

/// Neutral slider position for an equalizer band.
pub const EQ_NEUTRAL: i32 = 50;

/// Maximum slider position for an equalizer band.
pub const EQ_MAX: i32 = 100;

/// Most-recently-played list length.
pub const RECENT_TRACKS_LIMIT: usize = 50;

/// Upper bound on the crossfade duration, in seconds.
pub const MAX_CROSSFADE_SECS: u32 = 30;

// ============================================================================
// Settings Document
// ============================================================================

/// The persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Local folders to scan, in display order.
    #[serde(default, alias = "music_folders")]
    pub music_folders: Vec<String>,

    /// Favorite tracks by canonical id.
    #[serde(default)]
    pub favorites: Vec<String>,

    /// Recently played canonical ids, most recent first.
    #[serde(default)]
    pub recent_tracks: Vec<String>,

    #[serde(default = "default_eq_enabled")]
    pub eq_enabled: bool,

    /// Preset name (`flat`, `bass`, ..., `custom`).
    #[serde(default = "default_eq_preset")]
    pub eq_preset: String,

    /// Band slider positions, `0..=100`, 50 is neutral.
    #[serde(default = "default_eq_values")]
    pub eq_values: Vec<i32>,

    /// Crossfade duration in seconds. Zero disables fading.
    #[serde(default = "default_crossfade")]
    pub crossfade: u32,

    /// Loudness normalization through the compressor.
    #[serde(default)]
    pub normalize: bool,

    /// Remote library servers.
    #[serde(default, alias = "navidromeServers")]
    pub remote_servers: Vec<RemoteServerConfig>,

    /// Keys owned by the shell, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_eq_enabled() -> bool {
    true
}

fn default_eq_preset() -> String {
    "flat".to_string()
}

fn default_eq_values() -> Vec<i32> {
    vec![EQ_NEUTRAL; EQ_BAND_COUNT]
}

fn default_crossfade() -> u32 {
    5
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            music_folders: Vec::new(),
            favorites: Vec::new(),
            recent_tracks: Vec::new(),
            eq_enabled: default_eq_enabled(),
            eq_preset: default_eq_preset(),
            eq_values: default_eq_values(),
            crossfade: default_crossfade(),
            normalize: false,
            remote_servers: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl AppSettings {
    /// Parse a settings document, repairing out-of-range values.
    pub fn from_json(document: &str) -> Result<Self> {
        let mut settings: AppSettings = serde_json::from_str(document)?;
        settings.sanitize();
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check invariants without repairing anything.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.eq_values.len() != EQ_BAND_COUNT {
            return Err(format!(
                "eqValues must have {} entries, found {}",
                EQ_BAND_COUNT,
                self.eq_values.len()
            ));
        }
        if let Some(v) = self.eq_values.iter().find(|v| !(0..=EQ_MAX).contains(*v)) {
            return Err(format!("eqValues entry {} is outside 0..={}", v, EQ_MAX));
        }
        if self.crossfade > MAX_CROSSFADE_SECS {
            return Err(format!(
                "crossfade must be at most {} seconds",
                MAX_CROSSFADE_SECS
            ));
        }
        if self.recent_tracks.len() > RECENT_TRACKS_LIMIT {
            return Err(format!(
                "recentTracks holds more than {} entries",
                RECENT_TRACKS_LIMIT
            ));
        }
        Ok(())
    }

    /// Clamp and pad fields so that [`validate`](Self::validate) passes.
    pub fn sanitize(&mut self) {
        if let Err(reason) = self.validate() {
            warn!(%reason, "Repairing settings document");
        }
        self.eq_values.resize(EQ_BAND_COUNT, EQ_NEUTRAL);
        for value in &mut self.eq_values {
            *value = (*value).clamp(0, EQ_MAX);
        }
        self.crossfade = self.crossfade.min(MAX_CROSSFADE_SECS);
        self.recent_tracks.truncate(RECENT_TRACKS_LIMIT);
    }

    /// Move `canonical_id` to the front of the recent list, capped at
    /// [`RECENT_TRACKS_LIMIT`].
    pub fn record_recent(&mut self, canonical_id: &str) {
        self.recent_tracks.retain(|id| id != canonical_id);
        self.recent_tracks.insert(0, canonical_id.to_string());
        self.recent_tracks.truncate(RECENT_TRACKS_LIMIT);
    }

    /// Add or remove `canonical_id` from favorites. Returns the new state.
    pub fn toggle_favorite(&mut self, canonical_id: &str) -> bool {
        if let Some(pos) = self.favorites.iter().position(|id| id == canonical_id) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(canonical_id.to_string());
            true
        }
    }

    pub fn is_favorite(&self, canonical_id: &str) -> bool {
        self.favorites.iter().any(|id| id == canonical_id)
    }

    /// Enabled remote servers in configured order.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &RemoteServerConfig> {
        self.remote_servers.iter().filter(|server| server.enabled)
    }
}

/// A remote library server entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServerConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub token: String,
    pub salt: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub enabled: bool,
}

impl fmt::Debug for RemoteServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteServerConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &redact_if_sensitive("token", &self.token))
            .field("salt", &redact_if_sensitive("salt", &self.salt))
            .field("has_api_key", &self.api_key.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

// ============================================================================
// Config Service
// ============================================================================

/// Serialized access to the settings document.
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    current: Mutex<AppSettings>,
}

impl ConfigService {
    /// Load the document from `store`, falling back to defaults when nothing
    /// has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store cannot be read and
    /// [`Error::MalformedSettings`] if the document is not valid JSON.
    pub async fn load(store: Arc<dyn ConfigStore>) -> Result<Self> {
        let settings = Self::read(store.as_ref()).await?.unwrap_or_default();
        debug!(
            folders = settings.music_folders.len(),
            servers = settings.remote_servers.len(),
            "Settings loaded"
        );
        Ok(Self {
            store,
            current: Mutex::new(settings),
        })
    }

    async fn read(store: &dyn ConfigStore) -> Result<Option<AppSettings>> {
        match store.load().await? {
            Some(document) => Ok(Some(AppSettings::from_json(&document)?)),
            None => Ok(None),
        }
    }

    /// Last settings read or written by this service.
    pub async fn snapshot(&self) -> AppSettings {
        self.current.lock().await.clone()
    }

    /// Re-read the store and apply `mutate`, then write the result back.
    ///
    /// Updates are serialized; a concurrent caller waits for the previous
    /// write to finish. If the write fails the cached snapshot is unchanged.
    pub async fn update<F, R>(&self, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut AppSettings) -> R,
    {
        let mut current = self.current.lock().await;

        let mut next = match Self::read(self.store.as_ref()).await {
            Ok(Some(stored)) => stored,
            Ok(None) => current.clone(),
            Err(Error::MalformedSettings(err)) => {
                warn!(error = %err, "Stored settings are malformed, rewriting from memory");
                current.clone()
            }
            Err(err) => return Err(err),
        };

        let output = mutate(&mut next);
        next.sanitize();
        self.store.save(&next.to_json()?).await?;
        *current = next;
        Ok(output)
    }
}

impl fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigService").finish_non_exhaustive()
    }
}
