//! Domain models for the music library
//!
//! Tracks and folders are produced by scanners, merged by the reconciler and
//! handed to the playback engine as cloned values.

use bridge_traits::MediaSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Source
// =============================================================================

/// Where a track or folder came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    #[default]
    Local,
    #[serde(alias = "navidrome")]
    Remote,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Local => "local",
            TrackSource::Remote => "remote",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A playable track.
///
/// `id` is only unique within its source and may change across rescans.
/// `canonical_id` is the stable identity used for favorites and recents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub canonical_id: String,
    pub title: String,
    /// May hold several artists separated by `/` or `,`
    pub artist: String,
    pub album: String,
    /// Duration in seconds
    pub duration: u64,
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Opaque locator handed to the output channel
    pub audio_url: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub source: TrackSource,
}

impl Track {
    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Track id cannot be empty".to_string());
        }
        if self.canonical_id.trim().is_empty() {
            return Err("Track canonical id cannot be empty".to_string());
        }
        if self.audio_url.trim().is_empty() {
            return Err("Track audio url cannot be empty".to_string());
        }
        Ok(())
    }

    /// Individual artist names, split on `/` and `,`.
    pub fn artists(&self) -> Vec<&str> {
        self.artist
            .split(['/', ','])
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Whether `name` is one of this track's artists (case-insensitive).
    pub fn has_artist(&self, name: &str) -> bool {
        let target = name.trim().to_lowercase();
        self.artists()
            .iter()
            .any(|artist| artist.to_lowercase() == target)
    }

    /// Title with a redundant "Artist - " prefix removed.
    ///
    /// The prefix is stripped when it shares at least 60% of its words with
    /// the artist field, or when it reads like an artist list on its own.
    pub fn display_title(&self) -> String {
        let title = self.title.trim();
        let artist = self.artist.trim();
        if title.is_empty() || artist.is_empty() {
            return title.to_string();
        }

        let hit = TITLE_SEPARATORS
            .iter()
            .filter_map(|sep| title.find(sep).map(|at| (at, *sep)))
            .min_by_key(|(at, _)| *at);

        let Some((at, sep)) = hit else {
            return title.to_string();
        };

        let left = title[..at].trim();
        let right = title[at + sep.len()..].trim();
        if left.is_empty() || right.is_empty() {
            return title.to_string();
        }

        let left_words = artist_words(left);
        let artist_words = artist_words(artist);

        if looks_like_artist_list(left) || overlap_ratio(&left_words, &artist_words) >= 0.6 {
            right.to_string()
        } else {
            title.to_string()
        }
    }

    /// The locator as the output channel expects it.
    pub fn media_source(&self) -> MediaSource {
        if self.audio_url.starts_with("http://") || self.audio_url.starts_with("https://") {
            MediaSource::RemoteStream {
                url: self.audio_url.clone(),
            }
        } else {
            MediaSource::LocalFile {
                path: PathBuf::from(&self.audio_url),
            }
        }
    }
}

const TITLE_SEPARATORS: [&str; 4] = [" - ", " \u{2013} ", " \u{2014} ", " : "];
const FEATURE_WORDS: [&str; 5] = ["feat", "ft", "featuring", "with", "x"];

fn words(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_ascii_lowercase())
}

fn artist_words(value: &str) -> HashSet<String> {
    words(value)
        .filter(|word| !FEATURE_WORDS.contains(&word.as_str()))
        .collect()
}

fn looks_like_artist_list(value: &str) -> bool {
    value.contains([',', '/', '&']) || words(value).any(|w| FEATURE_WORDS.contains(&w.as_str()))
}

fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    common as f64 / a.len().max(b.len()) as f64
}

/// A folder in the library forest. Parents are referenced by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicFolder {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub track_count: usize,
    #[serde(default)]
    pub source: TrackSource,
}

impl MusicFolder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// One scanner's answer for a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub tracks: Vec<Track>,
    pub folders: Vec<MusicFolder>,
    /// Opaque fingerprint; equal fingerprints mean equal content
    pub revision: String,
}
