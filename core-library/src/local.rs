//! # Local Folder Scanner
//!
//! Filesystem implementation of [`LibraryScanner`] and [`CoverResolver`],
//! available with the `local-scanner` feature.
//!
//! ## Overview
//!
//! - Walks a folder tree in file-name order with `walkdir`
//! - Reads tags with `lofty`; the title is always the file stem
//! - Fingerprints the tree (paths, modification times, sizes) with SHA-256
//!   so an untouched folder reports the same revision on every scan
//! - Keeps parsed tracks per root, keyed by path, and reuses them while the
//!   file's modification time and size are unchanged
//! - Remote sources are forwarded to an optional delegate scanner
//!
//! All blocking work runs on the blocking pool.

use crate::error::{LibraryError, Result};
use crate::models::{MusicFolder, ScanResult, Track, TrackSource};
use crate::scanner::{CoverResolver, LibraryScanner, ScanSource};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use core_async::task::spawn_blocking;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Extensions treated as audio, compared lowercase.
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "m4a", "aac"];

/// Files above this size are listed without reading their tags.
const MAX_TAG_PARSE_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Embedded pictures above this size are ignored.
const MAX_COVER_BYTES: usize = 5 * 1024 * 1024;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";
const UNREADABLE: &str = "Unknown";

#[derive(Clone)]
struct CachedTrack {
    track: Track,
    modified: u64,
    size: u64,
}

type ParseCache = HashMap<String, HashMap<String, CachedTrack>>;

/// Scans local music folders.
#[derive(Clone, Default)]
pub struct LocalFolderScanner {
    cache: Arc<Mutex<ParseCache>>,
    remote: Option<Arc<dyn LibraryScanner>>,
}

impl LocalFolderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward remote sources to `scanner`.
    pub fn with_remote(mut self, scanner: Arc<dyn LibraryScanner>) -> Self {
        self.remote = Some(scanner);
        self
    }

    /// Number of parsed tracks kept for `root`.
    pub fn cached_track_count(&self, root: &str) -> usize {
        let key = root_key(&canonical_root(root));
        self.cache.lock().get(&key).map(HashMap::len).unwrap_or(0)
    }

    async fn scan_folder(&self, root: &str) -> Result<ScanResult> {
        let cache = Arc::clone(&self.cache);
        let root = root.to_string();
        spawn_blocking(move || scan_folder_blocking(&root, &cache))
            .await
            .map_err(|e| LibraryError::Task(e.to_string()))?
    }
}

#[async_trait]
impl LibraryScanner for LocalFolderScanner {
    #[instrument(skip(self, source), fields(source = %source))]
    async fn scan_source(&self, source: &ScanSource) -> Result<ScanResult> {
        match source {
            ScanSource::LocalFolder(path) => self.scan_folder(path).await,
            ScanSource::RemoteServer(id) => match &self.remote {
                Some(remote) => remote.scan_source(source).await,
                None => Err(LibraryError::ScanFailed {
                    source_id: id.clone(),
                    message: "no remote scanner configured".to_string(),
                }),
            },
        }
    }
}

fn canonical_root(path: &str) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path))
}

fn root_key(root: &Path) -> String {
    root.to_string_lossy().to_lowercase()
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn file_stamp(path: &Path) -> Option<(u64, u64)> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok().map(unix_seconds).unwrap_or(0);
    Some((modified, meta.len()))
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn scan_folder_blocking(root: &str, cache: &Mutex<ParseCache>) -> Result<ScanResult> {
    let root_buf = canonical_root(root);
    if !root_buf.is_dir() {
        return Err(LibraryError::ScanFailed {
            source_id: root.to_string(),
            message: "folder does not exist".to_string(),
        });
    }
    let root_path = root_buf.as_path();
    let cache_key = root_key(root_path);

    let mut previous = std::mem::take(cache.lock().entry(cache_key.clone()).or_default());
    let mut retained: HashMap<String, CachedTrack> = HashMap::with_capacity(previous.len());

    let mut tracks = Vec::new();
    let mut folders: Vec<MusicFolder> = Vec::new();
    let mut folder_ids: HashMap<String, String> = HashMap::new();
    let mut folder_index: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut hasher = Sha256::new();
    let mut reparsed = 0usize;

    for entry in WalkDir::new(root_path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let path_str = path.to_string_lossy().into_owned();
        let path_key = path_str.to_lowercase();

        if entry.file_type().is_dir() {
            if path == root_path {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root_path) else {
                continue;
            };
            let parent_id = if relative.components().count() == 1 {
                None
            } else {
                path.parent()
                    .and_then(|parent| folder_ids.get(&parent.to_string_lossy().to_lowercase()))
                    .cloned()
            };

            folders.push(MusicFolder {
                id: path_str.clone(),
                parent_id,
                name: path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned(),
                path: path_str.clone(),
                track_count: 0,
                source: TrackSource::Local,
            });
            folder_index.insert(path_str.clone(), folders.len() - 1);
            folder_ids.insert(path_key.clone(), path_str);

            hasher.update(path_key.as_bytes());
            if let Some((modified, _)) = file_stamp(path) {
                hasher.update(modified.to_le_bytes());
            }
        } else if entry.file_type().is_file() {
            if !is_audio_file(path) {
                continue;
            }
            let Some((modified, size)) = file_stamp(path) else {
                continue;
            };

            hasher.update(path_key.as_bytes());
            hasher.update(modified.to_le_bytes());
            hasher.update(size.to_le_bytes());

            let Some(parent) = path.parent() else {
                continue;
            };
            let folder_id = match parent.strip_prefix(root_path) {
                Ok(rel) if rel.components().count() == 0 => None,
                Ok(_) => folder_ids
                    .get(&parent.to_string_lossy().to_lowercase())
                    .cloned(),
                Err(_) => None,
            };

            if let Some(index) = folder_id.as_ref().and_then(|id| folder_index.get(id)) {
                folders[*index].track_count += 1;
            }

            let mut track = match previous.remove(&path_str) {
                Some(cached) if cached.modified == modified && cached.size == size => {
                    let mut track = cached.track;
                    track.folder_id = folder_id;
                    track
                }
                _ => {
                    reparsed += 1;
                    read_track(path, size, folder_id)
                }
            };
            track.cover_url = None;

            seen.insert(path_str.clone());
            retained.insert(
                path_str,
                CachedTrack {
                    track: track.clone(),
                    modified,
                    size,
                },
            );
            tracks.push(track);
        }
    }

    let digest = hasher.finalize();
    let revision = digest[..8]
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<String>();

    retained.retain(|path, _| seen.contains(path));
    cache.lock().insert(cache_key, retained);

    debug!(
        root,
        tracks = tracks.len(),
        folders = folders.len(),
        reparsed,
        revision = %revision,
        "Scanned local folder"
    );

    Ok(ScanResult {
        tracks,
        folders,
        revision,
    })
}

fn read_track(path: &Path, size: u64, folder_id: Option<String>) -> Track {
    let path_str = path.to_string_lossy().into_owned();
    let mut track = Track {
        id: path_str.clone(),
        canonical_id: path_str.clone(),
        title: file_stem(path),
        artist: UNREADABLE.to_string(),
        album: UNREADABLE.to_string(),
        duration: 0,
        cover_url: None,
        audio_url: path_str,
        folder_id,
        source: TrackSource::Local,
    };

    if size > MAX_TAG_PARSE_BYTES {
        return track;
    }

    let parsed = Probe::open(path).and_then(|tagged| tagged.read());
    match parsed {
        Ok(tagged_file) => {
            let tag = tagged_file.primary_tag();
            track.artist = tag
                .and_then(|t| t.artist().map(|s| s.to_string()))
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
            track.album = tag
                .and_then(|t| t.album().map(|s| s.to_string()))
                .unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
            track.duration = tagged_file.properties().duration().as_secs();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read tags");
        }
    }
    track
}

/// Reads the first embedded picture and returns it as a base64 data URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedCoverResolver;

#[async_trait]
impl CoverResolver for EmbeddedCoverResolver {
    async fn resolve_cover(&self, audio_url: &str) -> Result<Option<String>> {
        let path = PathBuf::from(audio_url);
        spawn_blocking(move || read_embedded_cover(&path))
            .await
            .map_err(|e| LibraryError::Task(e.to_string()))?
    }
}

fn read_embedded_cover(path: &Path) -> Result<Option<String>> {
    let tagged_file = Probe::open(path)
        .and_then(|tagged| tagged.read())
        .map_err(|e| LibraryError::CoverFailed {
            audio_url: path.to_string_lossy().into_owned(),
            message: e.to_string(),
        })?;

    let Some(picture) = tagged_file
        .primary_tag()
        .and_then(|tag| tag.pictures().first())
    else {
        return Ok(None);
    };

    if picture.data().is_empty() || picture.data().len() > MAX_COVER_BYTES {
        return Ok(None);
    }

    let mime = picture
        .mime_type()
        .map(|m| m.as_str())
        .unwrap_or("image/jpeg");
    Ok(Some(format!(
        "data:{};base64,{}",
        mime,
        BASE64_STANDARD.encode(picture.data())
    )))
}
