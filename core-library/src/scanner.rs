//! # Scanner Traits
//!
//! Library content comes from host-implemented scanners, one call per source.
//! The core never walks disks or talks to servers itself unless the
//! `local-scanner` feature provides the filesystem scanner.

use crate::error::Result;
use crate::models::ScanResult;
use async_trait::async_trait;
use std::fmt;

/// A single scan source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScanSource {
    /// A configured local music folder
    LocalFolder(String),
    /// An enabled remote server, by its configured id
    RemoteServer(String),
}

impl ScanSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, ScanSource::RemoteServer(_))
    }

    pub fn key(&self) -> &str {
        match self {
            ScanSource::LocalFolder(path) => path,
            ScanSource::RemoteServer(id) => id,
        }
    }
}

impl fmt::Display for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSource::LocalFolder(path) => write!(f, "local:{}", path),
            ScanSource::RemoteServer(id) => write!(f, "remote:{}", id),
        }
    }
}

/// Produces the track and folder set of one source.
#[async_trait]
pub trait LibraryScanner: Send + Sync {
    /// Scan one source.
    ///
    /// The returned revision must change whenever the content changes and
    /// should stay equal otherwise, so unchanged libraries cost nothing
    /// downstream.
    async fn scan_source(&self, source: &ScanSource) -> Result<ScanResult>;
}

/// Resolves cover art for a track.
#[async_trait]
pub trait CoverResolver: Send + Sync {
    /// Returns an image locator (URL or data URL), or `None` when the track
    /// has no cover.
    async fn resolve_cover(&self, audio_url: &str) -> Result<Option<String>>;
}

/// Resolver for hosts without cover support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCovers;

#[async_trait]
impl CoverResolver for NoCovers {
    async fn resolve_cover(&self, _audio_url: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
