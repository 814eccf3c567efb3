//! # Cover Cache
//!
//! Caches cover locators by audio URL so rescans do not re-resolve artwork.
//!
//! ## Overview
//!
//! - Resolution is delegated to a [`CoverResolver`]
//! - Each audio URL is resolved at most once at a time (in-flight set)
//! - Remote streams (`http://`, `https://`) are skipped; their servers
//!   already supply cover URLs in the scan result
//! - Failures are logged and leave the cache untouched, so a later request
//!   retries

use crate::models::Track;
use crate::scanner::CoverResolver;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of cached cover locators.
pub const DEFAULT_COVER_CACHE_CAPACITY: usize = 4096;

pub struct CoverCache {
    resolver: Arc<dyn CoverResolver>,
    cache: Mutex<LruCache<String, String>>,
    in_flight: Mutex<HashSet<String>>,
}

impl CoverCache {
    pub fn new(resolver: Arc<dyn CoverResolver>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            resolver,
            cache: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn get(&self, audio_url: &str) -> Option<String> {
        self.cache.lock().get(audio_url).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `cover_url` on every track that has a cached cover.
    pub fn apply(&self, tracks: &mut [Track]) {
        let mut cache = self.cache.lock();
        for track in tracks.iter_mut() {
            if let Some(cover) = cache.get(&track.audio_url) {
                track.cover_url = Some(cover.clone());
            }
        }
    }

    /// Resolve the cover for `audio_url` unless it is cached, remote or
    /// already being resolved.
    ///
    /// Returns the locator only when this call resolved a new one.
    pub async fn ensure(&self, audio_url: &str) -> Option<String> {
        if is_remote_url(audio_url) {
            return None;
        }
        if self.cache.lock().contains(audio_url) {
            return None;
        }
        if !self.in_flight.lock().insert(audio_url.to_string()) {
            return None;
        }

        let _guard = InFlightGuard {
            set: &self.in_flight,
            key: audio_url,
        };

        match self.resolver.resolve_cover(audio_url).await {
            Ok(Some(cover)) => {
                debug!(audio_url, "Resolved cover art");
                self.cache.lock().put(audio_url.to_string(), cover.clone());
                Some(cover)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(audio_url, error = %e, "Cover resolution failed");
                None
            }
        }
    }
}

struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(self.key);
    }
}

fn is_remote_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LibraryError, Result};
    use crate::models::TrackSource;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        Resolver {}

        #[async_trait]
        impl CoverResolver for Resolver {
            async fn resolve_cover(&self, audio_url: &str) -> Result<Option<String>>;
        }
    }

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CoverResolver for CountingResolver {
        async fn resolve_cover(&self, audio_url: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("data:image/png;base64,{}", audio_url.len())))
        }
    }

    fn resolver() -> Arc<CountingResolver> {
        Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_ensure_resolves_once() {
        let r = resolver();
        let cache = CoverCache::new(r.clone(), 16);

        assert!(cache.ensure("/music/a.mp3").await.is_some());
        assert!(cache.ensure("/music/a.mp3").await.is_none());
        assert_eq!(r.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get("/music/a.mp3").is_some());
    }

    #[tokio::test]
    async fn test_remote_urls_skipped() {
        let r = resolver();
        let cache = CoverCache::new(r.clone(), 16);

        assert!(cache.ensure("https://server/stream?id=1").await.is_none());
        assert_eq!(r.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_allows_retry() {
        let mut mock = MockResolver::new();
        mock.expect_resolve_cover().times(2).returning(|url| {
            Err(LibraryError::CoverFailed {
                audio_url: url.to_string(),
                message: "unreadable".to_string(),
            })
        });
        let cache = CoverCache::new(Arc::new(mock), 16);

        assert!(cache.ensure("/music/a.mp3").await.is_none());
        assert!(cache.ensure("/music/a.mp3").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_apply_fills_cached_covers() {
        let cache = CoverCache::new(resolver(), 16);
        cache.ensure("/music/a.mp3").await;

        let mut tracks = vec![
            Track {
                id: "a".to_string(),
                canonical_id: "a".to_string(),
                title: "A".to_string(),
                artist: "X".to_string(),
                album: "Y".to_string(),
                duration: 1,
                cover_url: None,
                audio_url: "/music/a.mp3".to_string(),
                folder_id: None,
                source: TrackSource::Local,
            },
            Track {
                id: "b".to_string(),
                canonical_id: "b".to_string(),
                title: "B".to_string(),
                artist: "X".to_string(),
                album: "Y".to_string(),
                duration: 1,
                cover_url: None,
                audio_url: "/music/b.mp3".to_string(),
                folder_id: None,
                source: TrackSource::Local,
            },
        ];
        cache.apply(&mut tracks);

        assert!(tracks[0].cover_url.is_some());
        assert!(tracks[1].cover_url.is_none());
    }
}
