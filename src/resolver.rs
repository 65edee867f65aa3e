//! Metadata resolution with per-batch caching and album expansion
//!
//! [`MetadataResolver::resolve`] performs the top-level lookup. Playlists come
//! back as a shallow [`AlbumListing`] so the caller can announce the album
//! before [`MetadataResolver::expand`] resolves every entry. Lookups are cached
//! per URL and lookup depth for the lifetime of one batch.

use crate::error::{Error, Result};
use crate::fetcher::{MediaFetcher, MetadataKind, MetadataOptions, PlaylistEntry, RawMetadata};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// A resolved single track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// Canonical track URL
    pub source_url: String,
}

/// Shallow album listing: title and raw entries, nothing resolved yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumListing {
    /// Album URL
    pub url: String,
    /// Album title
    pub title: String,
    /// Album artist or uploader
    pub artist: String,
    /// Raw entries in playlist order
    pub entries: Vec<PlaylistEntry>,
}

/// One available album entry after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumEntry {
    /// Position in the original playlist (0-based)
    pub position: usize,
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// Canonical track URL
    pub source_url: String,
}

/// An album after availability filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumExpansion {
    /// Album title
    pub title: String,
    /// Entries the playlist listed before filtering
    pub expected_track_count: usize,
    /// Entries that resolved, in playlist order
    pub available: Vec<AlbumEntry>,
}

impl AlbumExpansion {
    /// Entries dropped because they could not be resolved
    pub fn skipped(&self) -> usize {
        self.expected_track_count - self.available.len()
    }
}

/// Result of a top-level lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The URL points at one track
    Track(TrackInfo),
    /// The URL points at a playlist; entries still need [`MetadataResolver::expand`]
    Album(AlbumListing),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    url: String,
    shallow: bool,
}

/// Resolves URLs to track or album metadata through a [`MediaFetcher`]
///
/// Successful lookups are cached once per key; concurrent lookups of the same
/// key share one collaborator call. Failures are not cached.
pub struct MetadataResolver {
    fetcher: Arc<dyn MediaFetcher>,
    entry_concurrency: usize,
    cache: Mutex<HashMap<CacheKey, Arc<OnceCell<RawMetadata>>>>,
}

impl MetadataResolver {
    /// Create a resolver resolving at most `entry_concurrency` album entries at once
    pub fn new(fetcher: Arc<dyn MediaFetcher>, entry_concurrency: usize) -> Self {
        Self {
            fetcher,
            entry_concurrency: entry_concurrency.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached lookup
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of cached lookups
    pub async fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Resolve a top-level URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::MetadataResolution`] if the collaborator fails.
    pub async fn resolve(&self, url: &str) -> Result<Resolution> {
        let meta = self.lookup(url, MetadataOptions::shallow()).await?;

        Ok(match meta.kind {
            MetadataKind::Track => Resolution::Track(TrackInfo {
                title: meta.title,
                artist: meta.artist,
                source_url: url.to_string(),
            }),
            MetadataKind::Playlist => Resolution::Album(AlbumListing {
                url: url.to_string(),
                title: meta.title,
                artist: meta.artist,
                entries: meta.entries,
            }),
        })
    }

    /// Resolve every entry of an album, dropping the ones that fail
    ///
    /// Entries are resolved concurrently up to the configured ceiling and
    /// returned in playlist order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllTracksUnavailable`] if no entry resolves.
    pub async fn expand(&self, listing: &AlbumListing) -> Result<AlbumExpansion> {
        let expected_track_count = listing.entries.len();

        // Owned entries so the batch future stays Send when spawned
        let resolved: Vec<Option<AlbumEntry>> =
            stream::iter(listing.entries.clone().into_iter().enumerate())
                .map(|(position, entry)| async move {
                    match self.resolve_entry(position, &entry, &listing.artist).await {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            tracing::warn!(
                                album = %listing.title,
                                position,
                                error = %e,
                                "dropping unavailable album entry"
                            );
                            None
                        }
                    }
                })
                .buffered(self.entry_concurrency)
                .collect()
                .await;

        let available: Vec<AlbumEntry> = resolved.into_iter().flatten().collect();

        if available.is_empty() {
            return Err(Error::AllTracksUnavailable {
                album: listing.title.clone(),
                expected: expected_track_count,
            });
        }

        tracing::info!(
            album = %listing.title,
            expected = expected_track_count,
            available = available.len(),
            "album expanded"
        );

        Ok(AlbumExpansion {
            title: listing.title.clone(),
            expected_track_count,
            available,
        })
    }

    async fn resolve_entry(
        &self,
        position: usize,
        entry: &PlaylistEntry,
        album_artist: &str,
    ) -> Result<AlbumEntry> {
        if entry.url.is_empty() {
            return Err(Error::MetadataResolution {
                url: String::new(),
                reason: "entry has no URL".to_string(),
            });
        }

        let meta = self
            .lookup(&entry.url, MetadataOptions::single_entry())
            .await?;

        // Entry lookups without an artist inherit the album's
        let artist = if meta.artist == "Unknown Artist" {
            album_artist.to_string()
        } else {
            meta.artist
        };

        Ok(AlbumEntry {
            position,
            title: meta.title,
            artist,
            source_url: entry.url.clone(),
        })
    }

    async fn lookup(&self, url: &str, options: MetadataOptions) -> Result<RawMetadata> {
        let key = CacheKey {
            url: url.to_string(),
            shallow: options.shallow,
        };
        let cell = {
            let mut cache = self.cache.lock().await;
            cache.entry(key).or_default().clone()
        };

        let meta = cell
            .get_or_try_init(|| async {
                self.fetcher
                    .fetch_metadata(url, options)
                    .await
                    .map_err(|e| match e {
                        Error::MetadataResolution { .. } => e,
                        other => Error::MetadataResolution {
                            url: url.to_string(),
                            reason: other.to_string(),
                        },
                    })
            })
            .await?;

        Ok(meta.clone())
    }
}
