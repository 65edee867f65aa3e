//! Traits and types for the external fetch/transcode collaborator

use crate::types::{AudioFormat, TrackTags};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Whether a metadata lookup returned one track or a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// A single playable track
    Track,
    /// A playlist, album or set with entries
    Playlist,
}

/// One entry of a playlist listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// Entry URL; empty when the provider lists the entry without one
    pub url: String,
    /// Title from the shallow listing, if the provider gave one
    pub title: Option<String>,
}

/// Metadata as reported by the collaborator, before it becomes a [`MediaItem`](crate::types::MediaItem)
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetadata {
    /// Track or playlist title ("Unknown" when missing)
    pub title: String,
    /// Artist, falling back to uploader, then "Unknown Artist"
    pub artist: String,
    /// Track or playlist
    pub kind: MetadataKind,
    /// Playlist entries in provider order (empty for tracks)
    pub entries: Vec<PlaylistEntry>,
}

/// How deep a metadata lookup goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOptions {
    /// List playlist entries without resolving each one
    ///
    /// When false the lookup is restricted to the single item the URL
    /// points at, even if it also carries a playlist parameter.
    pub shallow: bool,
}

impl MetadataOptions {
    /// Top-level lookup: a track, or a playlist listed shallowly
    pub fn shallow() -> Self {
        Self { shallow: true }
    }

    /// Lookup of one album entry
    pub fn single_entry() -> Self {
        Self { shallow: false }
    }
}

/// Progress reported while one track is fetched and converted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchProgress {
    /// Raw transfer progress, 0.0 to 100.0
    Downloading {
        /// Progress percentage
        percent: f32,
    },
    /// Raw transfer finished, conversion starts
    DownloadFinished,
    /// Conversion, thumbnail and tag embedding finished
    PostProcessed,
}

/// Everything the collaborator needs to produce one output file
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Canonical track URL
    pub url: String,
    /// Output path without extension; the collaborator appends the format's extension
    pub output_stem: PathBuf,
    /// Target audio format
    pub format: AudioFormat,
    /// Tags to embed
    pub tags: TrackTags,
}

/// Result of a successful fetch
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// Final path of the converted, tagged file
    pub path: PathBuf,
}

/// Trait for the external fetch/transcode collaborator
///
/// Implementations look up metadata for a URL and download, convert and tag
/// a single track. The engine never retries a failed call.
///
/// # Examples
///
/// ```no_run
/// use trackfetch::fetcher::{MediaFetcher, MetadataOptions, YtDlpFetcher};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = YtDlpFetcher::from_path().expect("yt-dlp binary not found");
///
/// let meta = fetcher
///     .fetch_metadata("https://soundcloud.com/artist/sets/album", MetadataOptions::shallow())
///     .await?;
/// println!("{} ({} entries)", meta.title, meta.entries.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Look up metadata for a URL
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the URL or the tool fails.
    async fn fetch_metadata(&self, url: &str, options: MetadataOptions)
    -> crate::Result<RawMetadata>;

    /// Download, convert and tag one track
    ///
    /// Progress is sent on `progress` as it happens. Implementations send
    /// [`FetchProgress::PostProcessed`] once tagging is complete; a closed
    /// receiver is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage fails. Partial output is left to the caller.
    async fn fetch_and_convert(
        &self,
        request: FetchRequest,
        progress: mpsc::UnboundedSender<FetchProgress>,
    ) -> crate::Result<FetchedFile>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
