//! In-memory collaborators standing in for yt-dlp and the UI

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use trackfetch::fetcher::{
    FetchProgress, FetchRequest, FetchedFile, MediaFetcher, MetadataKind, MetadataOptions,
    PlaylistEntry, RawMetadata,
};
use trackfetch::{Config, Error, SelectionPrompt, SelectionResponse, TrackSelector};

/// Fast timings so a batch finishes in milliseconds
pub fn fast_config(download_dir: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = download_dir.to_path_buf();
    config.download.finalize_delay = Duration::from_millis(5);
    config.monitor.poll_interval = Duration::from_millis(10);
    config.monitor.stall_ticks = 500;
    config.monitor.batch_timeout = Duration::from_secs(30);
    config
}

/// Fake provider catalog
///
/// Unknown URLs fail metadata lookup the way an unavailable video does.
#[derive(Default)]
pub struct FakeCatalog {
    metadata: HashMap<String, RawMetadata>,
    broken: HashMap<String, String>,
    downloads: Mutex<Vec<FetchRequest>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(mut self, url: &str, title: &str, artist: &str) -> Self {
        self.metadata.insert(
            url.to_string(),
            RawMetadata {
                title: title.to_string(),
                artist: artist.to_string(),
                kind: MetadataKind::Track,
                entries: Vec::new(),
            },
        );
        self
    }

    /// Register a playlist and a track for every entry that is not `None`
    pub fn album(mut self, url: &str, title: &str, artist: &str, tracks: &[Option<&str>]) -> Self {
        let mut entries = Vec::with_capacity(tracks.len());
        for (i, track) in tracks.iter().enumerate() {
            let entry_url = format!("{url}/track-{i}");
            if let Some(track_title) = track {
                self = self.track(&entry_url, track_title, "Unknown Artist");
            }
            entries.push(PlaylistEntry {
                url: entry_url,
                title: track.map(str::to_string),
            });
        }
        self.metadata.insert(
            url.to_string(),
            RawMetadata {
                title: title.to_string(),
                artist: artist.to_string(),
                kind: MetadataKind::Playlist,
                entries,
            },
        );
        self
    }

    /// Make the download of `url` fail with `reason`
    pub fn broken(mut self, url: &str, reason: &str) -> Self {
        self.broken.insert(url.to_string(), reason.to_string());
        self
    }

    pub fn downloads(&self) -> Vec<FetchRequest> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for FakeCatalog {
    async fn fetch_metadata(
        &self,
        url: &str,
        _options: MetadataOptions,
    ) -> trackfetch::Result<RawMetadata> {
        self.metadata
            .get(url)
            .cloned()
            .ok_or_else(|| Error::MetadataResolution {
                url: url.to_string(),
                reason: "Video unavailable".to_string(),
            })
    }

    async fn fetch_and_convert(
        &self,
        request: FetchRequest,
        progress: mpsc::UnboundedSender<FetchProgress>,
    ) -> trackfetch::Result<FetchedFile> {
        self.downloads.lock().unwrap().push(request.clone());
        progress.send(FetchProgress::Downloading { percent: 100.0 }).ok();

        if let Some(reason) = self.broken.get(&request.url) {
            return Err(Error::Download {
                reason: reason.clone(),
            });
        }
        progress.send(FetchProgress::DownloadFinished).ok();

        let path = PathBuf::from(format!(
            "{}.{}",
            request.output_stem.display(),
            request.format.extension()
        ));
        tokio::fs::write(&path, request.tags.title.as_bytes()).await?;
        progress.send(FetchProgress::PostProcessed).ok();
        Ok(FetchedFile { path })
    }

    fn name(&self) -> &'static str {
        "fake-catalog"
    }
}

/// Selector answering per album title; unknown albums are canceled
#[derive(Default)]
pub struct AnswersByAlbum {
    answers: HashMap<String, SelectionResponse>,
    seen: Mutex<Vec<SelectionPrompt>>,
}

impl AnswersByAlbum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, album_title: &str, response: SelectionResponse) -> Self {
        self.answers.insert(album_title.to_string(), response);
        self
    }

    pub fn seen(&self) -> Vec<SelectionPrompt> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackSelector for AnswersByAlbum {
    async fn request_track_selection(&self, prompt: SelectionPrompt) -> SelectionResponse {
        let response = self
            .answers
            .get(&prompt.album_title)
            .cloned()
            .unwrap_or(SelectionResponse::Canceled);
        self.seen.lock().unwrap().push(prompt);
        response
    }
}
