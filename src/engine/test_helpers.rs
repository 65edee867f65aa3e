//! Shared test helpers: scripted in-memory collaborators for engine, resolver and selection tests.

use crate::error::{Error, Result};
use crate::fetcher::{
    FetchProgress, FetchRequest, FetchedFile, MediaFetcher, MetadataKind, MetadataOptions,
    PlaylistEntry, RawMetadata,
};
use crate::selection::{SelectionPrompt, SelectionResponse, TrackSelector};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Tracks how many calls run at once and the peak seen
#[derive(Default)]
pub(crate) struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Fetcher answering from a fixed script
///
/// URLs without a scripted answer fail metadata lookup. Downloads succeed
/// unless the URL was marked failing; each writes an empty output file.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    metadata: HashMap<String, RawMetadata>,
    failing_downloads: HashMap<String, String>,
    metadata_delay: Duration,
    download_delay: Duration,
    metadata_calls: Mutex<HashMap<String, usize>>,
    downloads: Mutex<Vec<FetchRequest>>,
    metadata_probe: ConcurrencyProbe,
    download_probe: ConcurrencyProbe,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_track(mut self, url: &str, title: &str, artist: &str) -> Self {
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

    pub(crate) fn with_album(mut self, url: &str, title: &str, entry_urls: &[String]) -> Self {
        self.metadata.insert(
            url.to_string(),
            RawMetadata {
                title: title.to_string(),
                artist: "Band".to_string(),
                kind: MetadataKind::Playlist,
                entries: entry_urls
                    .iter()
                    .map(|url| PlaylistEntry {
                        url: url.clone(),
                        title: None,
                    })
                    .collect(),
            },
        );
        self
    }

    pub(crate) fn with_download_failure(mut self, url: &str, reason: &str) -> Self {
        self.failing_downloads
            .insert(url.to_string(), reason.to_string());
        self
    }

    pub(crate) fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = delay;
        self
    }

    pub(crate) fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    pub(crate) fn metadata_calls(&self, url: &str) -> usize {
        self.metadata_calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn max_concurrent_metadata(&self) -> usize {
        self.metadata_probe.peak()
    }

    pub(crate) fn max_concurrent_downloads(&self) -> usize {
        self.download_probe.peak()
    }

    pub(crate) fn downloaded_urls(&self) -> Vec<String> {
        self.downloads
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub(crate) fn output_stems(&self) -> HashSet<PathBuf> {
        self.downloads
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.output_stem.clone())
            .collect()
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch_metadata(&self, url: &str, _options: MetadataOptions) -> Result<RawMetadata> {
        *self
            .metadata_calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        self.metadata_probe.enter();
        if !self.metadata_delay.is_zero() {
            tokio::time::sleep(self.metadata_delay).await;
        }
        self.metadata_probe.exit();

        self.metadata
            .get(url)
            .cloned()
            .ok_or_else(|| Error::MetadataResolution {
                url: url.to_string(),
                reason: "Video unavailable in your country".to_string(),
            })
    }

    async fn fetch_and_convert(
        &self,
        request: FetchRequest,
        progress: mpsc::UnboundedSender<FetchProgress>,
    ) -> Result<FetchedFile> {
        self.downloads.lock().unwrap().push(request.clone());

        self.download_probe.enter();
        progress
            .send(FetchProgress::Downloading { percent: 50.0 })
            .ok();
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        self.download_probe.exit();

        if let Some(reason) = self.failing_downloads.get(&request.url) {
            return Err(Error::Download {
                reason: reason.clone(),
            });
        }

        progress.send(FetchProgress::DownloadFinished).ok();

        let path = PathBuf::from(format!(
            "{}.{}",
            request.output_stem.to_string_lossy(),
            request.format.extension()
        ));
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, b"").await?;

        // Tag embedding reports completion after the call itself has returned
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            progress.send(FetchProgress::PostProcessed).ok();
        });

        Ok(FetchedFile { path })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Selector replaying a fixed list of responses, then canceling
#[derive(Default)]
pub(crate) struct ScriptedSelector {
    responses: Mutex<VecDeque<SelectionResponse>>,
    prompts: Mutex<Vec<SelectionPrompt>>,
}

impl ScriptedSelector {
    pub(crate) fn new(responses: impl IntoIterator<Item = SelectionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<SelectionPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackSelector for ScriptedSelector {
    async fn request_track_selection(&self, prompt: SelectionPrompt) -> SelectionResponse {
        self.prompts.lock().unwrap().push(prompt);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SelectionResponse::Canceled)
    }
}
