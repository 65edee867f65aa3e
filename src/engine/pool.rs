//! Bounded download worker pools
//!
//! A [`Downloader`] turns one [`MediaItem`] into one output file by driving
//! the fetch collaborator and translating its progress into status updates.
//! A [`DownloadPool`] bounds how many downloads run at once.

use super::accounting::ProgressAccounting;
use crate::error::{Error, Result};
use crate::fetcher::{FetchProgress, FetchRequest, MediaFetcher};
use crate::types::{AudioFormat, DownloadStatus, MediaItem};
use crate::utils::{get_unique_path, sanitize_filename, track_tags};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinSet;

/// Per-batch output settings
#[derive(Debug, Clone)]
pub(crate) struct DownloadSettings {
    pub format: AudioFormat,
    pub destination: PathBuf,
    /// Wait between the post-processing signal and `Done`
    pub finalize_delay: Duration,
    /// Date tag shared by every file of the batch
    pub tag_date: String,
}

/// How one download ended
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DownloadOutcome {
    Done(PathBuf),
    Failed(String),
}

/// Runs single downloads and reports their status
pub(crate) struct Downloader {
    fetcher: Arc<dyn MediaFetcher>,
    accounting: Arc<ProgressAccounting>,
    settings: DownloadSettings,
    /// Output paths handed out in this batch whose files may not exist yet
    reserved: Mutex<HashSet<PathBuf>>,
}

impl Downloader {
    pub(crate) fn new(
        fetcher: Arc<dyn MediaFetcher>,
        accounting: Arc<ProgressAccounting>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            fetcher,
            accounting,
            settings,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Download one item. Never retries; a failure is final for this batch.
    pub(crate) async fn download(&self, item: MediaItem) -> DownloadOutcome {
        match self.try_download(&item).await {
            Ok(path) => {
                self.accounting.set_status(item.id, DownloadStatus::Done).await;
                tracing::info!(item_id = %item.id, path = %path.display(), "track saved");
                DownloadOutcome::Done(path)
            }
            Err(e) => {
                let reason = failure_reason(&e);
                tracing::error!(
                    item_id = %item.id,
                    url = %item.source_url,
                    error = %e,
                    "track download failed"
                );
                self.accounting
                    .set_status(
                        item.id,
                        DownloadStatus::Failed {
                            reason: reason.clone(),
                        },
                    )
                    .await;
                DownloadOutcome::Failed(reason)
            }
        }
    }

    async fn try_download(&self, item: &MediaItem) -> Result<PathBuf> {
        let output_stem = self.reserve_output(item).await?;

        self.accounting
            .set_status(item.id, DownloadStatus::Downloading { percent: 0.0 })
            .await;

        let request = FetchRequest {
            url: item.source_url.clone(),
            output_stem,
            format: self.settings.format,
            tags: track_tags(item, &self.settings.tag_date),
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let forward = async {
            let mut post_processed = false;
            // Ends once every sender is gone, including any the collaborator
            // kept alive to report post-processing after returning
            while let Some(progress) = progress_rx.recv().await {
                match progress {
                    FetchProgress::Downloading { percent } => {
                        self.accounting
                            .set_status(item.id, DownloadStatus::Downloading { percent })
                            .await;
                    }
                    FetchProgress::DownloadFinished => {
                        self.accounting
                            .set_status(item.id, DownloadStatus::Converting)
                            .await;
                    }
                    FetchProgress::PostProcessed => post_processed = true,
                }
            }
            post_processed
        };

        let (result, post_processed) = tokio::join!(
            self.fetcher.fetch_and_convert(request, progress_tx),
            forward
        );
        let file = result?;

        if !post_processed {
            tracing::warn!(item_id = %item.id, "fetcher returned without a post-processing signal");
        }
        self.accounting
            .set_status(item.id, DownloadStatus::Converting)
            .await;

        // Tags land on disk slightly after the collaborator reports them
        tokio::time::sleep(self.settings.finalize_delay).await;
        Ok(file.path)
    }

    /// Pick a collision-free output path and return it without extension
    async fn reserve_output(&self, item: &MediaItem) -> Result<PathBuf> {
        let mut dir = self.settings.destination.clone();
        if let Some(album) = &item.album_title {
            dir.push(sanitize_filename(album));
        }
        tokio::fs::create_dir_all(&dir).await?;

        let desired = dir.join(format!(
            "{}.{}",
            sanitize_filename(&item.title),
            self.settings.format.extension()
        ));

        let mut reserved = self.reserved.lock().await;
        let unique = get_unique_path(&desired, &reserved)?;
        reserved.insert(unique.clone());
        Ok(unique.with_extension(""))
    }
}

fn failure_reason(error: &Error) -> String {
    match error {
        Error::Download { reason } => reason.clone(),
        other => other.to_string(),
    }
}

/// A pool of download workers with an optional concurrency ceiling
#[derive(Clone)]
pub(crate) struct DownloadPool {
    limiter: Option<Arc<Semaphore>>,
    downloader: Arc<Downloader>,
}

impl DownloadPool {
    /// `None` runs every submission immediately
    pub(crate) fn new(downloader: Arc<Downloader>, ceiling: Option<usize>) -> Self {
        Self {
            limiter: ceiling.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            downloader,
        }
    }

    /// Run one download once a slot is free
    pub(crate) async fn submit(&self, item: MediaItem) -> DownloadOutcome {
        let _permit = match &self.limiter {
            Some(limiter) => match limiter.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return DownloadOutcome::Failed("download pool closed".to_string()),
            },
            None => None,
        };
        self.downloader.download(item).await
    }

    /// Run many downloads, starting them in the order given
    ///
    /// Slots are acquired before each spawn, so items start in submission
    /// order even though they finish in any order. Outcomes are returned in
    /// completion order. Dropping the future aborts downloads still running.
    pub(crate) async fn run_all(&self, items: Vec<MediaItem>) -> Vec<DownloadOutcome> {
        let mut workers = JoinSet::new();
        let mut outcomes = Vec::with_capacity(items.len());

        for item in items {
            let permit = match &self.limiter {
                Some(limiter) => match limiter.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        outcomes.push(DownloadOutcome::Failed("download pool closed".to_string()));
                        continue;
                    }
                },
                None => None,
            };

            let downloader = self.downloader.clone();
            workers.spawn(async move {
                let outcome = downloader.download(item).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "download worker panicked");
                    outcomes.push(DownloadOutcome::Failed(e.to_string()));
                }
            }
        }
        outcomes
    }
}
