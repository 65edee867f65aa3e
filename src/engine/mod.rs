//! Batch orchestration split into focused submodules.
//!
//! The [`BatchCoordinator`] is the entry point. The work it drives lives in:
//! - `accounting` - Single-lock batch state and outcome claiming
//! - `batch` - Per-URL worker flow
//! - `album` - Album expansion, selection and download
//! - `pool` - Bounded download pools and output naming
//! - `monitor` - Polling completion detection

mod accounting;
mod album;
mod batch;
mod monitor;
mod pool;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{MediaFetcher, YtDlpFetcher};
use crate::resolver::MetadataResolver;
use crate::selection::{SelectAll, SelectionGate, TrackSelector};
use crate::types::{AudioFormat, BatchOutcome, BatchReport, BatchRequest, Event};
use crate::{urls, utils};
use accounting::ProgressAccounting;
use batch::{BatchContext, process_entry};
use monitor::{MonitorVerdict, run_monitor};
use pool::{DownloadPool, DownloadSettings, Downloader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Releases the busy flag when a batch ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Top-level entry point (cloneable - all fields are Arc-wrapped)
///
/// Runs one batch at a time: validates the submitted lines, resolves
/// metadata, asks for album track selections, downloads through bounded
/// pools and reports the outcome.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use trackfetch::{BatchCoordinator, BatchRequest, Config, SelectAll};
///
/// # #[tokio::main]
/// # async fn main() -> trackfetch::Result<()> {
/// let coordinator = BatchCoordinator::from_config(Config::default(), Arc::new(SelectAll))?;
///
/// let mut events = coordinator.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// });
///
/// let report = coordinator
///     .submit_batch(BatchRequest::from_text("https://soundcloud.com/artist/track"))
///     .await?;
/// println!("{} of {} downloaded", report.succeeded, report.total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BatchCoordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn MediaFetcher>,
    gate: SelectionGate,
    resolver: Arc<MetadataResolver>,
    event_tx: broadcast::Sender<Event>,
    busy: Arc<AtomicBool>,
}

impl BatchCoordinator {
    /// Create a coordinator with explicit collaborators
    ///
    /// When `prompt_track_selection` is disabled in the config, `selector` is
    /// ignored and every available album track is downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(
        config: Config,
        fetcher: Arc<dyn MediaFetcher>,
        selector: Arc<dyn TrackSelector>,
    ) -> Result<Self> {
        config.validate()?;

        let selector: Arc<dyn TrackSelector> = if config.download.prompt_track_selection {
            selector
        } else {
            Arc::new(SelectAll)
        };

        // Buffer of 1000 events so slow subscribers only lag on huge batches
        let (event_tx, _rx) = broadcast::channel(1000);

        let resolver = Arc::new(MetadataResolver::new(
            fetcher.clone(),
            config.resolver.entry_concurrency,
        ));

        tracing::info!(
            fetcher = fetcher.name(),
            album_track_concurrency = config.download.album_track_concurrency,
            entry_concurrency = config.resolver.entry_concurrency,
            "batch coordinator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            gate: SelectionGate::new(selector),
            resolver,
            event_tx,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Create a coordinator backed by the `yt-dlp` binary
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if yt-dlp cannot be located, or
    /// [`Error::Config`] if the configuration is invalid.
    pub fn from_config(config: Config, selector: Arc<dyn TrackSelector>) -> Result<Self> {
        let fetcher = YtDlpFetcher::from_config(&config.tools)?;
        Self::new(config, Arc::new(fetcher), selector)
    }

    /// Subscribe to batch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a batch is currently running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one batch to completion
    ///
    /// Any invalid line rejects the whole submission before network access.
    /// Per-item failures never surface here; they are counted in the report.
    ///
    /// # Errors
    ///
    /// - [`Error::BatchInProgress`] if another batch is running
    /// - [`Error::InvalidUrls`] if any line is not a supported link
    /// - [`Error::NoValidUrls`] if the submission holds only blank lines
    /// - [`Error::Io`] if the destination directory cannot be created
    pub async fn submit_batch(&self, request: BatchRequest) -> Result<BatchReport> {
        let _busy = BusyGuard::acquire(&self.busy).ok_or(Error::BatchInProgress)?;

        let validated = urls::validate_batch(&request.lines);
        if !validated.invalid.is_empty() {
            tracing::warn!(invalid = validated.invalid.len(), "rejecting batch with invalid URLs");
            return Err(Error::InvalidUrls {
                invalid: validated.invalid,
            });
        }
        if validated.valid.is_empty() {
            return Err(Error::NoValidUrls);
        }

        let destination = request
            .destination
            .clone()
            .unwrap_or_else(|| self.config.download_dir().clone());
        tokio::fs::create_dir_all(&destination).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    destination.display(),
                    e
                ),
            ))
        })?;
        let format = AudioFormat::from_high_quality(
            request
                .high_quality
                .unwrap_or(self.config.download.high_quality),
        );

        self.resolver.clear().await;

        let accounting = Arc::new(ProgressAccounting::new(self.event_tx.clone()));
        let placeholders = accounting.begin(&validated.valid).await;
        tracing::info!(
            urls = validated.valid.len(),
            format = ?format,
            destination = %destination.display(),
            "batch started"
        );

        let downloader = Arc::new(Downloader::new(
            self.fetcher.clone(),
            accounting.clone(),
            DownloadSettings {
                format,
                destination,
                finalize_delay: self.config.download.finalize_delay,
                tag_date: utils::tag_date(),
            },
        ));
        let ctx = Arc::new(BatchContext {
            accounting: accounting.clone(),
            resolver: self.resolver.clone(),
            gate: self.gate.clone(),
            top_level_pool: DownloadPool::new(
                downloader.clone(),
                self.config.download.top_level_concurrency,
            ),
            downloader,
            album_track_concurrency: self.config.download.album_track_concurrency,
            monitor_stop: CancellationToken::new(),
        });

        let monitor = tokio::spawn(run_monitor(
            accounting.clone(),
            self.config.monitor.clone(),
            ctx.monitor_stop.clone(),
        ));

        let mut workers = JoinSet::new();
        for (placeholder, url) in placeholders.into_iter().zip(validated.valid) {
            workers.spawn(process_entry(ctx.clone(), placeholder, url));
        }

        let verdict = monitor.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "completion monitor panicked");
            MonitorVerdict::Skipped
        });

        // Whatever is still running is abandoned with the batch
        workers.abort_all();
        while workers.join_next().await.is_some() {}
        self.resolver.clear().await;

        let report = match accounting.final_report().await {
            Some(report) => report,
            None => accounting
                .finish(BatchOutcome::Stalled)
                .await
                .ok_or_else(|| Error::Other("batch ended without a report".into()))?,
        };

        if let Some(error) = report.batch_error() {
            tracing::warn!(
                code = error.code(),
                error = %error,
                incomplete = report.incomplete.len(),
                "batch abandoned"
            );
        }
        tracing::debug!(verdict = ?verdict, "completion monitor finished");

        Ok(report)
    }
}
