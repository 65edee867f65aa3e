//! Batch state owner: counters, status registry and album bookkeeping.
//!
//! Every mutation and every composite completion check happens under one
//! lock, so the monitor never sees `processed` and `total_expected` from two
//! different moments. Raw counters are never handed out; callers use the
//! compound operations below.

use crate::resolver::{AlbumEntry, TrackInfo};
use crate::types::{
    AlbumId, BatchOutcome, BatchReport, DownloadStatus, Event, ItemId, MediaItem, MediaKind,
};
use std::collections::HashMap;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;

struct ItemRecord {
    title: String,
    status: DownloadStatus,
    album_id: Option<AlbumId>,
}

struct AlbumRecord {
    title: String,
    placeholder: ItemId,
    expected_track_count: usize,
    /// None until the selection is confirmed
    selected: Option<Vec<ItemId>>,
    completed: usize,
    failed: usize,
}

impl AlbumRecord {
    fn is_complete(&self) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|selected| self.completed + self.failed == selected.len())
    }
}

#[derive(Default)]
struct BatchState {
    total_expected: usize,
    top_level: usize,
    succeeded: usize,
    failed: usize,
    canceled: usize,
    items: HashMap<ItemId, ItemRecord>,
    albums: HashMap<AlbumId, AlbumRecord>,
    next_item_id: u64,
    next_album_id: u64,
    report: Option<BatchReport>,
}

impl BatchState {
    fn processed(&self) -> usize {
        self.succeeded + self.failed + self.canceled
    }

    fn all_albums_complete(&self) -> bool {
        self.albums.values().all(AlbumRecord::is_complete)
    }

    fn no_item_in_flight(&self) -> bool {
        !self.items.values().any(|item| item.status.is_in_flight())
    }

    fn allocate_item(&mut self) -> ItemId {
        self.next_item_id += 1;
        ItemId(self.next_item_id)
    }

    fn allocate_album(&mut self) -> AlbumId {
        self.next_album_id += 1;
        AlbumId(self.next_album_id)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            processed: self.processed(),
            total_expected: self.total_expected,
            succeeded: self.succeeded,
            failed: self.failed,
            canceled: self.canceled,
            all_albums_complete: self.all_albums_complete(),
            no_item_in_flight: self.no_item_in_flight(),
            outcome: self.report.as_ref().map(|r| r.outcome),
        }
    }
}

/// Consistent view of the batch taken under the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Snapshot {
    /// Items in a terminal state, canceled albums included
    pub processed: usize,
    pub total_expected: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub all_albums_complete: bool,
    pub no_item_in_flight: bool,
    /// Set once the batch outcome has been claimed
    pub outcome: Option<BatchOutcome>,
}

impl Snapshot {
    /// Every expected item is terminal and nothing is left running
    pub fn is_done(&self) -> bool {
        self.processed >= self.total_expected
            && self.all_albums_complete
            && self.no_item_in_flight
            && self.processed > 0
    }

    /// The batch may be declared stalled once the counters stop moving
    pub fn may_stall(&self) -> bool {
        self.processed > 0 && self.no_item_in_flight && self.all_albums_complete
    }
}

/// Shared progress accounting for one batch
pub(crate) struct ProgressAccounting {
    state: Mutex<BatchState>,
    event_tx: broadcast::Sender<Event>,
    started: Instant,
}

impl ProgressAccounting {
    pub(crate) fn new(event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            state: Mutex::new(BatchState::default()),
            event_tx,
            started: Instant::now(),
        }
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Register one placeholder item per top-level URL and announce the batch.
    ///
    /// The expected total starts at one per URL; albums revise it once their
    /// selection is confirmed.
    pub(crate) async fn begin(&self, urls: &[String]) -> Vec<ItemId> {
        let mut state = self.state.lock().await;
        state.total_expected = urls.len();
        state.top_level = urls.len();

        self.emit(Event::BatchStarted { total: urls.len() });

        urls.iter()
            .map(|url| {
                let id = state.allocate_item();
                state.items.insert(
                    id,
                    ItemRecord {
                        title: url.clone(),
                        status: DownloadStatus::Queued,
                        album_id: None,
                    },
                );
                self.emit(Event::Status {
                    id,
                    title: url.clone(),
                    status: DownloadStatus::Queued,
                });
                id
            })
            .collect()
    }

    /// Move an item to a new status, updating counters for terminal states.
    ///
    /// Returns false when the transition would move backwards or the item is
    /// unknown; the registry is left untouched in that case.
    pub(crate) async fn set_status(&self, id: ItemId, status: DownloadStatus) -> bool {
        let mut state = self.state.lock().await;
        self.apply_status(&mut state, id, status)
    }

    fn apply_status(&self, state: &mut BatchState, id: ItemId, status: DownloadStatus) -> bool {
        let Some(item) = state.items.get_mut(&id) else {
            tracing::warn!(item_id = %id, "status update for unknown item");
            return false;
        };
        if !item.status.can_transition_to(&status) {
            tracing::debug!(
                item_id = %id,
                from = %item.status,
                to = %status,
                "ignoring out-of-order status update"
            );
            return false;
        }

        item.status = status.clone();
        let title = item.title.clone();
        let album_id = item.album_id;

        match &status {
            DownloadStatus::Done => state.succeeded += 1,
            DownloadStatus::Failed { .. } => state.failed += 1,
            DownloadStatus::Canceled => state.canceled += 1,
            _ => {}
        }

        let terminal = status.is_terminal();
        self.emit(Event::Status { id, title, status });
        if !terminal {
            return true;
        }

        self.emit(Event::Progress {
            processed: state.processed(),
            total: state.total_expected,
        });

        if let Some(album_id) = album_id {
            self.record_album_track(state, album_id, id);
        }
        true
    }

    fn record_album_track(&self, state: &mut BatchState, album_id: AlbumId, id: ItemId) {
        let done = state
            .items
            .get(&id)
            .is_some_and(|item| item.status == DownloadStatus::Done);
        let Some(album) = state.albums.get_mut(&album_id) else {
            return;
        };
        if done {
            album.completed += 1;
        } else {
            album.failed += 1;
        }

        let selected = album.selected.as_ref().map_or(0, Vec::len);
        self.emit(Event::AlbumSummary {
            album_id,
            title: album.title.clone(),
            completed: album.completed,
            total: selected,
        });

        if album.is_complete() {
            tracing::info!(
                album = %album.title,
                completed = album.completed,
                failed = album.failed,
                "album finished"
            );
            state.albums.remove(&album_id);
        }
    }

    /// Attach resolved metadata to a top-level placeholder
    pub(crate) async fn describe_track(&self, placeholder: ItemId, info: &TrackInfo) -> MediaItem {
        let mut state = self.state.lock().await;
        if let Some(item) = state.items.get_mut(&placeholder) {
            item.title = info.title.clone();
        }
        MediaItem {
            id: placeholder,
            title: info.title.clone(),
            artist: info.artist.clone(),
            source_url: info.source_url.clone(),
            kind: MediaKind::SingleTrack,
            album_id: None,
            album_title: None,
        }
    }

    /// Register an album detected behind a top-level placeholder
    ///
    /// The album stays incomplete until its selection is confirmed, so the
    /// batch cannot finish while it is being expanded or awaits the user.
    pub(crate) async fn open_album(
        &self,
        placeholder: ItemId,
        title: &str,
        listed_entries: usize,
    ) -> AlbumId {
        let mut state = self.state.lock().await;
        let album_id = state.allocate_album();
        if let Some(item) = state.items.get_mut(&placeholder) {
            item.title = title.to_string();
        }
        state.albums.insert(
            album_id,
            AlbumRecord {
                title: title.to_string(),
                placeholder,
                expected_track_count: listed_entries,
                selected: None,
                completed: 0,
                failed: 0,
            },
        );

        tracing::info!(album = %title, entries = listed_entries, "loading album");
        self.emit(Event::AlbumLoading {
            album_id,
            title: title.to_string(),
            entries: listed_entries,
        });
        album_id
    }

    /// Announce entries dropped during expansion
    pub(crate) async fn report_skipped(&self, album_id: AlbumId, skipped: usize) {
        let state = self.state.lock().await;
        if let Some(album) = state.albums.get(&album_id) {
            tracing::info!(
                album = %album.title,
                skipped,
                expected = album.expected_track_count,
                "tracks skipped"
            );
        }
        self.emit(Event::TracksSkipped { album_id, skipped });
    }

    /// Replace the album's placeholder with one item per selected entry.
    ///
    /// Returns `None` if the batch outcome has already been decided, since the
    /// expected total may not change after that.
    pub(crate) async fn confirm_album(
        &self,
        album_id: AlbumId,
        entries: &[AlbumEntry],
    ) -> Option<Vec<MediaItem>> {
        let mut state = self.state.lock().await;
        if state.report.is_some() {
            tracing::warn!(album_id = %album_id, "batch already finished, dropping album");
            return None;
        }
        let (album_title, placeholder) = {
            let album = state.albums.get(&album_id)?;
            (album.title.clone(), album.placeholder)
        };

        let items: Vec<MediaItem> = entries
            .iter()
            .map(|entry| {
                let id = state.allocate_item();
                MediaItem {
                    id,
                    title: entry.title.clone(),
                    artist: entry.artist.clone(),
                    source_url: entry.source_url.clone(),
                    kind: MediaKind::AlbumTrack,
                    album_id: Some(album_id),
                    album_title: Some(album_title.clone()),
                }
            })
            .collect();

        for item in &items {
            state.items.insert(
                item.id,
                ItemRecord {
                    title: item.title.clone(),
                    status: DownloadStatus::Queued,
                    album_id: Some(album_id),
                },
            );
            self.emit(Event::Status {
                id: item.id,
                title: item.title.clone(),
                status: DownloadStatus::Queued,
            });
        }

        // The placeholder stood in for the whole album
        state.items.remove(&placeholder);
        state.total_expected = state.total_expected - 1 + items.len();
        if let Some(album) = state.albums.get_mut(&album_id) {
            album.selected = Some(items.iter().map(|item| item.id).collect());
        }

        self.emit(Event::TotalRevised {
            total: state.total_expected,
        });
        self.emit(Event::Progress {
            processed: state.processed(),
            total: state.total_expected,
        });
        Some(items)
    }

    /// Drop an album whose selection was canceled.
    ///
    /// The placeholder becomes `Canceled`: it stays in the expected total and
    /// counts as processed without counting as a failure. When every top-level
    /// entry ends up canceled this claims the `Canceled` outcome and returns
    /// the report, since the monitor would otherwise never see progress.
    pub(crate) async fn cancel_album(&self, album_id: AlbumId) -> Option<BatchReport> {
        let mut state = self.state.lock().await;
        let album = state.albums.remove(&album_id)?;

        self.emit(Event::AlbumCanceled {
            album_id,
            title: album.title.clone(),
        });
        self.apply_status(&mut state, album.placeholder, DownloadStatus::Canceled);

        if state.canceled == state.top_level {
            return self.claim(&mut state, BatchOutcome::Canceled);
        }
        None
    }

    /// Mark an album whose expansion failed as a single failed item
    pub(crate) async fn fail_album(&self, album_id: AlbumId, reason: String) {
        let mut state = self.state.lock().await;
        let Some(album) = state.albums.remove(&album_id) else {
            return;
        };
        tracing::warn!(album = %album.title, reason = %reason, "album failed");
        self.apply_status(
            &mut state,
            album.placeholder,
            DownloadStatus::Failed { reason },
        );
    }

    pub(crate) async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    /// Claim `Completed` if every expected item is terminal
    pub(crate) async fn try_mark_batch_done(&self) -> Option<BatchReport> {
        let mut state = self.state.lock().await;
        if state.snapshot().is_done() {
            return self.claim(&mut state, BatchOutcome::Completed);
        }
        None
    }

    /// Claim `Stalled` if nothing is running and some work has finished
    pub(crate) async fn try_mark_stalled(&self) -> Option<BatchReport> {
        let mut state = self.state.lock().await;
        if state.snapshot().may_stall() {
            return self.claim(&mut state, BatchOutcome::Stalled);
        }
        None
    }

    /// Claim `outcome` unconditionally, unless another outcome already won
    pub(crate) async fn finish(&self, outcome: BatchOutcome) -> Option<BatchReport> {
        let mut state = self.state.lock().await;
        self.claim(&mut state, outcome)
    }

    /// The report produced when the outcome was claimed
    pub(crate) async fn final_report(&self) -> Option<BatchReport> {
        self.state.lock().await.report.clone()
    }

    fn claim(&self, state: &mut BatchState, outcome: BatchOutcome) -> Option<BatchReport> {
        if state.report.is_some() {
            return None;
        }

        let mut incomplete: Vec<ItemId> = state
            .items
            .iter()
            .filter(|(_, item)| !item.status.is_terminal())
            .map(|(id, _)| *id)
            .collect();
        incomplete.sort();

        let report = BatchReport {
            outcome,
            succeeded: state.succeeded,
            failed: state.failed,
            canceled: state.canceled,
            total: state.total_expected - state.canceled,
            incomplete,
            elapsed: self.started.elapsed(),
        };

        tracing::info!(
            outcome = ?report.outcome,
            succeeded = report.succeeded,
            failed = report.failed,
            canceled = report.canceled,
            total = report.total,
            "batch finished"
        );
        state.report = Some(report.clone());
        self.emit(Event::BatchFinished {
            report: report.clone(),
        });
        Some(report)
    }
}
