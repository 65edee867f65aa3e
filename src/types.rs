//! Core types for trackfetch

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of one downloadable unit, stable within a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an album, stable within a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub u64);

impl AlbumId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AlbumId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AlbumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media provider a link belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// youtube.com / youtu.be
    YouTube,
    /// soundcloud.com
    SoundCloud,
}

impl Provider {
    /// Detect the provider from a normalized URL
    pub fn from_url(url: &str) -> Option<Self> {
        let host = url::Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        match host {
            "youtube.com" | "youtu.be" => Some(Provider::YouTube),
            "soundcloud.com" => Some(Provider::SoundCloud),
            _ => None,
        }
    }
}

/// What a [`MediaItem`] was created from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A top-level link that resolved to one track
    SingleTrack,
    /// One selected entry of an album
    AlbumTrack,
}

/// One downloadable audio unit. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Identifier, stable within the batch
    pub id: ItemId,
    /// Track title
    pub title: String,
    /// Track artist (uploader when no artist is tagged)
    pub artist: String,
    /// Canonical URL of the track
    pub source_url: String,
    /// Whether this came from a single link or an album
    pub kind: MediaKind,
    /// Owning album, for album tracks
    pub album_id: Option<AlbumId>,
    /// Owning album title, for album tracks
    pub album_title: Option<String>,
}

/// Per-item download status
///
/// Transitions only move forward through
/// `Queued → Resolving → Downloading → Converting → Done | Failed`.
/// `Canceled` is reachable from any non-terminal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting for a worker
    Queued,
    /// Metadata lookup in progress
    Resolving,
    /// Raw media transfer in progress
    Downloading {
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },
    /// Audio extraction and tagging in progress
    Converting,
    /// Output file finalized
    Done,
    /// Failed with a reason
    Failed {
        /// Error message
        reason: String,
    },
    /// Canceled before downloading started
    Canceled,
}

impl DownloadStatus {
    fn rank(&self) -> u8 {
        match self {
            DownloadStatus::Queued => 0,
            DownloadStatus::Resolving => 1,
            DownloadStatus::Downloading { .. } => 2,
            DownloadStatus::Converting => 3,
            DownloadStatus::Done | DownloadStatus::Failed { .. } | DownloadStatus::Canceled => 4,
        }
    }

    /// Done, Failed or Canceled
    pub fn is_terminal(&self) -> bool {
        self.rank() == 4
    }

    /// Downloading or Converting
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Downloading { .. } | DownloadStatus::Converting
        )
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    ///
    /// Repeated `Downloading` updates are allowed so progress can advance.
    pub fn can_transition_to(&self, next: &DownloadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            DownloadStatus::Canceled => true,
            DownloadStatus::Downloading { .. } => self.rank() <= 2,
            _ => next.rank() > self.rank(),
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadStatus::Queued => write!(f, "queued"),
            DownloadStatus::Resolving => write!(f, "resolving"),
            DownloadStatus::Downloading { percent } => write!(f, "downloading {percent:.0}%"),
            DownloadStatus::Converting => write!(f, "converting"),
            DownloadStatus::Done => write!(f, "done"),
            DownloadStatus::Failed { reason } => write!(f, "failed: {reason}"),
            DownloadStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Output audio format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// 320 kbps MP3
    Mp3,
    /// Lossless FLAC
    Flac,
}

impl AudioFormat {
    /// FLAC for high quality, MP3 otherwise
    pub fn from_high_quality(high_quality: bool) -> Self {
        if high_quality {
            AudioFormat::Flac
        } else {
            AudioFormat::Mp3
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
        }
    }
}

/// Tags embedded into every output file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackTags {
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// Album title
    pub album: String,
    /// Download date, `YYYY-MM-DD`
    pub date: String,
    /// Source URL
    pub source_url: String,
}

/// One user submission
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Raw lines, one candidate URL each
    pub lines: Vec<String>,
    /// Override the configured output format (None = use config)
    #[serde(default)]
    pub high_quality: Option<bool>,
    /// Override the configured destination directory (None = use config)
    #[serde(default)]
    pub destination: Option<PathBuf>,
}

impl BatchRequest {
    /// Build a request from raw text, one URL per line
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }
}

/// How a batch ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item reached a terminal status
    Completed,
    /// Nothing changed for the stall window while no item was in flight
    Stalled,
    /// The wall-clock ceiling was reached
    TimedOut,
    /// Every top-level entry was canceled during track selection
    Canceled,
}

/// End-of-batch summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// How the batch ended
    pub outcome: BatchOutcome,
    /// Items that reached `Done`
    pub succeeded: usize,
    /// Items that failed, including albums with no available tracks
    pub failed: usize,
    /// Albums canceled during track selection (excluded from `total`)
    pub canceled: usize,
    /// Expected items, excluding canceled albums
    pub total: usize,
    /// Items still non-terminal when the batch ended
    pub incomplete: Vec<ItemId>,
    /// Wall-clock duration of the batch
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl BatchReport {
    /// True when nothing failed and nothing was left behind
    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Completed && self.failed == 0 && self.incomplete.is_empty()
    }

    /// True when every expected item failed
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }

    /// The batch-level error this report stands for, if any
    ///
    /// Only a timeout is an error; stalls and cancellations are ordinary outcomes.
    pub fn batch_error(&self) -> Option<Error> {
        match self.outcome {
            BatchOutcome::TimedOut => Some(Error::Timeout {
                elapsed: self.elapsed,
            }),
            _ => None,
        }
    }
}

/// Event emitted during a batch
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Validation passed and workers are starting
    BatchStarted {
        /// Number of top-level entries
        total: usize,
    },

    /// An item changed status
    Status {
        /// Item ID
        id: ItemId,
        /// Display title (URL until metadata is known)
        title: String,
        /// New status
        status: DownloadStatus,
    },

    /// Aggregate counters changed
    Progress {
        /// Items in a terminal state, canceled albums included
        processed: usize,
        /// Current expected total
        total: usize,
    },

    /// The expected total was revised after an album expanded
    TotalRevised {
        /// New expected total
        total: usize,
    },

    /// An album's entry list is being resolved
    AlbumLoading {
        /// Album ID
        album_id: AlbumId,
        /// Album title
        title: String,
        /// Entries listed by the provider
        entries: usize,
    },

    /// Some album entries were unavailable and dropped
    TracksSkipped {
        /// Album ID
        album_id: AlbumId,
        /// Number of dropped entries
        skipped: usize,
    },

    /// Album progress summary
    AlbumSummary {
        /// Album ID
        album_id: AlbumId,
        /// Album title
        title: String,
        /// Tracks that reached `Done`
        completed: usize,
        /// Selected tracks
        total: usize,
    },

    /// Track selection was canceled for an album
    AlbumCanceled {
        /// Album ID
        album_id: AlbumId,
        /// Album title
        title: String,
    },

    /// The batch is over
    BatchFinished {
        /// Final report
        report: BatchReport,
    },
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
