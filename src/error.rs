//! Error types for trackfetch
//!
//! The taxonomy follows how far a failure is allowed to travel:
//! - Batch-level errors (`InvalidUrls`, `NoValidUrls`, `BatchInProgress`, `Config`) are
//!   returned from [`BatchCoordinator::submit_batch`](crate::BatchCoordinator::submit_batch)
//!   before any network access happens.
//! - Per-item and per-album errors (`MetadataResolution`, `AllTracksUnavailable`,
//!   `Download`, `SelectionCanceled`) are produced inside workers and absorbed into
//!   [`DownloadStatus`](crate::types::DownloadStatus) and the batch counters. They never
//!   cross a worker boundary.
//! - Collaborator errors (`ExternalTool`, `ToolNotFound`, `Io`, `Serialization`) are
//!   converted into one of the above by the worker that observed them.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for trackfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for trackfetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "album_track_concurrency")
        key: Option<String>,
    },

    /// One or more submitted lines are not YouTube or SoundCloud links
    #[error("{} invalid URL(s): {}", invalid.len(), preview_lines(invalid))]
    InvalidUrls {
        /// The offending lines exactly as the user typed them
        invalid: Vec<String>,
    },

    /// The submission contained nothing but blank lines
    #[error("no YouTube or SoundCloud URL was submitted")]
    NoValidUrls,

    /// A batch is already running on this coordinator
    #[error("a batch is already in progress")]
    BatchInProgress,

    /// Metadata lookup for a URL failed
    #[error("failed to resolve metadata for {url}: {reason}")]
    MetadataResolution {
        /// The normalized URL that could not be resolved
        url: String,
        /// Collaborator-provided reason
        reason: String,
    },

    /// Every entry of an album failed resolution (geo-restriction, removed tracks, ...)
    #[error("all {expected} tracks of album '{album}' are unavailable")]
    AllTracksUnavailable {
        /// Album title
        album: String,
        /// Number of entries the playlist listed before filtering
        expected: usize,
    },

    /// Fetch or transcode of a single track failed
    #[error("download failed: {reason}")]
    Download {
        /// Collaborator-provided reason
        reason: String,
    },

    /// The user canceled track selection for an album
    #[error("track selection canceled for album '{album}'")]
    SelectionCanceled {
        /// Album title
        album: String,
    },

    /// The batch did not finish within the wall-clock ceiling
    #[error("batch timed out after {}s", elapsed.as_secs())]
    Timeout {
        /// Time spent before giving up
        elapsed: Duration,
    },

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// External tool binary could not be located
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error code, stable across releases.
    ///
    /// Presentation layers use this to pick a localized message without
    /// parsing the `Display` output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidUrls { .. } => "invalid_url",
            Error::NoValidUrls => "no_valid_urls",
            Error::BatchInProgress => "batch_in_progress",
            Error::MetadataResolution { .. } => "metadata_resolution_failed",
            Error::AllTracksUnavailable { .. } => "all_tracks_unavailable",
            Error::Download { .. } => "download_failed",
            Error::SelectionCanceled { .. } => "selection_canceled",
            Error::Timeout { .. } => "timeout",
            Error::ExternalTool(_) => "external_tool_error",
            Error::ToolNotFound(_) => "tool_not_found",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error is reported once for the whole batch rather than
    /// absorbed into a single item's status.
    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::InvalidUrls { .. }
                | Error::NoValidUrls
                | Error::BatchInProgress
                | Error::Timeout { .. }
        )
    }

    /// Whether this error counts toward the batch's failed total.
    ///
    /// Cancellation is user-initiated and never counts as a failure.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, Error::SelectionCanceled { .. }) && !self.is_batch_level()
    }
}

/// Show at most five lines, the same cut-off the input dialog uses.
fn preview_lines(lines: &[String]) -> String {
    const PREVIEW: usize = 5;
    let mut preview = lines
        .iter()
        .take(PREVIEW)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if lines.len() > PREVIEW {
        preview.push_str(&format!(" ... and {} more", lines.len() - PREVIEW));
    }
    preview
}
