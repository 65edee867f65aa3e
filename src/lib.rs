//! # trackfetch
//!
//! Batch audio download engine for YouTube and SoundCloud links.
//!
//! ## Design Philosophy
//!
//! trackfetch is designed to be:
//! - **Library-first** - No CLI or UI; the presentation layer plugs in through traits
//! - **Failure-tolerant** - One broken link never sinks the rest of a batch
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! A submission is a block of text with one link per line. Each link is
//! normalized and validated, resolved to a single track or an album, and
//! downloaded as a tagged MP3 or FLAC file through the `yt-dlp` binary.
//! Albums are expanded entry by entry, and the user picks which tracks to
//! keep before anything is fetched.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackfetch::{BatchCoordinator, BatchRequest, ChannelTrackSelector, Config, SelectionResponse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (selector, mut prompts) = ChannelTrackSelector::new(8);
//!     let coordinator = BatchCoordinator::from_config(Config::default(), Arc::new(selector))?;
//!
//!     // Answer album prompts by taking every track
//!     tokio::spawn(async move {
//!         while let Some(request) = prompts.recv().await {
//!             let all = (0..request.prompt.entries.len()).collect();
//!             request.respond(SelectionResponse::Selected(all));
//!         }
//!     });
//!
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = coordinator
//!         .submit_batch(BatchRequest::from_text(
//!             "https://youtu.be/dQw4w9WgXcQ\nhttps://soundcloud.com/artist/sets/album",
//!         ))
//!         .await?;
//!     println!("{} of {} tracks downloaded", report.succeeded, report.total);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Batch orchestration (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Media fetch collaborator (yt-dlp)
pub mod fetcher;
/// Metadata resolution and album expansion
pub mod resolver;
/// Album track selection
pub mod selection;
/// Core types and events
pub mod types;
/// URL normalization and validation
pub mod urls;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use engine::BatchCoordinator;
pub use error::{Error, Result};
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use resolver::{AlbumEntry, MetadataResolver};
pub use selection::{
    ChannelTrackSelector, SelectAll, SelectionPrompt, SelectionRequest, SelectionResponse,
    TrackSelector,
};
pub use types::{
    AlbumId, AudioFormat, BatchOutcome, BatchReport, BatchRequest, DownloadStatus, Event, ItemId,
    MediaItem, MediaKind, Provider,
};
