//! External fetch/transcode collaborator
//!
//! The engine never downloads or converts audio itself. It talks to a
//! [`MediaFetcher`], which looks up metadata and produces tagged audio files.
//!
//! ## Architecture
//!
//! - [`MediaFetcher`]: the collaborator interface
//! - [`YtDlpFetcher`]: production implementation driving the `yt-dlp` binary
//!
//! Tests substitute scripted in-memory implementations.
//!
//! ## Usage
//!
//! ```no_run
//! use trackfetch::fetcher::{MediaFetcher, MetadataKind, MetadataOptions, YtDlpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = YtDlpFetcher::from_path()
//!         .expect("yt-dlp binary not found");
//!
//!     let meta = fetcher
//!         .fetch_metadata("https://soundcloud.com/artist/sets/album", MetadataOptions::shallow())
//!         .await?;
//!     if meta.kind == MetadataKind::Playlist {
//!         println!("{} lists {} entries", meta.title, meta.entries.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

mod parser;
mod traits;
mod ytdlp;

pub use parser::{OutputLine, parse_metadata_json, parse_output_line};
pub use traits::{
    FetchProgress, FetchRequest, FetchedFile, MediaFetcher, MetadataKind, MetadataOptions,
    PlaylistEntry, RawMetadata,
};
pub use ytdlp::YtDlpFetcher;
