//! Configuration types for trackfetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Download behavior configuration (destination, output format, pool ceilings)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Destination directory (default: "~/Downloads", falling back to "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Produce FLAC instead of 320 kbps MP3 (default: false)
    ///
    /// A batch request may override this per submission.
    #[serde(default)]
    pub high_quality: bool,

    /// Maximum tracks of a single album fetched at once (default: 4)
    ///
    /// Albums are throttled separately from top-level items to avoid
    /// provider rate limiting.
    #[serde(default = "default_album_track_concurrency")]
    pub album_track_concurrency: usize,

    /// Maximum top-level items fetched at once (default: None = one worker per URL)
    #[serde(default)]
    pub top_level_concurrency: Option<usize>,

    /// Delay between the collaborator's post-processing signal and the `Done`
    /// transition (default: 500 ms)
    ///
    /// Tag embedding finishes slightly after the collaborator reports it, so
    /// counters are only bumped once the output file has settled.
    #[serde(default = "default_finalize_delay", with = "millis_serde")]
    pub finalize_delay: Duration,

    /// Ask the user which album tracks to fetch (default: true)
    ///
    /// When disabled every available track is selected.
    #[serde(default = "default_true")]
    pub prompt_track_selection: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            high_quality: false,
            album_track_concurrency: default_album_track_concurrency(),
            top_level_concurrency: None,
            finalize_delay: default_finalize_delay(),
            prompt_track_selection: true,
        }
    }
}

/// Metadata resolution settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum album entries resolved at once (default: 5)
    #[serde(default = "default_entry_concurrency")]
    pub entry_concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            entry_concurrency: default_entry_concurrency(),
        }
    }
}

/// Completion monitor timing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between completion checks (default: 500 ms)
    #[serde(default = "default_poll_interval", with = "millis_serde")]
    pub poll_interval: Duration,

    /// Consecutive unchanged polls after which the batch counts as stalled (default: 60)
    #[serde(default = "default_stall_ticks")]
    pub stall_ticks: u32,

    /// Wall-clock ceiling for a whole batch (default: 2 hours)
    #[serde(default = "default_batch_timeout", with = "duration_serde")]
    pub batch_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            stall_ticks: default_stall_ticks(),
            batch_timeout: default_batch_timeout(),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable handed to yt-dlp (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket timeout passed to yt-dlp (default: 60 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
        }
    }
}

/// Main configuration for [`BatchCoordinator`](crate::BatchCoordinator)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) — destination, format, pool ceilings
/// - [`resolver`](ResolverConfig) — metadata lookup concurrency
/// - [`monitor`](MonitorConfig) — completion polling, stall and timeout
/// - [`tools`](ToolsConfig) — external binary paths
///
/// All sub-config fields are flattened, so the serialized form has no nesting.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Metadata resolution settings
    #[serde(flatten)]
    pub resolver: ResolverConfig,

    /// Completion monitor timing
    #[serde(flatten)]
    pub monitor: MonitorConfig,

    /// External tool paths
    #[serde(flatten)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Destination directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Reject settings that would deadlock or spin the engine.
    pub fn validate(&self) -> Result<()> {
        if self.download.album_track_concurrency == 0 {
            return Err(config_error(
                "album track concurrency must be at least 1",
                "album_track_concurrency",
            ));
        }
        if self.download.top_level_concurrency == Some(0) {
            return Err(config_error(
                "top-level concurrency must be at least 1 when set",
                "top_level_concurrency",
            ));
        }
        if self.resolver.entry_concurrency == 0 {
            return Err(config_error(
                "entry concurrency must be at least 1",
                "entry_concurrency",
            ));
        }
        if self.monitor.poll_interval.is_zero() {
            return Err(config_error(
                "poll interval must be non-zero",
                "poll_interval",
            ));
        }
        if self.monitor.batch_timeout.is_zero() {
            return Err(config_error(
                "batch timeout must be non-zero",
                "batch_timeout",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

fn default_album_track_concurrency() -> usize {
    4
}

fn default_entry_concurrency() -> usize {
    5
}

fn default_finalize_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_stall_ticks() -> u32 {
    60 // 30 seconds at the default poll interval
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
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
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = Config::default();

        assert_eq!(config.download.album_track_concurrency, 4);
        assert_eq!(config.download.top_level_concurrency, None);
        assert_eq!(config.resolver.entry_concurrency, 5);
        assert_eq!(config.monitor.poll_interval, Duration::from_millis(500));
        assert_eq!(config.monitor.stall_ticks, 60);
        assert_eq!(config.monitor.batch_timeout, Duration::from_secs(7200));
        assert_eq!(config.download.finalize_delay, Duration::from_millis(500));
        assert!(config.download.prompt_track_selection);
        assert!(!config.download.high_quality);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.download.album_track_concurrency, 4);
        assert_eq!(config.monitor.stall_ticks, 60);
        assert!(config.tools.search_path);
    }

    #[test]
    fn flattened_fields_round_trip_through_json() {
        let mut config = Config::default();
        config.download.download_dir = PathBuf::from("/music");
        config.download.high_quality = true;
        config.monitor.poll_interval = Duration::from_millis(250);
        config.tools.socket_timeout = Duration::from_secs(30);

        let json = serde_json::to_value(&config).expect("serialize failed");
        assert_eq!(json["download_dir"], "/music");
        assert_eq!(json["poll_interval"], 250);
        assert_eq!(json["socket_timeout"], 30);
        assert_eq!(json["batch_timeout"], 7200);

        let back: Config = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back.download.download_dir, PathBuf::from("/music"));
        assert!(back.download.high_quality);
        assert_eq!(back.monitor.poll_interval, Duration::from_millis(250));
        assert_eq!(back.tools.socket_timeout, Duration::from_secs(30));
    }

    #[test]
    fn validate_rejects_zero_album_concurrency() {
        let mut config = Config::default();
        config.download.album_track_concurrency = 0;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("album_track_concurrency"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_top_level_ceiling_but_allows_unbounded() {
        let mut config = Config::default();
        config.download.top_level_concurrency = Some(0);
        assert!(config.validate().is_err());

        config.download.top_level_concurrency = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = Config::default();
        config.monitor.poll_interval = Duration::ZERO;

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("poll_interval")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
