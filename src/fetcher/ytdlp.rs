//! yt-dlp based fetcher using the external binary

use super::parser::{OutputLine, last_error_line, parse_metadata_json, parse_output_line};
use super::traits::{
    FetchProgress, FetchRequest, FetchedFile, MediaFetcher, MetadataOptions, RawMetadata,
};
use crate::config::ToolsConfig;
use crate::types::{AudioFormat, TrackTags};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Fetcher that drives the external `yt-dlp` binary
///
/// Metadata lookups run `yt-dlp --dump-single-json`; downloads extract audio
/// with ffmpeg, embed the thumbnail and write the title, artist, album, date
/// and source URL tags. The child process is killed if the future is dropped.
///
/// # Examples
///
/// ```no_run
/// use trackfetch::fetcher::{MediaFetcher, MetadataOptions, YtDlpFetcher};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let fetcher = YtDlpFetcher::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let fetcher = YtDlpFetcher::from_path().expect("yt-dlp not found in PATH");
///
/// let meta = fetcher
///     .fetch_metadata("https://www.youtube.com/watch?v=dQw4w9WgXcQ", MetadataOptions::shallow())
///     .await?;
/// println!("{} by {}", meta.title, meta.artist);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary_path: PathBuf,
    ffmpeg_path: Option<PathBuf>,
    socket_timeout: Duration,
}

impl YtDlpFetcher {
    /// Create a new fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            ffmpeg_path: None,
            socket_timeout: Duration::from_secs(60),
        }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// Returns `None` if the binary is not found.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Build a fetcher from tool settings
    ///
    /// An explicit `ytdlp_path` wins; otherwise PATH is searched when
    /// `search_path` is enabled. The same rule applies to ffmpeg, whose
    /// absence is tolerated because yt-dlp does its own lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`](crate::Error::ToolNotFound) if yt-dlp
    /// cannot be located.
    pub fn from_config(tools: &ToolsConfig) -> crate::Result<Self> {
        let binary_path = match &tools.ytdlp_path {
            Some(path) => path.clone(),
            None if tools.search_path => which::which("yt-dlp")
                .map_err(|_| crate::Error::ToolNotFound("yt-dlp".to_string()))?,
            None => return Err(crate::Error::ToolNotFound("yt-dlp".to_string())),
        };

        let ffmpeg_path = match &tools.ffmpeg_path {
            Some(path) => Some(path.clone()),
            None if tools.search_path => which::which("ffmpeg").ok(),
            None => None,
        };

        Ok(Self {
            binary_path,
            ffmpeg_path,
            socket_timeout: tools.socket_timeout,
        })
    }

    /// Use a specific ffmpeg binary for extraction and tagging
    pub fn with_ffmpeg(mut self, ffmpeg_path: PathBuf) -> Self {
        self.ffmpeg_path = Some(ffmpeg_path);
        self
    }

    /// Override the network socket timeout
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-check-certificates".to_string(),
            "--no-cache-dir".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().max(1).to_string(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }
        args
    }

    fn metadata_args(&self, url: &str, options: MetadataOptions) -> Vec<String> {
        let mut args = self.base_args();
        args.push("--dump-single-json".to_string());
        args.push(if options.shallow {
            "--flat-playlist".to_string()
        } else {
            "--no-playlist".to_string()
        });
        args.push(url.to_string());
        args
    }

    fn download_args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(
            [
                "--no-playlist",
                "--newline",
                "--progress-template",
                "download:%(progress._percent_str)s",
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                request.format.extension(),
                "--audio-quality",
                audio_quality(request.format),
                "--embed-thumbnail",
                "--embed-metadata",
                "--postprocessor-args",
            ]
            .map(str::to_string),
        );
        args.push(format!(
            "ExtractAudio:{}",
            ffmpeg_metadata_args(&request.tags, request.format)
        ));
        args.push("-o".to_string());
        args.push(format!(
            "{}.%(ext)s",
            request.output_stem.to_string_lossy()
        ));
        args.push(request.url.clone());
        args
    }
}

fn audio_quality(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Mp3 => "320K",
        AudioFormat::Flac => "0",
    }
}

/// ffmpeg arguments for tag embedding, as one shell-quoted string
///
/// yt-dlp splits `--postprocessor-args` values shell-style, so every value
/// containing user text is quoted.
fn ffmpeg_metadata_args(tags: &TrackTags, format: AudioFormat) -> String {
    let mut parts = Vec::new();
    for (key, value) in [
        ("title", tags.title.as_str()),
        ("artist", tags.artist.as_str()),
        ("album", tags.album.as_str()),
        ("date", tags.date.as_str()),
    ] {
        parts.push("-metadata".to_string());
        parts.push(shell_quote(&format!("{key}={value}")));
    }
    parts.push("-metadata".to_string());
    parts.push(shell_quote(&format!("comment=Source: {}", tags.source_url)));

    if format == AudioFormat::Mp3 {
        parts.extend(["-b:a", "320k", "-ar", "48000", "-ac", "2"].map(str::to_string));
    }
    parts.join(" ")
}

fn shell_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch_metadata(
        &self,
        url: &str,
        options: MetadataOptions,
    ) -> crate::Result<RawMetadata> {
        let output = Command::new(&self.binary_path)
            .args(self.metadata_args(url, options))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::MetadataResolution {
                url: url.to_string(),
                reason: last_error_line(&stderr),
            });
        }

        parse_metadata_json(&output.stdout)
    }

    async fn fetch_and_convert(
        &self,
        request: FetchRequest,
        progress: mpsc::UnboundedSender<FetchProgress>,
    ) -> crate::Result<FetchedFile> {
        let mut child = Command::new(&self.binary_path)
            .args(self.download_args(&request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| crate::Error::ExternalTool("yt-dlp stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| crate::Error::ExternalTool("yt-dlp stderr not captured".into()))?;

        let stderr_reader = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.ok();
            buf
        });

        let mut destination = None;
        let mut conversion_started = false;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_output_line(&line) {
                Some(OutputLine::Progress(percent)) if !conversion_started => {
                    progress.send(FetchProgress::Downloading { percent }).ok();
                }
                Some(OutputLine::Extracting(path)) => {
                    if !conversion_started {
                        conversion_started = true;
                        progress.send(FetchProgress::DownloadFinished).ok();
                    }
                    if path.is_some() {
                        destination = path;
                    }
                }
                _ => {}
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            let reason = last_error_line(&stderr);
            tracing::error!(url = %request.url, error = %reason, "yt-dlp download failed");
            return Err(crate::Error::Download { reason });
        }

        if !conversion_started {
            progress.send(FetchProgress::DownloadFinished).ok();
        }
        progress.send(FetchProgress::PostProcessed).ok();

        // Titles may contain dots, so the extension is appended rather than swapped
        let path = destination.unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}.{}",
                request.output_stem.to_string_lossy(),
                request.format.extension()
            ))
        });
        Ok(FetchedFile { path })
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
