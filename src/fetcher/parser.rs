//! Parser for yt-dlp output

use super::traits::{MetadataKind, PlaylistEntry, RawMetadata};
use crate::urls;
use serde_json::Value;
use std::path::PathBuf;

const UNKNOWN_TITLE: &str = "Unknown";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Parse the JSON document printed by `yt-dlp --dump-single-json`
///
/// Missing titles fall back to `"Unknown"`. The artist falls back to the
/// uploader, then to `"Unknown Artist"`. Playlist entries that are `null`
/// (deleted or private items) are kept with an empty URL so they still count
/// toward the album's expected size and fail resolution later.
pub fn parse_metadata_json(stdout: &[u8]) -> crate::Result<RawMetadata> {
    let value: Value = serde_json::from_slice(stdout)?;

    let title = non_empty_str(&value, "title")
        .unwrap_or(UNKNOWN_TITLE)
        .to_string();
    let artist = ["artist", "uploader", "creator"]
        .iter()
        .find_map(|key| non_empty_str(&value, key))
        .unwrap_or(UNKNOWN_ARTIST)
        .to_string();

    let is_playlist = value.get("_type").and_then(Value::as_str) == Some("playlist")
        || value.get("entries").is_some_and(Value::is_array);

    if !is_playlist {
        return Ok(RawMetadata {
            title,
            artist,
            kind: MetadataKind::Track,
            entries: Vec::new(),
        });
    }

    let entries = value
        .get("entries")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(parse_entry).collect())
        .unwrap_or_default();

    Ok(RawMetadata {
        title,
        artist,
        kind: MetadataKind::Playlist,
        entries,
    })
}

fn parse_entry(entry: &Value) -> PlaylistEntry {
    if entry.is_null() {
        return PlaylistEntry {
            url: String::new(),
            title: None,
        };
    }

    let url = ["webpage_url", "url"]
        .iter()
        .find_map(|key| non_empty_str(entry, key))
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(str::to_string)
        // Flat YouTube listings sometimes carry only the video id
        .or_else(|| non_empty_str(entry, "id").map(urls::normalize))
        .unwrap_or_default();

    PlaylistEntry {
        url,
        title: non_empty_str(entry, "title").map(str::to_string),
    }
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A meaningful line of `yt-dlp` download output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// Progress template line, percentage 0.0 to 100.0
    Progress(f32),
    /// Audio extraction started; carries the final path when printed
    Extracting(Option<PathBuf>),
}

/// Parse one stdout line of a download run
///
/// Recognizes the `download:<percent>` lines produced by
/// `--progress-template download:%(progress._percent_str)s` and the
/// `[ExtractAudio]` lines printed when conversion starts.
pub fn parse_output_line(line: &str) -> Option<OutputLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix("download:") {
        let percent = rest.trim().trim_end_matches('%').trim().parse::<f32>().ok()?;
        return Some(OutputLine::Progress(percent.clamp(0.0, 100.0)));
    }

    if let Some(rest) = line.strip_prefix("[ExtractAudio]") {
        let destination = rest
            .trim()
            .strip_prefix("Destination:")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        return Some(OutputLine::Extracting(destination));
    }

    None
}

/// Last non-empty line of stderr, which is where yt-dlp puts its `ERROR:` summary
pub fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.strip_prefix("ERROR:").map(str::trim).unwrap_or(l))
        .unwrap_or("unknown error")
        .to_string()
}
