//! Utility functions for output naming and tag construction

use crate::error::{Error, Result};
use crate::types::{MediaItem, TrackTags};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters that are not allowed in file names on at least one supported platform
const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Replace characters that are illegal in file names with `_`.
///
/// Trailing dots and spaces are trimmed as well, since Windows silently
/// drops them. A name that ends up empty becomes `"untitled"`.
///
/// # Examples
///
/// ```
/// use trackfetch::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC: Live?"), "AC_DC_ Live_");
/// assert_eq!(sanitize_filename("   "), "untitled");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Get a path that neither exists on disk nor is already reserved.
///
/// The first collision is renamed to `name (2).ext`, the next to
/// `name (3).ext`, and so on. `reserved` holds paths handed out earlier in
/// the same batch whose files may not exist yet.
///
/// # Examples
///
/// ```
/// use trackfetch::utils::get_unique_path;
/// use std::collections::HashSet;
/// use std::path::Path;
///
/// let mut reserved = HashSet::new();
/// reserved.insert(Path::new("/nonexistent/song.mp3").to_path_buf());
///
/// let unique = get_unique_path(Path::new("/nonexistent/song.mp3"), &reserved).unwrap();
/// assert_eq!(unique, Path::new("/nonexistent/song (2).mp3"));
/// ```
pub fn get_unique_path(path: &Path, reserved: &HashSet<PathBuf>) -> Result<PathBuf> {
    let taken = |candidate: &Path| candidate.exists() || reserved.contains(candidate);

    if !taken(path) {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Other(format!("cannot extract file stem from {}", path.display())))?;
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    for i in 2..=MAX_RENAME_ATTEMPTS {
        let new_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let candidate = parent.join(new_name);
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(Error::Other(format!(
        "could not find a unique file name for {} after {MAX_RENAME_ATTEMPTS} attempts",
        path.display()
    )))
}

/// Today's date in the `YYYY-MM-DD` form written into the date tag
#[must_use]
pub fn tag_date() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Build the tags embedded into an item's output file.
///
/// Album tracks carry their album title; single tracks use their own title
/// as album so players do not group unrelated singles together.
pub fn track_tags(item: &MediaItem, date: &str) -> TrackTags {
    TrackTags {
        title: item.title.clone(),
        artist: item.artist.clone(),
        album: item
            .album_title
            .clone()
            .unwrap_or_else(|| item.title.clone()),
        date: date.to_string(),
        source_url: item.source_url.clone(),
    }
}
