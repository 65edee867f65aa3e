//! Link normalization and validation
//!
//! Users paste links in many shapes: mobile and YouTube Music hosts, bare
//! `watch?v=` fragments, `youtu.be` short links, Shorts, naked video IDs,
//! scheme-less SoundCloud links, or a chat-style `@` prefix. [`normalize`]
//! rewrites them into canonical provider URLs without touching the network,
//! and [`validate_batch`] splits a submission into accepted and rejected lines.

use regex::Regex;
use std::sync::LazyLock;

// Patterns are compile-time constants; a failure here is a programming error.
// Host patterns match only at the start of the line and end at a path boundary.
#[allow(clippy::expect_used)]
static WATCH_OR_SHORT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)([A-Za-z0-9_-]{11})")
        .expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static SHORTS_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?youtube\.com/shorts/([A-Za-z0-9_-]{11})")
        .expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static BARE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static ALTERNATE_YOUTUBE_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(?:m|music)\.youtube\.com([/?#]|$)")
        .expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static SCHEMELESS_YOUTUBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:www\.)?(youtube\.com|youtu\.be)([/?#]|$)").expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static SCHEMELESS_SOUNDCLOUD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:www\.|m\.)?soundcloud\.com(?:[/?#]|$)").expect("static pattern compiles")
});

/// What may follow a chat-style `@` for it to be stripped
#[allow(clippy::expect_used)]
static LINK_AFTER_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://|www\.|(?:(?:m|music)\.)?youtube\.com(?:[/?#]|$)|youtu\.be(?:[/?#]|$)|(?:m\.)?soundcloud\.com(?:[/?#]|$))",
    )
    .expect("static pattern compiles")
});

#[allow(clippy::expect_used)]
static SUPPORTED_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?(?:youtube\.com|youtu\.be|soundcloud\.com)/.+")
        .expect("static pattern compiles")
});

const CANONICAL_WATCH: &str = "https://www.youtube.com/watch?v=";

/// Rewrite a raw input line into a canonical provider URL.
///
/// Returns the trimmed input unchanged when no rule applies. Pure and
/// idempotent: `normalize(&normalize(x)) == normalize(x)`.
///
/// # Examples
///
/// ```
/// use trackfetch::urls::normalize;
///
/// assert_eq!(
///     normalize("m.youtube.com/watch?v=abc12345678"),
///     "https://www.youtube.com/watch?v=abc12345678"
/// );
/// assert_eq!(
///     normalize("@soundcloud.com/artist/track"),
///     "https://soundcloud.com/artist/track"
/// );
/// assert_eq!(normalize("@SomeChannel"), "@SomeChannel");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut url = raw.trim();

    // "@https://..." pasted from chat; a bare "@handle" is a channel name and stays
    if url.starts_with('@') {
        let rest = url.trim_start_matches(|c: char| c == '@' || c.is_whitespace());
        if LINK_AFTER_AT.is_match(rest) {
            url = rest;
        }
    }

    let mut url = if url.starts_with("watch?v=") {
        format!("https://www.youtube.com/{url}")
    } else {
        url.to_string()
    };

    url = ALTERNATE_YOUTUBE_HOST
        .replace(&url, "${1}www.youtube.com${2}")
        .into_owned();
    url = SCHEMELESS_YOUTUBE
        .replace(&url, "https://www.${1}${2}")
        .into_owned();

    if let Some(caps) = WATCH_OR_SHORT_LINK.captures(&url) {
        return format!("{CANONICAL_WATCH}{}", &caps[1]);
    }
    if let Some(caps) = SHORTS_LINK.captures(&url) {
        return format!("{CANONICAL_WATCH}{}", &caps[1]);
    }
    if BARE_VIDEO_ID.is_match(&url) {
        return format!("{CANONICAL_WATCH}{url}");
    }

    if SCHEMELESS_SOUNDCLOUD.is_match(&url) {
        url = format!("https://{url}");
    }

    url
}

/// Whether a normalized URL points at a supported host with a non-empty path.
#[must_use]
pub fn is_valid(normalized: &str) -> bool {
    SUPPORTED_LINK.is_match(normalized)
}

/// Result of validating a whole submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedBatch {
    /// Normalized, supported URLs in submission order
    pub valid: Vec<String>,
    /// Rejected lines exactly as submitted, so the user can fix them
    pub invalid: Vec<String>,
}

/// Normalize and validate every line of a submission.
///
/// Blank lines are dropped silently and never reported as invalid.
///
/// # Examples
///
/// ```
/// use trackfetch::urls::validate_batch;
///
/// let batch = validate_batch(&["not a url", ""]);
/// assert!(batch.valid.is_empty());
/// assert_eq!(batch.invalid, vec!["not a url".to_string()]);
/// ```
pub fn validate_batch<S: AsRef<str>>(lines: &[S]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    for raw in lines {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            continue;
        }
        let url = normalize(raw);
        if is_valid(&url) {
            batch.valid.push(url);
        } else {
            batch.invalid.push(raw.to_string());
        }
    }
    batch
}
