//! Offline derivation of the dedup key for a submitted reference.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static WATCH_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})(?:[&#]|$)").unwrap());

static SHORT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtu\.be/([A-Za-z0-9_-]{11})(?:[?&#/]|$)").unwrap());

static PATH_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(?:shorts|embed|live|v)/([A-Za-z0-9_-]{11})(?:[?&#/]|$)").unwrap()
});

static BARE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

/// Derives the dedup key for `source_ref` without any network access.
///
/// Recognised video URLs and bare 11-character ids map to the video id;
/// anything else falls back to the trimmed reference.
pub fn source_key(source_ref: &str) -> String {
    extract_video_id(source_ref).unwrap_or_else(|| source_ref.trim().to_string())
}

/// Extracts an 11-character video id, if `source_ref` carries one.
pub fn extract_video_id(source_ref: &str) -> Option<String> {
    let trimmed = source_ref.trim();
    if BARE_ID.is_match(trimmed) {
        return Some(trimmed.to_string());
    }

    [&*WATCH_PARAM, &*SHORT_LINK, &*PATH_FORM]
        .iter()
        .find_map(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
