//! URL utilities for video IDs and player script locations

use regex::Regex;
use url::Url;

use crate::error::ResolveError;

/// Length of a video ID
pub const VIDEO_ID_LEN: usize = 11;

/// Default site origin used to build watch URLs and join relative script paths
pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

fn is_video_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Check if a string is a bare video ID
pub fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN && candidate.chars().all(is_video_id_char)
}

/// Extract a video ID from a watch, short-link, embed or shorts URL, or a bare ID
pub fn extract_video_id(input: &str) -> Result<String, ResolveError> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let patterns = [
        r"[?&]v=([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"/embed/([a-zA-Z0-9_-]{11})",
        r"/shorts/([a-zA-Z0-9_-]{11})",
    ];

    for pattern in patterns {
        let regex = Regex::new(pattern)?;
        if let Some(id) = regex.captures(input).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    Err(ResolveError::InvalidUrl(format!(
        "No video ID found in {}",
        input
    )))
}

/// Build the watch page URL for a video
pub fn watch_url(base_url: &str, video_id: &str) -> String {
    format!("{}/watch?v={}", base_url.trim_end_matches('/'), video_id)
}

/// Build the pbj JSON URL for a video
pub fn pbj_url(base_url: &str, video_id: &str) -> String {
    format!("{}&pbj=1", watch_url(base_url, video_id))
}

/// Find the player script URL in a watch page and make it absolute
pub fn player_js_url(html: &str, base_url: &str) -> Result<String, ResolveError> {
    let regex = Regex::new(r#""(?:jsUrl|PLAYER_JS_URL)"\s*:\s*"([^"]+)""#)?;
    let raw = regex
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace("\\/", "/"))
        .ok_or_else(|| ResolveError::Extraction("Player script URL not found".to_string()))?;

    absolutize(&raw, base_url)
}

/// Resolve a possibly relative or scheme-relative URL against the site origin
pub fn absolutize(raw: &str, base_url: &str) -> Result<String, ResolveError> {
    let base = Url::parse(base_url)?;
    Ok(base.join(raw)?.to_string())
}
