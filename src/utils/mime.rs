//! MIME type helpers for stream descriptors

/// Strip parameters from a MIME type (`video/mp4; codecs="..."` -> `video/mp4`)
pub fn base_mime(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
}

/// Extract the codec list from the `codecs="..."` parameter.
///
/// Returns an empty string when the parameter is absent or unterminated.
pub fn codecs_from_mime(mime_type: &str) -> String {
    const MARKER: &str = "codecs=\"";

    let Some(start) = mime_type.find(MARKER) else {
        return String::new();
    };
    let rest = &mime_type[start + MARKER.len()..];
    match rest.find('"') {
        Some(end) => rest[..end].to_string(),
        None => String::new(),
    }
}

/// Get file extension from MIME type
pub fn ext_from_mime(mime_type: &str) -> &'static str {
    match base_mime(mime_type) {
        // Video formats
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        "video/x-flv" => "flv",
        "video/mp2t" => "ts",

        // Audio formats
        "audio/mp4" => "m4a",
        "audio/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",

        // Default fallback
        _ => "bin",
    }
}

/// Check if MIME type is a video format
pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.contains("video/")
}

/// Check if MIME type is an audio format
pub fn is_audio_mime(mime_type: &str) -> bool {
    mime_type.contains("audio/")
}
