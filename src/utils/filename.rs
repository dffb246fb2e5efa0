//! Output filename generation

use crate::core::MediaStream;

/// Longest title prefix kept in generated names, in characters
const MAX_TITLE_CHARS: usize = 80;

/// Replace characters that are invalid in filenames on common filesystems
fn replace_invalid(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Convert a title to a safe filename by replacing invalid characters
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let replaced = replace_invalid(title);
    let mut safe_title: String = replaced
        .trim_matches(|c: char| c == '.' || c == ' ')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    safe_title = safe_title.trim_end().to_string();

    if safe_title.is_empty() {
        safe_title = "video".to_string();
    }

    if extension.is_empty() {
        return safe_title;
    }
    format!("{}.{}", safe_title, extension.trim_start_matches('.'))
}

/// Default output name for a stream: `title_quality_itag.ext`
pub fn output_filename(title: &str, stream: &MediaStream) -> String {
    let quality = replace_invalid(&stream.quality_string());
    let stem = format!("{}_{}_{}", to_safe_filename(title, ""), quality, stream.itag);
    format!("{}.{}", stem, stream.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_safe_filename() {
        assert_eq!(
            to_safe_filename("Test Video: Title", "mp4"),
            "Test Video_ Title.mp4"
        );
        assert_eq!(
            to_safe_filename("Video with <invalid> chars", ".mp4"),
            "Video with _invalid_ chars.mp4"
        );
        assert_eq!(to_safe_filename("", "mp4"), "video.mp4");
        assert_eq!(to_safe_filename("...", ""), "video");
    }

    #[test]
    fn test_title_is_truncated() {
        let title = "a".repeat(200);
        let name = to_safe_filename(&title, "webm");
        assert_eq!(name.len(), MAX_TITLE_CHARS + ".webm".len());
    }

    #[test]
    fn test_output_filename() {
        let mut stream = MediaStream::new(137, "video/mp4; codecs=\"avc1.640028\"");
        stream.quality_label = Some("1080p".to_string());
        assert_eq!(output_filename("My/Clip", &stream), "My_Clip_1080p_137.mp4");

        let audio = MediaStream::new(251, "audio/webm; codecs=\"opus\"");
        assert_eq!(output_filename("Song", &audio), "Song_N_A_251.webm");
    }
}
