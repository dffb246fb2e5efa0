//! Lenient conversion of the player response into typed stream records
//!
//! Every field is read through a guarded accessor; a missing or mistyped
//! field falls back to a default instead of failing the whole catalog.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::video_info::{MediaStream, VideoDetails};
use crate::platform::cipher::CipherResolver;
use crate::utils::mime::{codecs_from_mime, is_audio_mime, is_video_mime};

/// Read a string field
fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

/// Read an unsigned integer given either as a number or a numeric string
fn get_u64(obj: &Value, key: &str) -> Option<u64> {
    match obj.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_u32(obj: &Value, key: &str) -> Option<u32> {
    get_u64(obj, key).and_then(|v| u32::try_from(v).ok())
}

/// Check if the response has at least one stream that needs a signature
pub fn requires_decipher(response: &Value) -> bool {
    stream_entries(response).any(|(item, _)| cipher_field(item).is_some() && get_str(item, "url").is_none())
}

fn stream_entries(response: &Value) -> impl Iterator<Item = (&Value, bool)> {
    let streaming = response.get("streamingData");
    let list = move |key: &str, adaptive: bool| {
        streaming
            .and_then(|s| s.get(key))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(move |item| (item, adaptive))
    };
    list("formats", false).chain(list("adaptiveFormats", true))
}

fn cipher_field(item: &Value) -> Option<&str> {
    get_str(item, "signatureCipher")
        .or_else(|| get_str(item, "cipher"))
        .filter(|c| !c.is_empty())
}

/// Build video details from a parsed player response
pub fn build_video_details(
    response: &Value,
    video_id: &str,
    ciphers: &mut CipherResolver<'_>,
) -> VideoDetails {
    let mut details = VideoDetails::new(video_id);

    match response.get("videoDetails").filter(|v| v.is_object()) {
        Some(vd) => {
            details.title = get_str(vd, "title").unwrap_or_default().to_string();
            details.author = get_str(vd, "author").unwrap_or_default().to_string();
            details.channel_id = get_str(vd, "channelId").unwrap_or_default().to_string();
            details.length_seconds = get_u64(vd, "lengthSeconds").unwrap_or(0);
            details.description = get_str(vd, "shortDescription").unwrap_or_default().to_string();
            details.thumbnails = vd
                .pointer("/thumbnail/thumbnails")
                .and_then(Value::as_array)
                .map(|thumbs| {
                    thumbs
                        .iter()
                        .filter_map(|t| get_str(t, "url"))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
        }
        None => debug!("Player response has no videoDetails object"),
    }

    if response.get("streamingData").is_none() {
        debug!("Player response has no streamingData object");
    }

    for (item, adaptive) in stream_entries(response) {
        let Some(stream) = build_stream(item, adaptive, ciphers) else {
            continue;
        };
        if adaptive {
            details.adaptive_formats.push(stream);
        } else {
            details.formats.push(stream);
        }
    }

    info!(
        "Catalogued {} muxed and {} adaptive streams ({} playable)",
        details.formats.len(),
        details.adaptive_formats.len(),
        details.playable_count()
    );
    details
}

/// Convert one format entry; entries without an itag yield `None`
pub fn build_stream(
    item: &Value,
    adaptive: bool,
    ciphers: &mut CipherResolver<'_>,
) -> Option<MediaStream> {
    if !item.is_object() {
        debug!("Skipping non-object format entry");
        return None;
    }
    let Some(itag) = get_u32(item, "itag") else {
        debug!("Skipping format entry without itag");
        return None;
    };

    let mime_type = get_str(item, "mimeType").unwrap_or_default();
    let mut stream = MediaStream::new(itag, mime_type);
    stream.codecs = codecs_from_mime(mime_type);
    stream.bitrate = get_u64(item, "bitrate").unwrap_or(0);

    stream.width = get_u32(item, "width");
    stream.height = get_u32(item, "height");
    stream.fps = get_u32(item, "fps");
    stream.quality_label = get_str(item, "qualityLabel").map(str::to_string);
    stream.audio_quality = get_str(item, "audioQuality").map(str::to_string);
    stream.audio_sample_rate = get_u32(item, "audioSampleRate");
    stream.audio_channels = get_u32(item, "audioChannels");

    match get_u64(item, "contentLength") {
        Some(length) => stream.content_length = Some(length),
        None => {
            let estimate = get_u64(item, "approxDurationMs")
                .filter(|_| stream.bitrate > 0)
                .and_then(|duration_ms| (stream.bitrate / 8).checked_mul(duration_ms / 1000));
            match estimate {
                Some(length) => {
                    stream.content_length = Some(length);
                    stream.content_length_estimated = true;
                }
                None => debug!("No size estimate for itag {}", itag),
            }
        }
    }

    stream.is_dash = adaptive;
    if adaptive {
        if is_audio_mime(mime_type) {
            stream.is_audio_only = true;
        } else if is_video_mime(mime_type) {
            stream.is_video_only = true;
        }
    } else {
        stream.is_audio_only = true;
        stream.is_video_only = true;
    }

    stream.url = match (get_str(item, "url").filter(|u| !u.is_empty()), cipher_field(item)) {
        (Some(url), _) => url.to_string(),
        (None, Some(cipher)) => match ciphers.resolve(cipher) {
            Ok(url) => url,
            Err(e) => {
                warn!("Stream itag {} left without URL: {}", itag, e);
                String::new()
            }
        },
        (None, None) => {
            debug!("Stream itag {} has neither url nor cipher", itag);
            String::new()
        }
    };

    Some(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::platform::cipher::SignatureTransform;
    use serde_json::json;

    struct Reverse;

    impl SignatureTransform for Reverse {
        fn decipher(&mut self, encrypted: &str) -> Result<String, ResolveError> {
            Ok(encrypted.chars().rev().collect())
        }
    }

    fn sample_response() -> Value {
        json!({
            "videoDetails": {
                "videoId": "dQw4w9WgXcQ",
                "title": "Test Video",
                "author": "Channel",
                "channelId": "UC123",
                "lengthSeconds": "212",
                "shortDescription": "A description",
                "thumbnail": {"thumbnails": [
                    {"url": "https://i.example.com/default.jpg", "width": 120},
                    {"width": 320},
                    {"url": "https://i.example.com/hq.jpg"}
                ]}
            },
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://example.com/18",
                    "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
                    "bitrate": 503_000,
                    "width": 640,
                    "height": 360,
                    "qualityLabel": "360p",
                    "fps": 30,
                    "audioQuality": "AUDIO_QUALITY_LOW",
                    "audioSampleRate": "44100",
                    "audioChannels": 2,
                    "approxDurationMs": "212091"
                }],
                "adaptiveFormats": [
                    {
                        "itag": 137,
                        "signatureCipher": "s=CBA&sp=sig&url=https%3A%2F%2Fexample.com%2Fv",
                        "mimeType": "video/mp4; codecs=\"avc1.640028\"",
                        "bitrate": 4_000_000,
                        "width": 1920,
                        "height": 1080,
                        "fps": 30,
                        "contentLength": "81234567"
                    },
                    {
                        "itag": 251,
                        "url": "https://example.com/251",
                        "mimeType": "audio/webm; codecs=\"opus\"",
                        "bitrate": 160_000,
                        "contentLength": 3_400_000,
                        "audioQuality": "AUDIO_QUALITY_MEDIUM"
                    },
                    {
                        "itag": 140,
                        "cipher": "sp=sig&url=https%3A%2F%2Fexample.com%2Fa",
                        "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
                        "bitrate": 128_000
                    },
                    {
                        "mimeType": "video/webm; codecs=\"vp9\"",
                        "bitrate": 1
                    },
                    "not an object"
                ]
            }
        })
    }

    #[test]
    fn test_video_metadata() {
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        assert_eq!(details.id, "dQw4w9WgXcQ");
        assert_eq!(details.title, "Test Video");
        assert_eq!(details.author, "Channel");
        assert_eq!(details.channel_id, "UC123");
        assert_eq!(details.length_seconds, 212);
        assert_eq!(details.description, "A description");
        assert_eq!(
            details.thumbnails,
            vec![
                "https://i.example.com/default.jpg".to_string(),
                "https://i.example.com/hq.jpg".to_string()
            ]
        );
    }

    #[test]
    fn test_one_stream_per_entry_with_itag() {
        let mut reverse = Reverse;
        let mut ciphers = CipherResolver::new(&mut reverse);
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        assert_eq!(details.formats.len(), 1);
        let itags: Vec<u32> = details.adaptive_formats.iter().map(|s| s.itag).collect();
        assert_eq!(itags, vec![137, 251, 140]);
    }

    #[test]
    fn test_stream_fields() {
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        let muxed = &details.formats[0];
        assert_eq!(muxed.codecs, "avc1.42001E, mp4a.40.2");
        assert_eq!(muxed.width, Some(640));
        assert_eq!(muxed.quality_label.as_deref(), Some("360p"));
        assert_eq!(muxed.audio_sample_rate, Some(44100));
        assert_eq!(muxed.audio_channels, Some(2));
        // (503000 / 8) * 212
        assert_eq!(muxed.content_length, Some(13_329_500));
        assert!(muxed.content_length_estimated);

        let opus = &details.adaptive_formats[1];
        assert_eq!(opus.content_length, Some(3_400_000));
        assert!(!opus.content_length_estimated);
        assert_eq!(opus.width, None);
        assert_eq!(opus.fps, None);

        let video = &details.adaptive_formats[0];
        assert_eq!(video.content_length, Some(81_234_567));
    }

    #[test]
    fn test_flags_follow_source_list_and_mime() {
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        for stream in &details.formats {
            assert!(!stream.is_dash);
            assert!(stream.is_audio_only && stream.is_video_only);
        }
        for stream in &details.adaptive_formats {
            assert!(stream.is_dash);
            assert!(stream.is_audio_only != stream.is_video_only);
            assert_eq!(stream.is_audio_only, stream.mime_type.starts_with("audio/"));
        }
    }

    #[test]
    fn test_cipher_resolution() {
        let mut reverse = Reverse;
        let mut ciphers = CipherResolver::new(&mut reverse);
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        assert_eq!(details.adaptive_formats[0].url, "https://example.com/v?sig=ABC");
        // Missing `s` leaves the entry listed but unplayable
        assert_eq!(details.adaptive_formats[2].url, "");
        assert!(!details.adaptive_formats[2].is_playable());
        assert_eq!(ciphers.resolved_count(), 1);
        assert_eq!(ciphers.failed_count(), 1);
    }

    #[test]
    fn test_unavailable_decipherer_keeps_entries() {
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&sample_response(), "dQw4w9WgXcQ", &mut ciphers);

        assert_eq!(details.adaptive_formats.len(), 3);
        assert_eq!(details.adaptive_formats[0].url, "");
        assert_eq!(details.adaptive_formats[1].url, "https://example.com/251");
        assert_eq!(details.playable_count(), 2);
    }

    #[test]
    fn test_mistyped_fields_degrade() {
        let response = json!({
            "videoDetails": {"title": 42, "lengthSeconds": "abc", "thumbnail": "none"},
            "streamingData": {"formats": {"itag": 18}, "adaptiveFormats": [
                {"itag": "22", "bitrate": "oops", "height": "720", "mimeType": ["x"]}
            ]}
        });
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&response, "id", &mut ciphers);

        assert_eq!(details.title, "");
        assert_eq!(details.length_seconds, 0);
        assert!(details.thumbnails.is_empty());
        assert!(details.formats.is_empty());

        let stream = &details.adaptive_formats[0];
        assert_eq!(stream.itag, 22);
        assert_eq!(stream.bitrate, 0);
        assert_eq!(stream.height, Some(720));
        assert_eq!(stream.mime_type, "");
        assert!(!stream.is_audio_only && !stream.is_video_only);
    }

    #[test]
    fn test_oversized_estimate_is_dropped() {
        let mut ciphers = CipherResolver::unavailable();
        let item = json!({
            "itag": 18,
            "mimeType": "video/mp4",
            "bitrate": 1.8e22,
            "approxDurationMs": "99999999999"
        });
        let stream = build_stream(&item, false, &mut ciphers).unwrap();

        assert_eq!(stream.itag, 18);
        assert_eq!(stream.content_length, None);
        assert!(!stream.content_length_estimated);
    }

    #[test]
    fn test_empty_response() {
        let mut ciphers = CipherResolver::unavailable();
        let details = build_video_details(&json!({}), "id", &mut ciphers);
        assert_eq!(details.stream_count(), 0);
        assert!(!requires_decipher(&json!({})));
    }

    #[test]
    fn test_requires_decipher() {
        assert!(requires_decipher(&sample_response()));

        let direct = json!({"streamingData": {"formats": [{"itag": 18, "url": "https://x"}]}});
        assert!(!requires_decipher(&direct));
    }
}
