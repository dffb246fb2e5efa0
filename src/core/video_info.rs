//! Video and stream data model

use serde::{Deserialize, Serialize};

/// Resolved metadata and stream catalog for one video
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoDetails {
    /// Video ID
    pub id: String,
    /// Video title
    pub title: String,
    /// Channel name
    pub author: String,
    /// Channel ID
    pub channel_id: String,
    /// Duration in seconds
    pub length_seconds: u64,
    /// Short description
    pub description: String,
    /// Thumbnail URLs, in source order
    pub thumbnails: Vec<String>,
    /// Muxed streams (audio and video in one)
    pub formats: Vec<MediaStream>,
    /// Adaptive streams (audio-only or video-only)
    pub adaptive_formats: Vec<MediaStream>,
}

impl VideoDetails {
    /// Create empty details for a video ID
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Total number of catalogued streams
    pub fn stream_count(&self) -> usize {
        self.formats.len() + self.adaptive_formats.len()
    }

    /// Number of streams that carry a usable URL
    pub fn playable_count(&self) -> usize {
        self.formats
            .iter()
            .chain(self.adaptive_formats.iter())
            .filter(|s| s.is_playable())
            .count()
    }
}

/// One downloadable stream variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    /// Encoding/quality variant id, unique within one manifest only
    pub itag: u32,
    /// Final URL; empty when unresolved
    pub url: String,
    /// Full MIME type including codecs parameter
    pub mime_type: String,
    /// Codec list taken from the `codecs="..."` parameter
    pub codecs: String,
    /// Bitrate in bits per second
    pub bitrate: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality_label: Option<String>,
    pub fps: Option<u32>,
    pub audio_quality: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    /// Size in bytes
    pub content_length: Option<u64>,
    /// `content_length` was approximated from bitrate and duration
    pub content_length_estimated: bool,
    /// Came from the adaptive list
    pub is_dash: bool,
    pub is_audio_only: bool,
    pub is_video_only: bool,
}

impl MediaStream {
    /// Create a new stream with the given itag and MIME type
    pub fn new(itag: u32, mime_type: impl Into<String>) -> Self {
        Self {
            itag,
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Check if the stream has a URL that can be handed to a downloader
    pub fn is_playable(&self) -> bool {
        !self.url.is_empty()
    }

    /// Check if the stream carries both audio and video.
    ///
    /// Muxed entries have both exclusivity flags set.
    pub fn is_muxed(&self) -> bool {
        self.is_audio_only && self.is_video_only
    }

    /// Adaptive stream with video and no audio
    pub fn is_exclusive_video(&self) -> bool {
        self.is_video_only && !self.is_audio_only
    }

    /// Adaptive stream with audio and no video
    pub fn is_exclusive_audio(&self) -> bool {
        self.is_audio_only && !self.is_video_only
    }

    /// Get file extension from MIME type
    pub fn extension(&self) -> &'static str {
        crate::utils::mime::ext_from_mime(&self.mime_type)
    }

    /// Get human-readable quality string
    pub fn quality_string(&self) -> String {
        if let Some(label) = self.quality_label.as_deref().filter(|l| !l.is_empty()) {
            return label.to_string();
        }
        match (self.width, self.height) {
            (Some(width), Some(height)) => match self.fps {
                Some(fps) => format!("{}x{}p{}", width, height, fps),
                None => format!("{}x{}p", width, height),
            },
            _ => "N/A".to_string(),
        }
    }

    /// Get a short stream type label
    pub fn kind_string(&self) -> String {
        if self.is_muxed() {
            "Muxed A/V".to_string()
        } else if self.is_audio_only {
            match &self.audio_quality {
                Some(q) => format!("Audio ({})", q),
                None => "Audio".to_string(),
            }
        } else if self.is_video_only {
            "Video Only".to_string()
        } else {
            "Unknown".to_string()
        }
    }

    /// First codec name without profile suffix (e.g. `avc1` from `avc1.64001F, mp4a.40.2`)
    pub fn short_codec(&self) -> &str {
        let end = self
            .codecs
            .find(|c| c == '.' || c == ',')
            .unwrap_or(self.codecs.len());
        self.codecs[..end].trim()
    }

    /// Get human-readable size string
    pub fn size_string(&self) -> String {
        match self.content_length {
            Some(size) if self.content_length_estimated => {
                format!("~{}", crate::core::progress::format_bytes(size))
            }
            Some(size) => crate::core::progress::format_bytes(size),
            None => "N/A".to_string(),
        }
    }

    /// Get human-readable bitrate string
    pub fn bitrate_string(&self) -> String {
        if self.bitrate > 0 {
            format!("{} kbps", self.bitrate / 1000)
        } else {
            "Unknown".to_string()
        }
    }
}

/// Which kind of stream a caller wants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamTypePreference {
    #[default]
    Any,
    VideoOnly,
    AudioOnly,
    Muxed,
}

/// Ranking applied when picking a single stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityPreference {
    #[default]
    None,
    BestResolution,
    WorstResolution,
    BestBitrate,
    WorstBitrate,
    BestAudioBitrate,
    WorstAudioBitrate,
}

impl QualityPreference {
    /// Parse quality preference from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "none" => Ok(QualityPreference::None),
            "best" | "best-resolution" => Ok(QualityPreference::BestResolution),
            "worst" | "worst-resolution" => Ok(QualityPreference::WorstResolution),
            "best-bitrate" => Ok(QualityPreference::BestBitrate),
            "worst-bitrate" => Ok(QualityPreference::WorstBitrate),
            "best-audio" | "best-audio-bitrate" => Ok(QualityPreference::BestAudioBitrate),
            "worst-audio" | "worst-audio-bitrate" => Ok(QualityPreference::WorstAudioBitrate),
            other => Err(format!("Unknown quality preference: {}", other)),
        }
    }
}

/// Constraints used to narrow a stream population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSelectionCriteria {
    pub stream_type: StreamTypePreference,
    pub quality_preference: QualityPreference,
    /// Exact height, e.g. 1080
    pub target_height: Option<u32>,
    /// Exact frame rate
    pub target_fps: Option<u32>,
    /// Substring matched against `codecs`, e.g. "av01", "vp9", "avc1"
    pub preferred_codec_video: Option<String>,
    /// Substring matched against `codecs`, e.g. "opus", "mp4a"
    pub preferred_codec_audio: Option<String>,
    /// Put adaptive streams first in the population
    pub prefer_adaptive_over_muxed: bool,
    /// Drop streams whose URL could not be resolved
    pub require_playable_url: bool,
}

impl Default for FormatSelectionCriteria {
    fn default() -> Self {
        Self {
            stream_type: StreamTypePreference::Any,
            quality_preference: QualityPreference::None,
            target_height: None,
            target_fps: None,
            preferred_codec_video: None,
            preferred_codec_audio: None,
            prefer_adaptive_over_muxed: true,
            require_playable_url: true,
        }
    }
}

impl FormatSelectionCriteria {
    /// Create criteria with a stream type and quality preference
    pub fn new(stream_type: StreamTypePreference, quality: QualityPreference) -> Self {
        Self {
            stream_type,
            quality_preference: quality,
            ..Default::default()
        }
    }

    /// Set target height
    pub fn with_height(mut self, height: u32) -> Self {
        self.target_height = Some(height);
        self
    }

    /// Set target fps
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Set preferred video codec
    pub fn with_video_codec(mut self, codec: &str) -> Self {
        self.preferred_codec_video = Some(codec.to_string());
        self
    }

    /// Set preferred audio codec
    pub fn with_audio_codec(mut self, codec: &str) -> Self {
        self.preferred_codec_audio = Some(codec.to_string());
        self
    }

    /// Set population order
    pub fn with_adaptive_first(mut self, adaptive_first: bool) -> Self {
        self.prefer_adaptive_over_muxed = adaptive_first;
        self
    }

    /// Keep or drop unresolved streams
    pub fn with_require_playable(mut self, require: bool) -> Self {
        self.require_playable_url = require;
        self
    }
}
