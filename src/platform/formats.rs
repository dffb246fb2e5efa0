//! Stream filtering and selection

use crate::core::video_info::{
    FormatSelectionCriteria, MediaStream, QualityPreference, StreamTypePreference, VideoDetails,
};

/// Concatenate the adaptive and muxed catalogs in the requested order
pub fn all_streams(details: &VideoDetails, adaptive_first: bool) -> Vec<&MediaStream> {
    let (first, second) = if adaptive_first {
        (&details.adaptive_formats, &details.formats)
    } else {
        (&details.formats, &details.adaptive_formats)
    };
    first.iter().chain(second.iter()).collect()
}

/// Check if a stream satisfies every constraint set in the criteria
pub fn matches_criteria(stream: &MediaStream, criteria: &FormatSelectionCriteria) -> bool {
    let type_ok = match criteria.stream_type {
        StreamTypePreference::Any => true,
        StreamTypePreference::VideoOnly => stream.is_exclusive_video(),
        StreamTypePreference::AudioOnly => stream.is_exclusive_audio(),
        StreamTypePreference::Muxed => stream.is_muxed(),
    };
    if !type_ok {
        return false;
    }

    if criteria.require_playable_url && !stream.is_playable() {
        return false;
    }

    if let Some(height) = criteria.target_height {
        if stream.height != Some(height) {
            return false;
        }
    }

    if let Some(fps) = criteria.target_fps {
        if stream.fps != Some(fps) {
            return false;
        }
    }

    // Codec preferences only constrain streams carrying that media kind
    if let Some(codec) = &criteria.preferred_codec_video {
        if stream.is_video_only && !stream.codecs.contains(codec.as_str()) {
            return false;
        }
    }

    if let Some(codec) = &criteria.preferred_codec_audio {
        if stream.is_audio_only && !stream.codecs.contains(codec.as_str()) {
            return false;
        }
    }

    true
}

/// Keep the streams that match the criteria, preserving order
pub fn filter_streams<'a>(
    streams: &[&'a MediaStream],
    criteria: &FormatSelectionCriteria,
) -> Vec<&'a MediaStream> {
    streams
        .iter()
        .copied()
        .filter(|s| matches_criteria(s, criteria))
        .collect()
}

/// Pick one stream by quality preference in a single pass.
///
/// Streams without a URL are never picked. On equal keys the earlier
/// stream wins, except that resolution ties prefer the higher frame rate.
pub fn select_best_stream<'a>(
    streams: &[&'a MediaStream],
    preference: QualityPreference,
) -> Option<&'a MediaStream> {
    let mut best: Option<&'a MediaStream> = None;

    for &stream in streams {
        if !stream.is_playable() || !is_ranked(stream, preference) {
            continue;
        }
        best = match best {
            None => Some(stream),
            Some(current) if is_better(stream, current, preference) => Some(stream),
            keep => keep,
        };
    }

    best
}

/// Filter by criteria, then select by its quality preference
pub fn select_stream<'a>(
    details: &'a VideoDetails,
    criteria: &FormatSelectionCriteria,
) -> Option<&'a MediaStream> {
    let population = all_streams(details, criteria.prefer_adaptive_over_muxed);
    let candidates = filter_streams(&population, criteria);
    select_best_stream(&candidates, criteria.quality_preference)
}

/// Whether a stream has the key the preference ranks on
fn is_ranked(stream: &MediaStream, preference: QualityPreference) -> bool {
    match preference {
        QualityPreference::BestResolution | QualityPreference::WorstResolution => {
            stream.height.is_some()
        }
        QualityPreference::BestAudioBitrate | QualityPreference::WorstAudioBitrate => {
            stream.is_exclusive_audio()
        }
        _ => true,
    }
}

fn is_better(candidate: &MediaStream, current: &MediaStream, preference: QualityPreference) -> bool {
    let height = |s: &MediaStream| s.height.unwrap_or(0);
    let fps = |s: &MediaStream| s.fps.unwrap_or(0);

    match preference {
        QualityPreference::None => false,
        QualityPreference::BestResolution => {
            height(candidate) > height(current)
                || (height(candidate) == height(current) && fps(candidate) > fps(current))
        }
        QualityPreference::WorstResolution => {
            height(candidate) < height(current)
                || (height(candidate) == height(current) && fps(candidate) > fps(current))
        }
        QualityPreference::BestBitrate | QualityPreference::BestAudioBitrate => {
            candidate.bitrate > current.bitrate
        }
        QualityPreference::WorstBitrate | QualityPreference::WorstAudioBitrate => {
            candidate.bitrate < current.bitrate
        }
    }
}
