//! Command line argument parsing

use crate::core::resolver::ResolverOptions;
use crate::core::video_info::{FormatSelectionCriteria, QualityPreference, StreamTypePreference};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Resolve a watch page into its stream catalog, pick a stream and fetch it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video URL or 11-character video ID
    pub url: String,

    /// List every stream and exit
    #[arg(short, long)]
    pub list: bool,

    /// Dump the resolved details as JSON and exit
    #[arg(long)]
    pub json: bool,

    /// Kind of stream to pick
    #[arg(short = 't', long = "type", value_enum, default_value = "any")]
    pub stream_type: StreamKind,

    /// Ranking (none, best, worst, best-bitrate, worst-bitrate, best-audio, worst-audio)
    #[arg(short = 'f', long, value_name = "QUALITY", default_value = "best", value_parser = QualityPreference::from_str)]
    pub quality: QualityPreference,

    /// Exact video height, e.g. 1080
    #[arg(long)]
    pub height: Option<u32>,

    /// Exact frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Video codec substring (av01, vp9, avc1)
    #[arg(long, value_name = "CODEC")]
    pub video_codec: Option<String>,

    /// Audio codec substring (opus, mp4a)
    #[arg(long, value_name = "CODEC")]
    pub audio_codec: Option<String>,

    /// Pick this itag, ignoring the other selection flags
    #[arg(long)]
    pub itag: Option<u32>,

    /// Rank muxed streams ahead of adaptive ones
    #[arg(long)]
    pub muxed_first: bool,

    /// Print final media URL and exit (no download)
    #[arg(short = 'g', long)]
    pub print_url: bool,

    /// Output file path (defaults to a name derived from the title)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Disable progress output
    #[arg(long)]
    pub no_progress: bool,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP connect timeout
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    pub connect_timeout: humantime::Duration,

    /// HTTP retries for transient errors
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Override User-Agent header
    #[arg(long, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Do not retry through the pbj endpoint when the page has no player response
    #[arg(long)]
    pub no_pbj: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Stream kind accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum StreamKind {
    /// Any stream
    Any,
    /// Video without audio
    Video,
    /// Audio without video
    Audio,
    /// Audio and video in one file
    Muxed,
}

impl From<StreamKind> for StreamTypePreference {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Any => StreamTypePreference::Any,
            StreamKind::Video => StreamTypePreference::VideoOnly,
            StreamKind::Audio => StreamTypePreference::AudioOnly,
            StreamKind::Muxed => StreamTypePreference::Muxed,
        }
    }
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        self.connect_timeout.into()
    }

    /// Build resolver options from the flags
    pub fn resolver_options(&self) -> ResolverOptions {
        let mut options = ResolverOptions::default()
            .with_timeout(self.timeout_duration())
            .with_connect_timeout(self.connect_timeout_duration())
            .with_max_retries(self.retries)
            .with_adaptive_first(!self.muxed_first)
            .with_pbj_fallback(!self.no_pbj);
        if let Some(user_agent) = &self.user_agent {
            options = options.with_user_agent(user_agent);
        }
        options
    }

    /// Build selection criteria from the flags
    pub fn criteria(&self) -> FormatSelectionCriteria {
        let mut criteria = FormatSelectionCriteria::new(self.stream_type.into(), self.quality)
            .with_adaptive_first(!self.muxed_first);
        if let Some(height) = self.height {
            criteria = criteria.with_height(height);
        }
        if let Some(fps) = self.fps {
            criteria = criteria.with_fps(fps);
        }
        if let Some(codec) = &self.video_codec {
            criteria = criteria.with_video_codec(codec);
        }
        if let Some(codec) = &self.audio_codec {
            criteria = criteria.with_audio_codec(codec);
        }
        criteria
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            url: String::new(),
            list: false,
            json: false,
            stream_type: StreamKind::Any,
            quality: QualityPreference::BestResolution,
            height: None,
            fps: None,
            video_codec: None,
            audio_codec: None,
            itag: None,
            muxed_first: false,
            print_url: false,
            output: None,
            no_progress: false,
            timeout: humantime::Duration::from(Duration::from_secs(30)),
            connect_timeout: humantime::Duration::from(Duration::from_secs(10)),
            retries: 3,
            user_agent: None,
            no_pbj: false,
            verbose: false,
            quiet: false,
        }
    }
}
